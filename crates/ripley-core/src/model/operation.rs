// ── Operations, upscaling jobs, and agents ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ripley_api::models::OperationStatus;

/// Where a tracked unit of work comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// A service-side operation (rip, rename, transfer).
    Operation,
    /// A job handed to a remote upscaling agent.
    UpscalingJob,
}

impl OperationKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Operation => "op",
            Self::UpscalingJob => "job",
        }
    }
}

/// Collection key for an operation or job id.
pub fn operation_key(kind: OperationKind, id: &str) -> String {
    format!("{}:{id}", kind.prefix())
}

/// One operation or upscaling job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: String,
    pub kind: OperationKind,
    /// Service-side operation type (`rip`, `upscale`, ...).
    pub operation_type: Option<String>,
    pub status: OperationStatus,
    pub drive: Option<String>,
    pub title: Option<String>,
    /// 0.0..=1.0
    pub progress: f32,
    pub message: Option<String>,
    pub error: Option<String>,
    pub agent_id: Option<String>,
    pub priority: Option<i32>,
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn new(kind: OperationKind, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            operation_type: None,
            status: OperationStatus::Queued,
            drive: None,
            title: None,
            progress: 0.0,
            message: None,
            error: None,
            agent_id: None,
            priority: None,
            input_path: None,
            output_path: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn key(&self) -> String {
        operation_key(self.kind, &self.id)
    }
}

/// A remote upscaling agent, keyed by `agent_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub name: Option<String>,
    /// Free-form (`online`, `busy`, `offline`).
    pub status: String,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn is_online(&self) -> bool {
        !self.status.eq_ignore_ascii_case("offline")
    }
}
