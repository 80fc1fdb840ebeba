// ── Wire models ──
//
// Serde types for the JSON the ripping service returns from its REST
// snapshot endpoints. Everything is lenient: optional fields default, and
// enum-like strings fall back to an `Unknown` variant instead of failing
// the whole snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── Enum-like strings ────────────────────────────────────────────────

/// Kind of media currently in an optical drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive)]
pub enum MediaType {
    #[strum(to_string = "AudioCD", serialize = "audio_cd", serialize = "cd")]
    AudioCd,
    #[strum(to_string = "DVD")]
    Dvd,
    #[strum(to_string = "BluRay", serialize = "blu_ray", serialize = "bd")]
    BluRay,
    #[strum(to_string = "None", serialize = "empty")]
    None,
    #[strum(to_string = "Unknown")]
    Unknown,
}

impl From<String> for MediaType {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }
}

impl From<MediaType> for String {
    fn from(m: MediaType) -> Self {
        m.to_string()
    }
}

/// Severity of a log line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum LogLevel {
    Info,
    #[strum(to_string = "warning", serialize = "warn")]
    Warning,
    Error,
    Success,
}

impl From<String> for LogLevel {
    /// Unrecognised levels are shown as plain info lines.
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Info)
    }
}

impl From<LogLevel> for String {
    fn from(l: LogLevel) -> Self {
        l.to_string()
    }
}

/// Lifecycle status shared by operations and upscaling jobs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum OperationStatus {
    Queued,
    Assigned,
    #[strum(to_string = "running", serialize = "processing", serialize = "in_progress")]
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Unknown,
}

impl OperationStatus {
    /// `true` once the operation can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl From<String> for OperationStatus {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Self::Unknown)
    }
}

impl From<OperationStatus> for String {
    fn from(s: OperationStatus) -> Self {
        s.to_string()
    }
}

// ── Drives ───────────────────────────────────────────────────────────

/// One entry of `GET /api/drives`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveInfo {
    pub device: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub has_audio_cd: bool,
    #[serde(default)]
    pub media_type: Option<MediaType>,
}

/// Per-drive entry inside `RipStatus::active_rips`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveRipStatus {
    pub current_disc: Option<String>,
    pub current_title: Option<String>,
    pub progress: f32,
    pub paused: bool,
    pub paused_at: Option<DateTime<Utc>>,
}

/// Response of `GET /api/status`, keyed by drive device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RipStatus {
    pub active_rips: HashMap<String, DriveRipStatus>,
    pub logs: Vec<String>,
}

// ── Logs & issues ────────────────────────────────────────────────────

/// One entry of `GET /api/logs` (newest first on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub drive: Option<String>,
    #[serde(default)]
    pub disc: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// One entry of `GET /api/issues/active`, also the payload of `IssueCreated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub drive: Option<String>,
    #[serde(default)]
    pub disc: Option<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
}

fn default_issue_type() -> String {
    "other".into()
}

// ── Operations, jobs, agents ─────────────────────────────────────────

/// One entry of `GET /api/operations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operation_id: String,
    #[serde(default)]
    pub operation_type: Option<String>,
    pub status: OperationStatus,
    #[serde(default)]
    pub drive: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One entry of `GET /api/upscaling-jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpscalingJobRecord {
    pub job_id: String,
    #[serde(default)]
    pub input_file_path: Option<String>,
    #[serde(default)]
    pub output_file_path: Option<String>,
    pub status: OperationStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// One entry of `GET /api/agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub status: String,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

// ── Command bodies ───────────────────────────────────────────────────

/// Body of `POST /api/rip/start`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StartRipRequest {
    pub drive: Option<String>,
    pub output_path: Option<String>,
    pub title: Option<String>,
    pub skip_metadata: bool,
    pub skip_filebot: bool,
    pub profile: Option<String>,
    pub priority: Option<i32>,
}

/// `{ "error": "..." }` body the service returns on failures.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
