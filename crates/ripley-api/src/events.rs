// ── Event envelope and payloads ──
//
// Every text frame on the event socket carries exactly one envelope:
// `{ "type": "<PascalCaseName>", "data": { ... } }`. The payload structs
// below are the typed views consumers decode `data` into.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::models::{IssueRecord, LogLevel, MediaType, OperationStatus, RipStatus};

// ── Envelope ─────────────────────────────────────────────────────────

/// The unit of wire delivery. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
        }
    }

    /// Parse one text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// The known kind of this envelope, if it is one the client understands.
    pub fn kind(&self) -> Option<EventKind> {
        self.event_type.parse().ok()
    }

    /// Decode `data` into a typed payload.
    pub fn decode<'a, T: Deserialize<'a>>(&'a self) -> Result<T, serde_json::Error> {
        decode(&self.data)
    }
}

/// Decode an event payload without cloning it.
pub fn decode<'a, T: Deserialize<'a>>(data: &'a Value) -> Result<T, serde_json::Error> {
    T::deserialize(data)
}

/// Some events wrap their record in a named field (`{"drive": {...}}`),
/// others send it flat. Returns the inner object when present.
pub fn unwrap_nested<'a>(data: &'a Value, field: &str) -> &'a Value {
    match data.get(field) {
        Some(inner) if inner.is_object() => inner,
        _ => data,
    }
}

// ── EventKind ────────────────────────────────────────────────────────

/// Event types the dashboard understands. The string form is the wire `type`.
///
/// `Connection` is synthetic: it is emitted locally by the connection
/// manager and never sent by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
pub enum EventKind {
    #[strum(serialize = "connection")]
    Connection,
    Log,
    StatusUpdate,
    DriveDetected,
    DriveRemoved,
    DriveEjected,
    RipStarted,
    RipProgress,
    RipCompleted,
    RipError,
    RipPaused,
    RipResumed,
    IssueCreated,
    OperationStarted,
    OperationProgress,
    OperationCompleted,
    OperationFailed,
    AgentStatusChanged,
    UpscalingJobStatusChanged,
}

// ── Payloads ─────────────────────────────────────────────────────────

/// `connection` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionPayload {
    pub connected: bool,
}

/// `Log` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogPayload {
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub drive: Option<String>,
}

/// `DriveRemoved` / `DriveEjected` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceRef {
    pub device: String,
}

/// `DriveDetected` payload (flat, or nested under `drive`). Unlike a
/// `DriveInfo` snapshot record, omitted fields stay `None` so a re-detection
/// only overwrites what it actually carries.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriveDetectedPayload {
    pub device: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub has_audio_cd: Option<bool>,
    #[serde(default)]
    pub media_type: Option<MediaType>,
}

/// `IssueCreated` payload (flat, or nested under `issue`).
pub type IssueCreatedPayload = IssueRecord;

/// `RipStarted` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RipStartedPayload {
    pub drive: String,
    #[serde(default)]
    pub disc: Option<String>,
}

/// `RipProgress` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RipProgressPayload {
    pub drive: String,
    pub progress: f32,
    #[serde(default)]
    pub message: Option<String>,
}

/// `RipCompleted` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RipCompletedPayload {
    pub drive: String,
    #[serde(default)]
    pub disc: Option<String>,
}

/// `RipError` payload. The drive is absent for failures before a drive was picked.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RipErrorPayload {
    pub error: String,
    #[serde(default)]
    pub drive: Option<String>,
}

/// `RipPaused` / `RipResumed` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriveRef {
    pub drive: String,
}

/// `StatusUpdate` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: RipStatus,
}

/// `OperationStarted` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationStartedPayload {
    pub operation_id: String,
    #[serde(default)]
    pub operation_type: Option<String>,
    #[serde(default)]
    pub drive: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `OperationProgress` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationProgressPayload {
    pub operation_id: String,
    pub progress: f32,
    #[serde(default)]
    pub message: Option<String>,
}

/// `OperationCompleted` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationCompletedPayload {
    pub operation_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// `OperationFailed` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OperationFailedPayload {
    pub operation_id: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// `UpscalingJobStatusChanged` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStatusChangedPayload {
    pub job_id: String,
    pub status: OperationStatus,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// `AgentStatusChanged` payload.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AgentStatusChangedPayload {
    pub agent_id: String,
    pub status: String,
    #[serde(default)]
    pub name: Option<String>,
}
