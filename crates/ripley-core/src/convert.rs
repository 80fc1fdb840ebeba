// ── API-to-domain type conversions ──
//
// Bridges raw `ripley_api` snapshot records into the reconciled
// `ripley_core::model` types. Transient fields that snapshots never carry
// start empty; the surfaces decide what to preserve.

use chrono::{DateTime, Utc};

use ripley_api::events::DriveDetectedPayload;
use ripley_api::models::{
    AgentRecord, DriveInfo, DriveRipStatus, IssueRecord, LogRecord, OperationRecord,
    UpscalingJobRecord,
};

use crate::model::{
    Agent, Drive, Issue, LogLine, Operation, OperationKind, RipActivity, RipState,
};

impl From<DriveInfo> for Drive {
    fn from(info: DriveInfo) -> Self {
        Self {
            device: info.device,
            name: info.name,
            has_audio_cd: info.has_audio_cd,
            media_type: info.media_type,
            rip: RipState::default(),
            last_error: None,
        }
    }
}

impl From<DriveDetectedPayload> for Drive {
    fn from(detected: DriveDetectedPayload) -> Self {
        Self {
            device: detected.device,
            name: detected.name,
            has_audio_cd: detected.has_audio_cd.unwrap_or_default(),
            media_type: detected.media_type,
            rip: RipState::default(),
            last_error: None,
        }
    }
}

impl Drive {
    /// Shallow-merge a detection: fields the event carries win, the rest
    /// (including rip state and last error) are kept.
    pub(crate) fn apply_identity(&mut self, detected: DriveDetectedPayload) {
        if detected.name.is_some() {
            self.name = detected.name;
        }
        if let Some(has_audio_cd) = detected.has_audio_cd {
            self.has_audio_cd = has_audio_cd;
        }
        if detected.media_type.is_some() {
            self.media_type = detected.media_type;
        }
    }
}

impl RipState {
    /// Overlay one `active_rips` entry. Started-at is kept across
    /// overlays; the status endpoint does not report it.
    pub(crate) fn apply_status(&mut self, status: &DriveRipStatus, now: DateTime<Utc>) {
        self.activity = Some(if status.paused {
            RipActivity::Paused
        } else {
            RipActivity::Ripping
        });
        self.progress = status.progress;
        self.disc.clone_from(&status.current_disc);
        self.title.clone_from(&status.current_title);
        self.paused_at = status.paused_at;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }
}

impl From<OperationRecord> for Operation {
    fn from(r: OperationRecord) -> Self {
        Self {
            id: r.operation_id,
            kind: OperationKind::Operation,
            operation_type: r.operation_type,
            status: r.status,
            drive: r.drive,
            title: r.title,
            progress: r.progress,
            message: r.message,
            error: r.error,
            agent_id: None,
            priority: None,
            input_path: None,
            output_path: None,
            started_at: r.started_at,
            completed_at: r.completed_at,
        }
    }
}

impl From<UpscalingJobRecord> for Operation {
    fn from(r: UpscalingJobRecord) -> Self {
        Self {
            id: r.job_id,
            kind: OperationKind::UpscalingJob,
            operation_type: Some("upscale".into()),
            status: r.status,
            drive: None,
            title: None,
            progress: r.progress,
            message: None,
            error: r.error_message,
            agent_id: r.agent_id,
            priority: Some(r.priority),
            input_path: r.input_file_path,
            output_path: r.output_file_path,
            started_at: r.started_at,
            completed_at: r.completed_at,
        }
    }
}

impl From<AgentRecord> for Agent {
    fn from(r: AgentRecord) -> Self {
        Self {
            agent_id: r.agent_id,
            name: r.name,
            status: r.status,
            last_seen: r.last_seen,
        }
    }
}

impl From<IssueRecord> for Issue {
    fn from(r: IssueRecord) -> Self {
        Self {
            id: r.id,
            timestamp: r.timestamp,
            issue_type: r.issue_type,
            title: r.title,
            description: r.description,
            drive: r.drive,
            disc: r.disc,
            resolved: r.resolved,
            assigned_to: r.assigned_to,
        }
    }
}

impl LogLine {
    /// Convert a snapshot record; entries without a server timestamp take
    /// `fallback`.
    pub(crate) fn from_record(r: LogRecord, fallback: DateTime<Utc>) -> Self {
        Self {
            timestamp: r.timestamp.unwrap_or(fallback),
            level: r.level,
            message: r.message,
            drive: r.drive,
        }
    }
}
