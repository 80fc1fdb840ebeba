// ── Drive domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ripley_api::models::MediaType;

/// What a drive is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RipActivity {
    Ripping,
    Paused,
}

/// Transient rip state of one drive.
///
/// Events and `GET /api/status` write it; `GET /api/drives` never carries
/// it, so a drive resync preserves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RipState {
    pub activity: Option<RipActivity>,
    /// 0.0..=1.0
    pub progress: f32,
    pub message: Option<String>,
    pub disc: Option<String>,
    pub title: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
}

impl RipState {
    pub fn is_active(&self) -> bool {
        self.activity.is_some()
    }
}

/// An optical drive, keyed by its device path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    pub device: String,
    pub name: Option<String>,
    pub has_audio_cd: bool,
    pub media_type: Option<MediaType>,
    pub rip: RipState,
    /// Most recent `RipError` reported for this drive.
    pub last_error: Option<String>,
}

impl Drive {
    /// A drive known only by device path (first seen through a rip event).
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            name: None,
            has_audio_cd: false,
            media_type: None,
            rip: RipState::default(),
            last_error: None,
        }
    }

    /// Display name, falling back to the device path.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.device)
    }

    /// Clear every transient rip field.
    pub fn reset_rip(&mut self) {
        self.rip = RipState::default();
    }

    pub fn is_ripping(&self) -> bool {
        self.rip.activity == Some(RipActivity::Ripping)
    }

    pub fn is_paused(&self) -> bool {
        self.rip.activity == Some(RipActivity::Paused)
    }
}
