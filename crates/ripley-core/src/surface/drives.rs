// ── Drives surface ──
//
// Drive identity comes from detection events and `GET /api/drives`; rip
// state comes from rip events and `GET /api/status`. A resync overlays the
// status snapshot onto every surviving drive, which heals a missed
// `RipCompleted` or `RipError`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;

use ripley_api::events::{
    DeviceRef, DriveDetectedPayload, DriveRef, RipCompletedPayload, RipErrorPayload,
    RipProgressPayload, RipStartedPayload, StatusUpdatePayload, unwrap_nested,
};
use ripley_api::models::{DriveInfo, RipStatus};
use ripley_api::{EventKind, SnapshotSource};

use crate::aggregate::rip_elapsed;
use crate::error::CoreError;
use crate::model::{Drive, RipActivity, RipState};
use crate::store::{EntityCollection, Snapshot};
use crate::stream::EntityStream;
use crate::view::{Surface, payload};

/// Elapsed rip time per device, for drives with an active rip.
pub type ElapsedMap = Arc<BTreeMap<String, Duration>>;

/// `GET /api/drives` and `GET /api/status`, fetched together.
#[derive(Debug, Clone)]
pub struct DrivesSnapshot {
    pub drives: Vec<DriveInfo>,
    pub status: RipStatus,
}

pub struct DrivesSurface {
    drives: EntityCollection<Drive>,
    elapsed: watch::Sender<ElapsedMap>,
}

impl Default for DrivesSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl DrivesSurface {
    pub fn new() -> Self {
        let (elapsed, _) = watch::channel(Arc::new(BTreeMap::new()));
        Self {
            drives: EntityCollection::new(),
            elapsed,
        }
    }

    pub fn snapshot(&self) -> Snapshot<Drive> {
        self.drives.snapshot()
    }

    pub fn stream(&self) -> EntityStream<Drive> {
        EntityStream::new(self.drives.subscribe())
    }

    pub fn get(&self, device: &str) -> Option<Arc<Drive>> {
        self.drives.get(device)
    }

    pub fn len(&self) -> usize {
        self.drives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drives.is_empty()
    }

    /// Elapsed rip times, recomputed on every clock tick.
    pub fn elapsed(&self) -> watch::Receiver<ElapsedMap> {
        self.elapsed.subscribe()
    }

    /// Recompute elapsed rip times against `now`.
    pub fn refresh_elapsed(&self, now: DateTime<Utc>) {
        let elapsed = rip_elapsed(&self.drives.snapshot(), now);
        self.elapsed.send_replace(Arc::new(elapsed));
    }

    /// Existing drive or a bare one for `device`, ready to modify.
    fn drive_or_new(existing: Option<&Drive>, device: &str) -> Drive {
        existing.cloned().unwrap_or_else(|| Drive::new(device))
    }
}

#[async_trait]
impl Surface for DrivesSurface {
    const NAME: &'static str = "drives";

    const EVENT_TYPES: &'static [EventKind] = &[
        EventKind::DriveDetected,
        EventKind::DriveRemoved,
        EventKind::DriveEjected,
        EventKind::RipStarted,
        EventKind::RipProgress,
        EventKind::RipCompleted,
        EventKind::RipError,
        EventKind::RipPaused,
        EventKind::RipResumed,
        EventKind::StatusUpdate,
    ];

    type Fetched = DrivesSnapshot;

    async fn fetch(source: &dyn SnapshotSource) -> Result<DrivesSnapshot, CoreError> {
        let (drives, status) = tokio::try_join!(source.drives(), source.rip_status())?;
        Ok(DrivesSnapshot { drives, status })
    }

    fn apply_snapshot(&self, fetched: DrivesSnapshot) {
        let DrivesSnapshot { drives, status } = fetched;
        let now = Utc::now();
        let items = drives
            .into_iter()
            .map(|info| (info.device.clone(), Drive::from(info)))
            .collect();

        self.drives.upsert_and_prune(items, |existing, mut fresh| {
            if let Some(existing) = existing {
                fresh.rip = existing.rip.clone();
                fresh.last_error.clone_from(&existing.last_error);
                if fresh.name.is_none() {
                    fresh.name.clone_from(&existing.name);
                }
            }
            match status.active_rips.get(&fresh.device) {
                Some(rip) => fresh.rip.apply_status(rip, now),
                None => fresh.reset_rip(),
            }
            fresh
        });
    }

    fn apply_event(&self, kind: EventKind, data: &Value) -> Result<(), CoreError> {
        let now = Utc::now();
        match kind {
            EventKind::DriveDetected => {
                let info: DriveDetectedPayload = payload(kind, unwrap_nested(data, "drive"))?;
                let device = info.device.clone();
                self.drives.upsert_with(device, |existing| match existing {
                    Some(existing) => {
                        let mut drive = existing.clone();
                        drive.apply_identity(info);
                        drive
                    }
                    None => Drive::from(info),
                });
            }
            EventKind::DriveRemoved => {
                let DeviceRef { device } = payload(kind, data)?;
                self.drives.remove(&device);
            }
            EventKind::DriveEjected => {
                let DeviceRef { device } = payload(kind, data)?;
                self.drives.update(&device, |drive| {
                    drive.reset_rip();
                    drive.media_type = None;
                    drive.has_audio_cd = false;
                });
            }
            EventKind::RipStarted => {
                let RipStartedPayload { drive, disc } = payload(kind, data)?;
                self.drives.upsert_with(drive.clone(), |existing| {
                    let mut d = Self::drive_or_new(existing, &drive);
                    d.rip = RipState {
                        activity: Some(RipActivity::Ripping),
                        progress: 0.0,
                        disc,
                        started_at: Some(now),
                        ..RipState::default()
                    };
                    d.last_error = None;
                    d
                });
            }
            EventKind::RipProgress => {
                let RipProgressPayload {
                    drive,
                    progress,
                    message,
                } = payload(kind, data)?;
                self.drives.upsert_with(drive.clone(), |existing| {
                    let mut d = Self::drive_or_new(existing, &drive);
                    d.rip.activity = Some(RipActivity::Ripping);
                    d.rip.progress = progress.clamp(0.0, 1.0);
                    if message.is_some() {
                        d.rip.message = message;
                    }
                    d.rip.started_at.get_or_insert(now);
                    d
                });
            }
            EventKind::RipCompleted => {
                let RipCompletedPayload { drive, .. } = payload(kind, data)?;
                self.drives.update(&drive, Drive::reset_rip);
            }
            EventKind::RipError => {
                let RipErrorPayload { error, drive } = payload(kind, data)?;
                // Failures before a drive was chosen only reach the log tail.
                if let Some(drive) = drive {
                    self.drives.update(&drive, |d| {
                        d.reset_rip();
                        d.last_error = Some(error);
                    });
                }
            }
            EventKind::RipPaused => {
                let DriveRef { drive } = payload(kind, data)?;
                self.drives.update(&drive, |d| {
                    d.rip.activity = Some(RipActivity::Paused);
                    d.rip.paused_at = Some(now);
                });
            }
            EventKind::RipResumed => {
                let DriveRef { drive } = payload(kind, data)?;
                self.drives.update(&drive, |d| {
                    d.rip.activity = Some(RipActivity::Ripping);
                    d.rip.paused_at = None;
                });
            }
            EventKind::StatusUpdate => {
                let StatusUpdatePayload { status } = payload(kind, data)?;
                self.drives.update_all(|device, d| match status.active_rips.get(device) {
                    Some(rip) => {
                        d.rip.apply_status(rip, now);
                        true
                    }
                    None => false,
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn on_tick(&self, now: DateTime<Utc>) {
        self.refresh_elapsed(now);
    }
}
