#![allow(clippy::unwrap_used)]
// Mounted views driven end to end: socket frames in, reconciled state out.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::assert_err;

use ripley_api::SocketSignal;
use ripley_core::{
    ChannelNotifier, CoreError, DashboardClient, MediaType, NotificationLevel, OperationKind,
    OperationStatus, TracingNotifier,
};

use common::{FakeSource, FakeTransport, drive, settle, test_config};

struct Harness {
    client: DashboardClient,
    transport: Arc<FakeTransport>,
    source: Arc<FakeSource>,
}

impl Harness {
    fn new() -> Self {
        let transport = Arc::new(FakeTransport::default());
        let source = Arc::new(FakeSource::default());
        let client = DashboardClient::from_parts(
            test_config(),
            transport.clone(),
            source.clone(),
            Arc::new(TracingNotifier),
        )
        .unwrap();
        Self {
            client,
            transport,
            source,
        }
    }

    /// Connect and complete the handshake on the first socket.
    async fn open(&self) {
        self.client.connect();
        self.transport.send(0, SocketSignal::Open);
        settle().await;
    }

    async fn push(&self, event_type: &str, data: serde_json::Value) {
        self.transport
            .send_text(0, &json!({ "type": event_type, "data": data }));
        settle().await;
    }
}

async fn advance_secs(secs: u64) {
    tokio::time::advance(std::time::Duration::from_secs(secs)).await;
    settle().await;
}

// ── Drives ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn drive_detected_then_removed() {
    let h = Harness::new();
    let view = h.client.mount_drives().await;
    h.open().await;

    h.push(
        "DriveDetected",
        json!({ "drive": { "device": "/dev/disk2", "name": "SuperDrive", "media_type": "DVD" } }),
    )
    .await;
    let detected = view.surface().get("/dev/disk2").unwrap();
    assert_eq!(detected.display_name(), "SuperDrive");

    h.push("DriveRemoved", json!({ "device": "/dev/disk2" })).await;
    assert!(view.surface().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rip_progress_then_completion_resets_the_drive() {
    let h = Harness::new();
    let view = h.client.mount_drives().await;
    h.open().await;

    h.push("RipStarted", json!({ "drive": "/dev/disk2", "disc": "ALIEN" })).await;
    h.push(
        "RipProgress",
        json!({ "drive": "/dev/disk2", "progress": 0.42, "message": "Track 3/9" }),
    )
    .await;

    let ripping = view.surface().get("/dev/disk2").unwrap();
    assert!(ripping.is_ripping());
    assert!((ripping.rip.progress - 0.42).abs() < f32::EPSILON);
    assert_eq!(ripping.rip.disc.as_deref(), Some("ALIEN"));
    assert_eq!(ripping.rip.message.as_deref(), Some("Track 3/9"));

    h.push("RipCompleted", json!({ "drive": "/dev/disk2" })).await;
    let done = view.surface().get("/dev/disk2").unwrap();
    assert!(!done.is_ripping());
    assert!(done.rip.progress.abs() < f32::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn mount_seeds_from_snapshot() {
    let h = Harness::new();
    h.source.edit(|f| {
        f.drives = vec![drive("/dev/disk2", "SuperDrive"), drive("/dev/disk3", "Pioneer")];
        f.rip_status = serde_json::from_value(json!({
            "active_rips": { "/dev/disk2": { "current_disc": "HEAT", "progress": 0.5 } }
        }))
        .unwrap();
    });

    let view = h.client.mount_drives().await;

    let drives = view.surface().snapshot();
    assert_eq!(drives.len(), 2);
    let ripping = view.surface().get("/dev/disk2").unwrap();
    assert!(ripping.is_ripping());
    assert_eq!(ripping.rip.disc.as_deref(), Some("HEAT"));
    assert!(!view.surface().get("/dev/disk3").unwrap().is_ripping());
}

#[tokio::test(start_paused = true)]
async fn detection_without_media_keeps_what_the_snapshot_knew() {
    let h = Harness::new();
    h.source.edit(|f| {
        f.drives = vec![
            serde_json::from_value(json!({
                "device": "/dev/disk2",
                "name": "SuperDrive",
                "has_audio_cd": true,
                "media_type": "AudioCD"
            }))
            .unwrap(),
        ];
    });
    let view = h.client.mount_drives().await;
    h.open().await;

    h.push("RipStarted", json!({ "drive": "/dev/disk2", "disc": "Blue Train" })).await;
    h.push("DriveDetected", json!({ "device": "/dev/disk2", "name": "USB SuperDrive" })).await;

    let d = view.surface().get("/dev/disk2").unwrap();
    assert_eq!(d.display_name(), "USB SuperDrive");
    assert!(d.has_audio_cd);
    assert_eq!(d.media_type, Some(MediaType::AudioCd));
    assert_eq!(d.rip.disc.as_deref(), Some("Blue Train"));
}

#[tokio::test(start_paused = true)]
async fn periodic_resync_prunes_missing_drives() {
    let h = Harness::new();
    h.source.edit(|f| {
        f.drives = vec![drive("/dev/disk2", "SuperDrive"), drive("/dev/disk3", "Pioneer")];
    });
    let view = h.client.mount_drives().await;
    let mut stream = view.surface().stream();
    assert_eq!(stream.current().len(), 2);

    h.source.edit(|f| f.drives.truncate(1));
    advance_secs(5).await;

    let latest = stream.changed().await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].device, "/dev/disk2");
}

#[tokio::test(start_paused = true)]
async fn elapsed_time_is_tracked_for_active_rips() {
    let h = Harness::new();
    let view = h.client.mount_drives().await;
    h.open().await;

    h.push("RipStarted", json!({ "drive": "/dev/disk2" })).await;
    advance_secs(1).await;
    assert!(view.surface().elapsed().borrow().contains_key("/dev/disk2"));

    h.push("RipCompleted", json!({ "drive": "/dev/disk2" })).await;
    advance_secs(1).await;
    assert!(view.surface().elapsed().borrow().is_empty());
}

// ── Failure and teardown ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_resync_keeps_state_and_notifies() {
    let (notifier, mut notifications) = ChannelNotifier::channel();
    let h = Harness::new();
    let client = h.client.with_notifier(Arc::new(notifier));
    h.source.edit(|f| f.drives = vec![drive("/dev/disk2", "SuperDrive")]);

    let view = client.mount_drives().await;
    assert_eq!(view.surface().len(), 1);

    h.source.set_failing(true);
    h.source.edit(|f| f.drives.clear());
    advance_secs(5).await;

    assert_eq!(view.surface().len(), 1, "previous state survives a failed fetch");
    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.level, NotificationLevel::Error);
    assert!(notification.message.starts_with("Failed to refresh drives"));

    let err = view.resync_now().await.unwrap_err();
    assert!(matches!(err, CoreError::SnapshotFailed { surface: "drives", .. }));
}

#[tokio::test(start_paused = true)]
async fn unmounted_view_stops_changing() {
    let h = Harness::new();
    let view = h.client.mount_drives().await;
    h.open().await;
    assert_eq!(h.client.dispatcher().listener_count("DriveDetected"), 1);

    view.unmount();
    assert!(!view.is_mounted());
    assert_eq!(h.client.dispatcher().listener_count("DriveDetected"), 0);

    let reads = h.source.drive_reads();
    h.push("DriveDetected", json!({ "device": "/dev/disk2" })).await;
    advance_secs(30).await;

    assert!(view.surface().is_empty());
    assert_eq!(h.source.drive_reads(), reads);
}

#[tokio::test(start_paused = true)]
async fn dropping_a_view_unsubscribes() {
    let h = Harness::new();
    {
        let _view = h.client.mount_issues().await;
        assert_eq!(h.client.dispatcher().listener_count("IssueCreated"), 1);
    }
    assert_eq!(h.client.dispatcher().listener_count("IssueCreated"), 0);
}

// ── Other surfaces ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn mount_all_seeds_every_surface() {
    let h = Harness::new();
    h.source.edit(|f| {
        f.drives = vec![drive("/dev/disk2", "SuperDrive")];
        f.issues = vec![
            serde_json::from_value(json!({ "id": 7, "title": "Rip failed", "issue_type": "rip_failure" }))
                .unwrap(),
        ];
        f.logs = vec![
            serde_json::from_value(json!({ "level": "info", "message": "newest" })).unwrap(),
            serde_json::from_value(json!({ "level": "info", "message": "oldest" })).unwrap(),
        ];
        f.operations = vec![
            serde_json::from_value(json!({ "operation_id": "op-1", "status": "running" })).unwrap(),
        ];
        f.jobs = vec![
            serde_json::from_value(json!({ "job_id": "job-1", "status": "queued" })).unwrap(),
        ];
        f.agents = vec![
            serde_json::from_value(json!({ "agent_id": "gpu-1", "status": "online" })).unwrap(),
        ];
    });

    let dashboard = h.client.mount_all().await;

    assert_eq!(dashboard.drives.surface().len(), 1);
    assert_eq!(dashboard.issues.surface().get(7).unwrap().title, "Rip failed");
    let logs = dashboard.logs.surface().snapshot();
    assert_eq!(logs[0].message, "oldest");
    assert_eq!(logs[1].message, "newest");
    let ops = dashboard.operations.surface();
    assert_eq!(ops.operations().len(), 2);
    assert_eq!(
        ops.operation(OperationKind::UpscalingJob, "job-1").unwrap().status,
        OperationStatus::Queued
    );
    assert!(ops.agent("gpu-1").is_some());

    dashboard.unmount();
    assert!(!dashboard.drives.is_mounted());
}

#[tokio::test(start_paused = true)]
async fn operation_events_update_the_operations_view() {
    let h = Harness::new();
    let view = h.client.mount_operations().await;
    h.open().await;

    h.push(
        "OperationStarted",
        json!({ "operation_id": "op-9", "operation_type": "rip", "drive": "/dev/disk2" }),
    )
    .await;
    h.push("OperationProgress", json!({ "operation_id": "op-9", "progress": 0.3 })).await;
    let op = view
        .surface()
        .operation(OperationKind::Operation, "op-9")
        .unwrap();
    assert_eq!(op.status, OperationStatus::Running);
    assert_eq!(op.operation_type.as_deref(), Some("rip"));
    assert_eq!(op.drive.as_deref(), Some("/dev/disk2"));

    h.push("OperationCompleted", json!({ "operation_id": "op-9" })).await;
    let op = view
        .surface()
        .operation(OperationKind::Operation, "op-9")
        .unwrap();
    assert_eq!(op.status, OperationStatus::Completed);
    assert!((op.progress - 1.0).abs() < f32::EPSILON);
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn commands_need_a_rest_client() {
    let h = Harness::new();
    let err = assert_err!(h.client.stop_rip().await);
    assert!(matches!(err, CoreError::Config { .. }));
}
