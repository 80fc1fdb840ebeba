// Shared fakes for the integration tests: a scripted socket transport and
// an in-memory snapshot source.
#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use url::Url;

use ripley_api::models::{
    AgentRecord, DriveInfo, IssueRecord, LogRecord, OperationRecord, RipStatus,
    UpscalingJobRecord,
};
use ripley_api::{Error, SnapshotSource, SocketCloser, SocketHandle, SocketSignal, Transport};
use ripley_core::{ClientConfig, ReconnectPolicy, ResyncIntervals};

// ── Transport ────────────────────────────────────────────────────────

struct FakeSocket {
    signals: Option<mpsc::UnboundedSender<SocketSignal>>,
    close: oneshot::Receiver<u16>,
}

/// Hands out sockets whose signals the test drives by hand.
#[derive(Default)]
pub struct FakeTransport {
    sockets: Mutex<Vec<FakeSocket>>,
    opened_urls: Mutex<Vec<Url>>,
}

impl FakeTransport {
    /// Number of sockets opened so far.
    pub fn opened(&self) -> usize {
        self.sockets.lock().unwrap().len()
    }

    pub fn last_url(&self) -> Option<Url> {
        self.opened_urls.lock().unwrap().last().cloned()
    }

    /// Deliver a signal on socket `n` (0-based open order).
    pub fn send(&self, n: usize, signal: SocketSignal) {
        let sockets = self.sockets.lock().unwrap();
        if let Some(tx) = &sockets[n].signals {
            let _ = tx.send(signal);
        }
    }

    pub fn send_text(&self, n: usize, frame: &serde_json::Value) {
        self.send(n, SocketSignal::Text(frame.to_string()));
    }

    /// End socket `n`'s signal stream without a close signal.
    pub fn vanish(&self, n: usize) {
        self.sockets.lock().unwrap()[n].signals = None;
    }

    /// The code socket `n` was asked to close with, if any.
    pub fn close_code(&self, n: usize) -> Option<u16> {
        self.sockets.lock().unwrap()[n].close.try_recv().ok()
    }
}

impl Transport for FakeTransport {
    fn open(&self, url: &Url) -> Result<SocketHandle, Error> {
        let (tx, signals) = mpsc::unbounded_channel();
        let (close_tx, close) = oneshot::channel();
        self.sockets.lock().unwrap().push(FakeSocket {
            signals: Some(tx),
            close,
        });
        self.opened_urls.lock().unwrap().push(url.clone());
        Ok(SocketHandle {
            signals,
            closer: SocketCloser::new(close_tx),
        })
    }
}

// ── Snapshot source ──────────────────────────────────────────────────

#[derive(Default)]
pub struct Fixtures {
    pub drives: Vec<DriveInfo>,
    pub rip_status: RipStatus,
    pub logs: Vec<LogRecord>,
    pub issues: Vec<IssueRecord>,
    pub operations: Vec<OperationRecord>,
    pub jobs: Vec<UpscalingJobRecord>,
    pub agents: Vec<AgentRecord>,
}

/// In-memory `SnapshotSource`. Every read fails while `failing` is set.
#[derive(Default)]
pub struct FakeSource {
    pub fixtures: Mutex<Fixtures>,
    failing: Mutex<bool>,
    drive_reads: AtomicUsize,
}

impl FakeSource {
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn drive_reads(&self) -> usize {
        self.drive_reads.load(Ordering::SeqCst)
    }

    pub fn edit(&self, f: impl FnOnce(&mut Fixtures)) {
        f(&mut self.fixtures.lock().unwrap());
    }

    fn read<T: Clone>(&self, pick: impl FnOnce(&Fixtures) -> &T) -> Result<T, Error> {
        if *self.failing.lock().unwrap() {
            return Err(Error::Api {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        Ok(pick(&self.fixtures.lock().unwrap()).clone())
    }
}

#[async_trait]
impl SnapshotSource for FakeSource {
    async fn drives(&self) -> Result<Vec<DriveInfo>, Error> {
        self.drive_reads.fetch_add(1, Ordering::SeqCst);
        self.read(|f| &f.drives)
    }

    async fn rip_status(&self) -> Result<RipStatus, Error> {
        self.read(|f| &f.rip_status)
    }

    async fn recent_logs(&self) -> Result<Vec<LogRecord>, Error> {
        self.read(|f| &f.logs)
    }

    async fn active_issues(&self) -> Result<Vec<IssueRecord>, Error> {
        self.read(|f| &f.issues)
    }

    async fn operations(&self) -> Result<Vec<OperationRecord>, Error> {
        self.read(|f| &f.operations)
    }

    async fn upscaling_jobs(&self) -> Result<Vec<UpscalingJobRecord>, Error> {
        self.read(|f| &f.jobs)
    }

    async fn agents(&self) -> Result<Vec<AgentRecord>, Error> {
        self.read(|f| &f.agents)
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

pub fn drive(device: &str, name: &str) -> DriveInfo {
    serde_json::from_value(serde_json::json!({ "device": device, "name": name })).unwrap()
}

/// Config with a 1s backoff base, 5 attempts, and only the drives resync.
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new(Url::parse("http://ripper.local:3000/").unwrap());
    config.reconnect = ReconnectPolicy {
        base_delay: Duration::from_secs(1),
        max_attempts: 5,
    };
    config.resync = ResyncIntervals {
        drives: Some(Duration::from_secs(5)),
        operations: None,
        issues: None,
        logs: None,
    };
    config
}

/// Let spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
