// ── Log tail surface ──
//
// Append-only, arrival-ordered, bounded. A snapshot (newest first on the
// wire) replaces the buffer, except for lines pushed while it was in flight.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use ripley_api::events::LogPayload;
use ripley_api::models::LogRecord;
use ripley_api::{EventKind, SnapshotSource};

use crate::config::DEFAULT_LOG_CAPACITY;
use crate::error::CoreError;
use crate::model::LogLine;
use crate::store::{LogBuffer, Snapshot};
use crate::stream::EntityStream;
use crate::view::{Surface, payload};

/// No fetch in flight.
const NO_MARK: u64 = u64::MAX;

pub struct LogsSurface {
    lines: LogBuffer<LogLine>,
    fetch_mark: AtomicU64,
}

impl Default for LogsSurface {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogsSurface {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: LogBuffer::new(capacity),
            fetch_mark: AtomicU64::new(NO_MARK),
        }
    }

    /// Current tail, oldest first.
    pub fn snapshot(&self) -> Snapshot<LogLine> {
        self.lines.snapshot()
    }

    pub fn stream(&self) -> EntityStream<LogLine> {
        EntityStream::new(self.lines.subscribe())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lines.capacity()
    }

    /// Drop every local line (after the service confirmed a clear).
    pub fn clear(&self) {
        self.lines.clear();
    }
}

#[async_trait]
impl Surface for LogsSurface {
    const NAME: &'static str = "logs";

    const EVENT_TYPES: &'static [EventKind] = &[EventKind::Log];

    type Fetched = Vec<LogRecord>;

    fn fetch_started(&self) {
        self.fetch_mark.store(self.lines.pushed(), Ordering::Release);
    }

    async fn fetch(source: &dyn SnapshotSource) -> Result<Vec<LogRecord>, CoreError> {
        Ok(source.recent_logs().await?)
    }

    fn apply_snapshot(&self, fetched: Vec<LogRecord>) {
        let now = Utc::now();
        let lines = fetched
            .into_iter()
            .rev()
            .map(|r| LogLine::from_record(r, now))
            .collect();
        let mark = self.fetch_mark.swap(NO_MARK, Ordering::AcqRel);
        self.lines.replace_since(lines, mark, |a, b| {
            a.level == b.level && a.message == b.message && a.drive == b.drive
        });
    }

    fn apply_event(&self, kind: EventKind, data: &Value) -> Result<(), CoreError> {
        if kind == EventKind::Log {
            let LogPayload {
                level,
                message,
                drive,
            } = payload(kind, data)?;
            self.lines.push(LogLine {
                timestamp: Utc::now(),
                level,
                message,
                drive,
            });
        }
        Ok(())
    }
}
