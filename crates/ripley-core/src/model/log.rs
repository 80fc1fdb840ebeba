// ── Log tail entries ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ripley_api::models::LogLevel;

/// One line of the log tail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    /// Server timestamp for snapshot entries, arrival time for pushed ones.
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    pub drive: Option<String>,
}
