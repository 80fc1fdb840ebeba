// ── Issues ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An unresolved problem recorded by the service (rip failure, drive
/// error, metadata miss).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
    /// Service category, e.g. `rip_failure`, `drive_error`.
    pub issue_type: String,
    pub title: String,
    pub description: String,
    pub drive: Option<String>,
    pub disc: Option<String>,
    pub resolved: bool,
    pub assigned_to: Option<String>,
}

impl Issue {
    /// Collection key. Issues without a database id are keyed by timestamp.
    pub fn key(&self) -> String {
        match self.id {
            Some(id) => id.to_string(),
            None => format!(
                "issue:{}",
                self.timestamp.map_or(0, |ts| ts.timestamp_millis())
            ),
        }
    }
}
