// ── Derived aggregates ──
//
// Pure functions over reconciled snapshots. Nothing here is stored; views
// recompute on demand or on their clock tick.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::{Drive, Issue, LogLevel, LogLine, Operation, OperationStatus};

/// Elapsed time of every active rip, keyed by device. Start times in the
/// future (clock skew) count as zero.
pub fn rip_elapsed(drives: &[Arc<Drive>], now: DateTime<Utc>) -> BTreeMap<String, Duration> {
    drives
        .iter()
        .filter(|d| d.rip.is_active())
        .filter_map(|d| {
            let started = d.rip.started_at?;
            let elapsed = (now - started).to_std().unwrap_or_default();
            Some((d.device.clone(), elapsed))
        })
        .collect()
}

/// Number of operations and jobs per status.
pub fn operation_status_buckets(ops: &[Arc<Operation>]) -> BTreeMap<OperationStatus, usize> {
    let mut buckets = BTreeMap::new();
    for op in ops {
        *buckets.entry(op.status).or_insert(0) += 1;
    }
    buckets
}

/// Operations and jobs that can still change.
pub fn active_operations(ops: &[Arc<Operation>]) -> usize {
    ops.iter().filter(|op| !op.status.is_terminal()).count()
}

/// Number of open issues per issue type.
pub fn issue_counts_by_type(issues: &[Arc<Issue>]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for issue in issues.iter().filter(|i| !i.resolved) {
        *counts.entry(issue.issue_type.clone()).or_insert(0) += 1;
    }
    counts
}

/// Number of log lines per level.
pub fn level_counts(logs: &[Arc<LogLine>]) -> BTreeMap<LogLevel, usize> {
    let mut counts = BTreeMap::new();
    for line in logs {
        *counts.entry(line.level).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{OperationKind, RipActivity};
    use pretty_assertions::assert_eq;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn elapsed_ignores_idle_drives_and_clamps_skew() {
        let mut ripping = Drive::new("/dev/disk2");
        ripping.rip.activity = Some(RipActivity::Ripping);
        ripping.rip.started_at = Some(at("2026-02-10T12:00:00Z"));

        let mut skewed = Drive::new("/dev/disk3");
        skewed.rip.activity = Some(RipActivity::Paused);
        skewed.rip.started_at = Some(at("2026-02-10T12:05:00Z"));

        let idle = Drive::new("/dev/disk4");

        let elapsed = rip_elapsed(
            &[Arc::new(ripping), Arc::new(skewed), Arc::new(idle)],
            at("2026-02-10T12:01:30Z"),
        );
        assert_eq!(elapsed.len(), 2);
        assert_eq!(elapsed["/dev/disk2"], Duration::from_secs(90));
        assert_eq!(elapsed["/dev/disk3"], Duration::ZERO);
    }

    #[test]
    fn operation_buckets_and_active_count() {
        let ops: Vec<_> = [
            OperationStatus::Running,
            OperationStatus::Running,
            OperationStatus::Failed,
            OperationStatus::Queued,
        ]
        .into_iter()
        .enumerate()
        .map(|(i, status)| {
            let mut op = Operation::new(OperationKind::Operation, i.to_string());
            op.status = status;
            Arc::new(op)
        })
        .collect();

        let buckets = operation_status_buckets(&ops);
        assert_eq!(buckets[&OperationStatus::Running], 2);
        assert_eq!(buckets[&OperationStatus::Failed], 1);
        assert_eq!(active_operations(&ops), 3);
    }

    #[test]
    fn level_counts_group_by_level() {
        let line = |level| {
            Arc::new(LogLine {
                timestamp: at("2026-02-10T12:00:00Z"),
                level,
                message: String::new(),
                drive: None,
            })
        };
        let counts = level_counts(&[line(LogLevel::Error), line(LogLevel::Info), line(LogLevel::Error)]);
        assert_eq!(counts[&LogLevel::Error], 2);
        assert_eq!(counts.get(&LogLevel::Warning), None);
    }
}
