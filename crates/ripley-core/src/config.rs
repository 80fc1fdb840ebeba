// ── Runtime configuration for the dashboard client ──
//
// These are the *runtime* types consumed by `DashboardClient`.
// Disk-persisted configuration lives in `ripley-config`, which
// translates its file/env layering into a `ClientConfig`.

use std::time::Duration;

use url::Url;

/// Default base delay before the first reconnect attempt.
pub const DEFAULT_RECONNECT_BASE: Duration = Duration::from_secs(1);
/// Default cap on consecutive reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
/// Default log tail length.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Top-level client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Dashboard page URL, e.g. `http://ripper.local:3000`. The REST base
    /// and the event socket endpoint are both derived from it.
    pub base_url: Url,
    /// Per-request REST timeout.
    pub timeout: Duration,
    /// Accept self-signed TLS certificates.
    pub accept_invalid_certs: bool,
    pub reconnect: ReconnectPolicy,
    pub resync: ResyncIntervals,
    /// Maximum number of log lines kept by the logs view.
    pub log_capacity: usize,
    /// Period of the elapsed-rip-time recompute.
    pub elapsed_tick: Duration,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(30),
            accept_invalid_certs: false,
            reconnect: ReconnectPolicy::default(),
            resync: ResyncIntervals::default(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            elapsed_tick: Duration::from_secs(1),
        }
    }
}

/// Exponential reconnect policy: `base * 2^(attempt - 1)`, capped by attempt
/// count rather than by delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_RECONNECT_BASE,
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based attempt, or `None` once the attempt
    /// exceeds the cap. Delays saturate rather than overflow.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(self.base_delay.saturating_mul(factor))
    }
}

/// Periodic snapshot resync interval per surface. `None` disables the
/// periodic resync; the initial seed still happens on mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResyncIntervals {
    pub drives: Option<Duration>,
    pub operations: Option<Duration>,
    pub issues: Option<Duration>,
    pub logs: Option<Duration>,
}

impl Default for ResyncIntervals {
    fn default() -> Self {
        Self {
            drives: Some(Duration::from_secs(5)),
            operations: Some(Duration::from_secs(2)),
            issues: Some(Duration::from_secs(5)),
            logs: None,
        }
    }
}
