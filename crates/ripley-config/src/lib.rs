//! Persistent configuration for the Ripley dashboard client.
//!
//! TOML file plus `RIPLEY_*` environment overrides, validation, and
//! translation to `ripley_core::ClientConfig`. Also installs the tracing
//! subscriber, since the log level lives in the same file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use url::Url;

use ripley_core::{ClientConfig, ReconnectPolicy, ResyncIntervals};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Dashboard page URL (e.g. "http://ripper.local:3000").
    pub url: String,

    /// REST request timeout in seconds.
    pub timeout: u64,

    /// Accept self-signed certificates.
    pub insecure: bool,

    /// Default tracing filter; `RUST_LOG` wins when set.
    pub log_level: String,

    pub log_format: LogFormat,

    /// Log lines kept by the logs view.
    pub log_capacity: usize,

    pub reconnect: Reconnect,

    pub resync: Resync,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".into(),
            timeout: 30,
            insecure: false,
            log_level: "info".into(),
            log_format: LogFormat::Pretty,
            log_capacity: ripley_core::config::DEFAULT_LOG_CAPACITY,
            reconnect: Reconnect::default(),
            resync: Resync::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Reconnect {
    /// Delay before the first reconnect; doubles per attempt.
    pub base_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for Reconnect {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_attempts: ripley_core::config::DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

/// Periodic resync per view, in seconds. `0` disables the timer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Resync {
    pub drives_secs: u64,
    pub operations_secs: u64,
    pub issues_secs: u64,
    pub logs_secs: u64,
}

impl Default for Resync {
    fn default() -> Self {
        Self {
            drives_secs: 5,
            operations_secs: 2,
            issues_secs: 5,
            logs_secs: 0,
        }
    }
}

fn interval(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Check values `ClientConfig` cannot represent.
    pub fn validate(&self) -> Result<Url, ConfigError> {
        let url: Url = self
            .url
            .parse()
            .map_err(|e| ConfigError::invalid("url", format!("'{}': {e}", self.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "url",
                format!("expected http or https, got '{}'", url.scheme()),
            ));
        }
        if self.timeout == 0 {
            return Err(ConfigError::invalid("timeout", "must be at least 1 second"));
        }
        if self.log_capacity == 0 {
            return Err(ConfigError::invalid("log_capacity", "must be at least 1"));
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::invalid(
                "reconnect.base_delay_ms",
                "must be at least 1",
            ));
        }
        // Past 31 attempts the doubled delay no longer fits.
        if !(1..=31).contains(&self.reconnect.max_attempts) {
            return Err(ConfigError::invalid(
                "reconnect.max_attempts",
                format!("expected 1..=31, got {}", self.reconnect.max_attempts),
            ));
        }
        EnvFilter::try_new(&self.log_level)
            .map_err(|e| ConfigError::invalid("log_level", e.to_string()))?;
        Ok(url)
    }

    /// Validate and build the runtime client configuration.
    pub fn to_client_config(&self) -> Result<ClientConfig, ConfigError> {
        let base_url = self.validate()?;
        let mut config = ClientConfig::new(base_url);
        config.timeout = Duration::from_secs(self.timeout);
        config.accept_invalid_certs = self.insecure;
        config.log_capacity = self.log_capacity;
        config.reconnect = ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnect.base_delay_ms),
            max_attempts: self.reconnect.max_attempts,
        };
        config.resync = ResyncIntervals {
            drives: interval(self.resync.drives_secs),
            operations: interval(self.resync.operations_secs),
            issues: interval(self.resync.issues_secs),
            logs: interval(self.resync.logs_secs),
        };
        Ok(config)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "ripley", "ripley").map_or_else(
        || PathBuf::from(".ripley").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading and saving ──────────────────────────────────────────────

/// Layer defaults, the TOML file at `path` (if present), and `RIPLEY_*`
/// variables. Nested keys use a double underscore:
/// `RIPLEY_RECONNECT__MAX_ATTEMPTS=8`.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RIPLEY_").split("__"))
}

/// Load the config from the default path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    tracing::debug!(path = %path.display(), url = %config.url, "config loaded");
    Ok(config)
}

/// Write `cfg` as TOML, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Tracing ─────────────────────────────────────────────────────────

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the
/// configured level. A subscriber that is already installed is kept.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_validate() {
        let client = Config::default().to_client_config().unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:3000/");
        assert_eq!(client.resync, ResyncIntervals::default());
        assert_eq!(client.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn zero_interval_disables_resync() {
        let mut cfg = Config::default();
        cfg.resync.drives_secs = 0;
        cfg.resync.logs_secs = 10;
        let client = cfg.to_client_config().unwrap();
        assert_eq!(client.resync.drives, None);
        assert_eq!(client.resync.logs, Some(Duration::from_secs(10)));
    }

    #[test]
    fn rejects_non_http_url() {
        let cfg = Config {
            url: "ftp://ripper.local".into(),
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "url"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = Config::default();
        cfg.reconnect.max_attempts = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.log_capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.log_level = "ripley=loud".into();
        assert!(cfg.validate().is_err());
    }
}
