// ── Core error types ──
//
// What callers of ripley-core can see go wrong. Socket trouble never shows
// up here (it is retried and reported through connection status); these
// come from snapshot reads, commands, payload decoding and configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // ── Reaching the service ─────────────────────────────────────────
    #[error("ripping service unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("ripping service did not answer in time")]
    Timeout,

    // ── Service answers ──────────────────────────────────────────────
    #[error("not found: {identifier}")]
    NotFound { identifier: String },

    /// The service refused a read or command.
    #[error("service rejected the request: {message}")]
    Rejected {
        message: String,
        status: Option<u16>,
    },

    #[error("unexpected response from service: {0}")]
    UnexpectedResponse(String),

    // ── Reconciliation ───────────────────────────────────────────────
    #[error("refreshing {surface} failed: {message}")]
    SnapshotFailed { surface: &'static str, message: String },

    #[error("malformed {event_type} payload: {message}")]
    InvalidPayload { event_type: String, message: String },

    // ── Setup ────────────────────────────────────────────────────────
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub(crate) fn invalid_payload(event_type: &str, err: &serde_json::Error) -> Self {
        Self::InvalidPayload {
            event_type: event_type.to_owned(),
            message: err.to_string(),
        }
    }
}

impl From<ripley_api::Error> for CoreError {
    fn from(err: ripley_api::Error) -> Self {
        use ripley_api::Error as Api;

        match err {
            Api::Transport(e) if e.is_timeout() => Self::Timeout,
            Api::Transport(e) if e.status().is_some() => Self::Rejected {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            Api::Transport(e) => Self::Unreachable {
                reason: e.to_string(),
            },
            Api::WebSocketConnect(reason) => Self::Unreachable { reason },
            Api::InvalidUrl(_) | Api::UnsupportedScheme(_) => Self::Config {
                message: err.to_string(),
            },
            Api::Api { status: 404, message } => Self::NotFound {
                identifier: message,
            },
            Api::Api { status, message } => Self::Rejected {
                message,
                status: Some(status),
            },
            Api::Deserialization { message, .. } => Self::UnexpectedResponse(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_not_found_maps_to_not_found() {
        let err = CoreError::from(ripley_api::Error::Api {
            status: 404,
            message: "no such issue".into(),
        });
        assert!(matches!(err, CoreError::NotFound { identifier } if identifier == "no such issue"));
    }

    #[test]
    fn api_server_error_keeps_status() {
        let err = CoreError::from(ripley_api::Error::Api {
            status: 500,
            message: "database locked".into(),
        });
        assert!(matches!(err, CoreError::Rejected { status: Some(500), .. }));
        assert_eq!(err.to_string(), "service rejected the request: database locked");
    }

    #[test]
    fn bad_scheme_is_a_config_error() {
        let err = CoreError::from(ripley_api::Error::UnsupportedScheme("ftp".into()));
        assert!(matches!(err, CoreError::Config { ref message } if message.contains("ftp")));
    }
}
