use thiserror::Error;

/// Errors from talking to the ripping service.
///
/// REST calls can fail at any of these; the event socket only reports
/// `UnsupportedScheme` and `WebSocketConnect` here, since everything after
/// the handshake arrives as a `SocketSignal`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// The request never got a response (refused, DNS, TLS, timeout).
    #[error("request to ripping service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bad service URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The page URL has a scheme the event socket cannot be derived from.
    #[error("unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    // ── Service responses ───────────────────────────────────────────
    /// Non-success status, with the service's `{ "error": ... }` text if present.
    #[error("service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// A 2xx body that is not the JSON we expected. `body` keeps the raw
    /// text (often an HTML error page from a proxy).
    #[error("unexpected response body: {message}")]
    Deserialization { message: String, body: String },

    // ── Event socket ────────────────────────────────────────────────
    #[error("event socket could not be opened: {0}")]
    WebSocketConnect(String),
}

impl Error {
    /// Worth retrying later: the service was unreachable or overloaded.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
