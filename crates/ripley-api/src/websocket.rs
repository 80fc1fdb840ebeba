//! Event socket transport.
//!
//! A [`Transport`] opens one bidirectional message channel to the service's
//! event endpoint and reports what happens to it as a sequence of
//! [`SocketSignal`]s: `Open`, zero or more `Text` frames, optional `Error`s,
//! and exactly one terminal `Closed { code, was_clean }`.
//!
//! The transport does not reconnect or parse anything. Lifecycle policy
//! lives in `ripley-core`'s connection manager, which owns the socket
//! exclusively.
//!
//! # Example
//!
//! ```rust,ignore
//! use ripley_api::websocket::{event_stream_url, SocketSignal, Transport, TungsteniteTransport};
//!
//! let url = event_stream_url(&"https://ripper.local:3000/".parse()?)?;
//! let mut socket = TungsteniteTransport.open(&url)?;
//!
//! while let Some(signal) = socket.signals.recv().await {
//!     if let SocketSignal::Text(frame) = signal {
//!         println!("{frame}");
//!     }
//! }
//! ```

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use url::Url;

use crate::error::Error;

/// Fixed path of the event endpoint on the ripping service.
pub const EVENT_STREAM_PATH: &str = "/api/ws";

/// Normal closure.
pub const CLOSE_NORMAL: u16 = 1000;
/// Endpoint going away (page unload, server restart).
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close frame without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame. Reserved, never sent on the wire.
pub const CLOSE_ABNORMAL: u16 = 1006;

// ── Signals ──────────────────────────────────────────────────────────

/// Low-level lifecycle signal of one socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketSignal {
    /// Handshake completed.
    Open,
    /// One text frame.
    Text(String),
    /// A transport error. Always followed by `Closed`.
    Error(String),
    /// Terminal signal; nothing follows it.
    Closed { code: u16, was_clean: bool },
}

/// One opened socket: its signal stream plus the means to close it.
///
/// Dropping the handle without calling [`close`](Self::close) also tears the
/// socket down (with a normal-closure code).
#[derive(Debug)]
pub struct SocketHandle {
    pub signals: mpsc::UnboundedReceiver<SocketSignal>,
    pub closer: SocketCloser,
}

/// Requests closure of a socket. Idempotent.
#[derive(Debug)]
pub struct SocketCloser(Option<oneshot::Sender<u16>>);

impl SocketCloser {
    pub fn new(tx: oneshot::Sender<u16>) -> Self {
        Self(Some(tx))
    }

    /// Close with the given status code. Later calls are no-ops.
    pub fn close(&mut self, code: u16) {
        if let Some(tx) = self.0.take() {
            // The socket task may already be gone; nothing left to close then.
            let _ = tx.send(code);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.0.as_ref().is_none_or(oneshot::Sender::is_closed)
    }
}

// ── Transport ────────────────────────────────────────────────────────

/// Factory for event sockets.
///
/// `open` returns as soon as the connection attempt is under way; the
/// outcome arrives as signals. An `Err` means the socket could not even be
/// constructed (bad URL, no runtime).
pub trait Transport: Send + Sync + 'static {
    fn open(&self, url: &Url) -> Result<SocketHandle, Error>;
}

/// Production transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl Transport for TungsteniteTransport {
    fn open(&self, url: &Url) -> Result<SocketHandle, Error> {
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::UnsupportedScheme(url.scheme().to_owned()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        let (signal_tx, signals) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = oneshot::channel();

        runtime.spawn(socket_task(url.clone(), signal_tx, close_rx));

        Ok(SocketHandle {
            signals,
            closer: SocketCloser::new(close_tx),
        })
    }
}

// ── Single socket lifecycle ──────────────────────────────────────────

/// Drive one socket from handshake to close, reporting every step.
async fn socket_task(
    url: Url,
    tx: mpsc::UnboundedSender<SocketSignal>,
    mut close_rx: oneshot::Receiver<u16>,
) {
    tracing::info!(url = %url, "Connecting to event socket");

    let handshake = tokio::select! {
        biased;
        _ = &mut close_rx => {
            // Closed while still connecting: the attempt never established.
            let _ = tx.send(SocketSignal::Closed { code: CLOSE_ABNORMAL, was_clean: false });
            return;
        }
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
    };

    let mut ws = match handshake {
        Ok((ws, _response)) => ws,
        Err(e) => {
            tracing::debug!(error = %e, "Event socket handshake failed");
            let _ = tx.send(SocketSignal::Error(e.to_string()));
            let _ = tx.send(SocketSignal::Closed { code: CLOSE_ABNORMAL, was_clean: false });
            return;
        }
    };

    tracing::info!("Event socket connected");
    let _ = tx.send(SocketSignal::Open);

    loop {
        tokio::select! {
            biased;
            requested = &mut close_rx => {
                // A dropped closer means the owner discarded the socket.
                let code = requested.unwrap_or(CLOSE_NORMAL);
                let frame = CloseFrame { code: CloseCode::from(code), reason: "".into() };
                if let Err(e) = ws.close(Some(frame)).await {
                    tracing::debug!(error = %e, "Error sending close frame");
                }
                let _ = tx.send(SocketSignal::Closed { code, was_clean: true });
                return;
            }
            frame = ws.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let _ = tx.send(SocketSignal::Text(text.as_str().to_owned()));
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("Event socket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let code = frame.as_ref().map_or(CLOSE_NO_STATUS, |cf| u16::from(cf.code));
                        if let Some(ref cf) = frame {
                            tracing::info!(code = %cf.code, reason = %cf.reason, "Event socket close frame received");
                        } else {
                            tracing::info!("Event socket close frame received (no payload)");
                        }
                        let _ = tx.send(SocketSignal::Closed { code, was_clean: true });
                        return;
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(SocketSignal::Error(e.to_string()));
                        let _ = tx.send(SocketSignal::Closed { code: CLOSE_ABNORMAL, was_clean: false });
                        return;
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("Event socket stream ended");
                        let _ = tx.send(SocketSignal::Closed { code: CLOSE_ABNORMAL, was_clean: false });
                        return;
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Endpoint selection ───────────────────────────────────────────────

/// Derive the event socket URL from the dashboard page URL.
///
/// `http` maps to `ws`, `https` to `wss`; host and port are kept and the
/// path is always [`EVENT_STREAM_PATH`].
pub fn event_stream_url(page: &Url) -> Result<Url, Error> {
    let scheme = match page.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    };
    let host = page
        .host_str()
        .ok_or_else(|| Error::UnsupportedScheme(page.scheme().to_owned()))?;
    let url_str = match page.port() {
        Some(p) => format!("{scheme}://{host}:{p}{EVENT_STREAM_PATH}"),
        None => format!("{scheme}://{host}{EVENT_STREAM_PATH}"),
    };
    Ok(Url::parse(&url_str)?)
}

// ── Tests ────────────────────────────────────────────────────────────
