// ── Connection state machine ──
//
// Pure transition function for the event socket lifecycle. `step` never
// touches a socket, a timer, or a listener: it returns the effects the
// runtime (`ConnectionManager`) must carry out. That keeps every
// reconnect and close-classification rule unit-testable without a runtime.

use std::time::Duration;

use ripley_api::Envelope;
use ripley_api::websocket::{CLOSE_ABNORMAL, CLOSE_GOING_AWAY, CLOSE_NORMAL, SocketSignal};
use strum::{Display, IntoStaticStr};
use tracing::{debug, warn};

use crate::config::ReconnectPolicy;

/// Lifecycle state of the event socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, IntoStaticStr)]
pub enum ConnectionState {
    /// No socket has been opened yet.
    #[default]
    Idle,
    Connecting,
    Open,
    /// `disconnect()` asked the socket to close; waiting for it to report.
    Closing,
    /// No socket. A reconnect may be pending unless closed intentionally.
    Closed,
}

impl ConnectionState {
    /// `Connecting` or `Open`: a live socket exists.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// How a socket closure is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    /// 1000/1001 or a clean close handshake: an established socket went away.
    Clean,
    /// 1006: treated as an attempt that never established.
    NeverEstablished,
    /// Any other code: abnormal closure after establishment.
    Abnormal,
}

impl CloseKind {
    pub fn classify(code: u16, was_clean: bool) -> Self {
        match code {
            CLOSE_NORMAL | CLOSE_GOING_AWAY => Self::Clean,
            _ if was_clean => Self::Clean,
            CLOSE_ABNORMAL => Self::NeverEstablished,
            _ => Self::Abnormal,
        }
    }
}

/// Something that happened to the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Connect,
    Disconnect,
    /// A signal from the socket opened for `generation`.
    Socket { generation: u64, signal: SocketSignal },
    /// The transport could not even construct the socket for `generation`.
    OpenFailed { generation: u64 },
    /// A scheduled reconnect timer fired.
    ReconnectDue,
}

/// Something the runtime must do.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open a new socket tagged with `generation`, discarding any previous one.
    OpenSocket { generation: u64 },
    /// Close the current socket with `code` and drop the reference to it.
    CloseSocket { code: u16 },
    ScheduleReconnect { attempt: u32, delay: Duration },
    CancelReconnect,
    /// The reconnect budget is spent; no further attempt is scheduled.
    GiveUp { attempts: u32 },
    /// Publish `connection { connected }`.
    Status(bool),
    /// Publish a parsed server envelope.
    Dispatch(Envelope),
}

/// The connection FSM.
#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    reconnect_attempt: u32,
    intentionally_closed: bool,
    /// Whether the last published status was `connected: true`.
    connected: bool,
    /// Tag of the current socket. Signals from older sockets are ignored.
    generation: u64,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            reconnect_attempt: 0,
            intentionally_closed: false,
            connected: false,
            generation: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.reconnect_attempt
    }

    pub fn intentionally_closed(&self) -> bool {
        self.intentionally_closed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Advance the machine by one input.
    pub fn step(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Connect => self.connect(),
            Input::Disconnect => self.disconnect(),
            Input::ReconnectDue => self.reconnect_due(),
            Input::OpenFailed { generation } => {
                if generation != self.generation || self.state != ConnectionState::Connecting {
                    return Vec::new();
                }
                self.closed(CLOSE_ABNORMAL, false)
            }
            Input::Socket { generation, signal } => {
                if generation != self.generation {
                    debug!(generation, current = self.generation, "ignoring stale socket signal");
                    return Vec::new();
                }
                self.socket(signal)
            }
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn connect(&mut self) -> Vec<Effect> {
        if self.state.is_active() {
            return Vec::new();
        }
        // After disconnect() or a spent budget this is a fresh connection;
        // a connect() during backoff keeps counting.
        if self.intentionally_closed || self.reconnect_attempt > self.policy.max_attempts {
            self.reconnect_attempt = 0;
        }
        self.intentionally_closed = false;
        let mut effects = vec![Effect::CancelReconnect];
        effects.extend(self.open());
        effects
    }

    fn reconnect_due(&mut self) -> Vec<Effect> {
        if self.intentionally_closed || self.state.is_active() {
            return Vec::new();
        }
        self.open()
    }

    fn open(&mut self) -> Vec<Effect> {
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        vec![Effect::OpenSocket {
            generation: self.generation,
        }]
    }

    fn disconnect(&mut self) -> Vec<Effect> {
        if self.intentionally_closed
            && matches!(self.state, ConnectionState::Closing | ConnectionState::Closed)
        {
            return Vec::new();
        }
        self.intentionally_closed = true;

        let mut effects = vec![Effect::CancelReconnect];
        if self.state.is_active() {
            effects.push(Effect::CloseSocket { code: CLOSE_NORMAL });
            self.state = ConnectionState::Closing;
        } else {
            self.state = ConnectionState::Closed;
        }
        if self.connected {
            self.connected = false;
            effects.push(Effect::Status(false));
        }
        effects
    }

    fn socket(&mut self, signal: SocketSignal) -> Vec<Effect> {
        match signal {
            SocketSignal::Open => {
                if self.state != ConnectionState::Connecting {
                    return Vec::new();
                }
                self.state = ConnectionState::Open;
                self.reconnect_attempt = 0;
                self.connected = true;
                vec![Effect::Status(true)]
            }
            SocketSignal::Text(text) => {
                if self.state != ConnectionState::Open {
                    return Vec::new();
                }
                match Envelope::parse(&text) {
                    Ok(envelope) => vec![Effect::Dispatch(envelope)],
                    Err(e) => {
                        warn!(error = %e, frame = %text, "dropping malformed event frame");
                        Vec::new()
                    }
                }
            }
            SocketSignal::Error(message) => {
                debug!(error = %message, "event socket error");
                Vec::new()
            }
            SocketSignal::Closed { code, was_clean } => self.closed(code, was_clean),
        }
    }

    fn closed(&mut self, code: u16, was_clean: bool) -> Vec<Effect> {
        match self.state {
            ConnectionState::Closing => {
                // The close we asked for; status was already published.
                self.state = ConnectionState::Closed;
                return Vec::new();
            }
            ConnectionState::Connecting | ConnectionState::Open => {}
            ConnectionState::Idle | ConnectionState::Closed => return Vec::new(),
        }

        self.state = ConnectionState::Closed;
        let was_connected = std::mem::take(&mut self.connected);

        let mut effects = Vec::new();
        let kind = CloseKind::classify(code, was_clean);
        match kind {
            CloseKind::Clean | CloseKind::Abnormal => effects.push(Effect::Status(false)),
            CloseKind::NeverEstablished if was_connected => effects.push(Effect::Status(false)),
            CloseKind::NeverEstablished => {}
        }
        debug!(code, was_clean, ?kind, "event socket closed");

        if self.intentionally_closed {
            return effects;
        }

        self.reconnect_attempt += 1;
        match self.policy.delay_for(self.reconnect_attempt) {
            Some(delay) => effects.push(Effect::ScheduleReconnect {
                attempt: self.reconnect_attempt,
                delay,
            }),
            None => effects.push(Effect::GiveUp {
                attempts: self.reconnect_attempt - 1,
            }),
        }
        effects
    }
}
