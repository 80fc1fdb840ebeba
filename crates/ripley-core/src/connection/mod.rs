// ── Connection manager ──
//
// Owns the event socket exclusively. Every input (user calls, socket
// signals, timer expiry) goes through `ConnectionMachine::step` under one
// lock; socket and timer effects and the status watch run under that lock.
// Listener-facing effects are queued in step order on an outbox and
// delivered after the lock is released, by one thread at a time.

pub mod machine;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use ripley_api::websocket::{CLOSE_ABNORMAL, CLOSE_NORMAL, SocketCloser, SocketSignal, Transport};
use ripley_api::{EventKind, websocket};

pub use machine::{CloseKind, ConnectionMachine, ConnectionState, Effect, Input};

use crate::config::ReconnectPolicy;
use crate::dispatch::EventDispatcher;

/// Runtime driver of the connection FSM.
///
/// Cheaply cloneable; all clones drive the same socket. `connect()` and
/// `disconnect()` never fail: transport problems are retried with backoff
/// and surfaced only through [`status`](Self::status).
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    url: Url,
    dispatcher: EventDispatcher,
    core: Mutex<Core>,
    outbox: Mutex<Outbox>,
    state_tx: watch::Sender<ConnectionState>,
    status_tx: watch::Sender<bool>,
}

/// Listener-facing effects awaiting delivery. `draining` marks that some
/// caller is already delivering; others only enqueue.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<Effect>,
    draining: bool,
}

struct Core {
    machine: ConnectionMachine,
    closer: Option<SocketCloser>,
    reconnect: Option<CancellationToken>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &self.inner.url.as_str())
            .field("state", &*self.inner.state_tx.borrow())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create a manager for the event endpoint at `url`. Nothing is opened
    /// until [`connect`](Self::connect).
    pub fn new(
        transport: Arc<dyn Transport>,
        url: Url,
        dispatcher: EventDispatcher,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (status_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                transport,
                url,
                dispatcher,
                core: Mutex::new(Core {
                    machine: ConnectionMachine::new(policy),
                    closer: None,
                    reconnect: None,
                }),
                outbox: Mutex::new(Outbox::default()),
                state_tx,
                status_tx,
            }),
        }
    }

    /// Derive the endpoint from the dashboard page URL
    /// (`http` → `ws`, `https` → `wss`, path `/api/ws`).
    pub fn for_page(
        transport: Arc<dyn Transport>,
        page: &Url,
        dispatcher: EventDispatcher,
        policy: ReconnectPolicy,
    ) -> Result<Self, crate::CoreError> {
        let url = websocket::event_stream_url(page)?;
        Ok(Self::new(transport, url, dispatcher, policy))
    }

    /// Open the socket unless one is already connecting or open.
    pub fn connect(&self) {
        self.inner.handle(Input::Connect);
    }

    /// Close the socket (code 1000) and suppress any pending reconnect.
    /// Idempotent.
    pub fn disconnect(&self) {
        self.inner.handle(Input::Disconnect);
    }

    /// Lifecycle state stream.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Connected flag, mirroring the published `connection` events.
    pub fn status(&self) -> watch::Receiver<bool> {
        self.inner.status_tx.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.status_tx.borrow()
    }

    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.lock().machine.reconnect_attempt()
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one input through the machine and carry out its effects.
    fn handle(self: &Arc<Self>, input: Input) {
        {
            let mut core = self.lock();
            let mut queue = VecDeque::from([input]);
            while let Some(input) = queue.pop_front() {
                for effect in core.machine.step(input) {
                    match effect {
                        Effect::OpenSocket { generation } => {
                            if let Err(input) = self.open_socket(&mut core, generation) {
                                queue.push_back(input);
                            }
                        }
                        Effect::CloseSocket { code } => {
                            if let Some(mut closer) = core.closer.take() {
                                closer.close(code);
                            }
                        }
                        Effect::ScheduleReconnect { attempt, delay } => {
                            self.schedule_reconnect(&mut core, attempt, delay);
                        }
                        Effect::CancelReconnect => {
                            if let Some(token) = core.reconnect.take() {
                                token.cancel();
                            }
                        }
                        Effect::GiveUp { attempts } => {
                            warn!(attempts, url = %self.url, "giving up on event socket; call connect() to retry");
                        }
                        Effect::Status(connected) => {
                            self.status_tx.send_replace(connected);
                            self.outbox().queue.push_back(effect);
                        }
                        Effect::Dispatch(_) => self.outbox().queue.push_back(effect),
                    }
                }
            }
            self.state_tx.send_replace(core.machine.state());
        }

        self.deliver();
    }

    /// Run queued listener effects in the order the machine produced them.
    /// Callbacks run with no lock held, so they may call back into the
    /// manager; what they cause is delivered by this same loop afterwards.
    fn deliver(&self) {
        {
            let mut outbox = self.outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        loop {
            let next = {
                let mut outbox = self.outbox();
                let next = outbox.queue.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            match next {
                Some(Effect::Status(connected)) => self
                    .dispatcher
                    .emit(EventKind::Connection.as_ref(), json!({ "connected": connected })),
                Some(Effect::Dispatch(envelope)) => self.dispatcher.emit_envelope(envelope),
                Some(_) => {}
                None => return,
            }
        }
    }

    /// Open a socket for `generation`, replacing any previous one. A
    /// construction failure comes back as the input to feed next.
    fn open_socket(self: &Arc<Self>, core: &mut Core, generation: u64) -> Result<(), Input> {
        // Dropping a stale closer tears that socket down; its late signals
        // carry an old generation and are ignored.
        if let Some(mut stale) = core.closer.take() {
            stale.close(CLOSE_NORMAL);
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime; cannot open event socket");
            return Err(Input::OpenFailed { generation });
        };

        match self.transport.open(&self.url) {
            Ok(handle) => {
                debug!(generation, url = %self.url, "event socket opening");
                core.closer = Some(handle.closer);
                runtime.spawn(pump(Arc::downgrade(self), generation, handle.signals));
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, url = %self.url, "failed to construct event socket");
                Err(Input::OpenFailed { generation })
            }
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, core: &mut Core, attempt: u32, delay: Duration) {
        if let Some(previous) = core.reconnect.take() {
            previous.cancel();
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime; reconnect not scheduled");
            return;
        };

        info!(attempt, delay_ms = delay.as_millis(), "scheduling event socket reconnect");
        let token = CancellationToken::new();
        core.reconnect = Some(token.clone());
        runtime.spawn(reconnect_timer(Arc::downgrade(self), delay, token));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let core = self.core.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = core.reconnect.take() {
            token.cancel();
        }
        if let Some(mut closer) = core.closer.take() {
            closer.close(CLOSE_NORMAL);
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Forward one socket's signals, in arrival order, tagged with its generation.
async fn pump(inner: Weak<Inner>, generation: u64, mut signals: mpsc::UnboundedReceiver<SocketSignal>) {
    while let Some(signal) = signals.recv().await {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        inner.handle(Input::Socket { generation, signal });
    }

    // A transport that vanished without reporting a close counts as an
    // abnormal one. Ignored if a close was already processed.
    if let Some(inner) = inner.upgrade() {
        inner.handle(Input::Socket {
            generation,
            signal: SocketSignal::Closed {
                code: CLOSE_ABNORMAL,
                was_clean: false,
            },
        });
    }
}

/// Fire `ReconnectDue` after `delay` unless cancelled first. The machine
/// re-checks the intentional-close flag when the input arrives.
async fn reconnect_timer(inner: Weak<Inner>, delay: Duration, cancel: CancellationToken) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        () = tokio::time::sleep(delay) => {
            if let Some(inner) = inner.upgrade() {
                inner.handle(Input::ReconnectDue);
            }
        }
    }
}
