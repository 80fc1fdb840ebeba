// ── Event dispatcher ──
//
// Typed publish/subscribe over event type strings. Every emitted envelope
// goes to the callbacks registered for its type (in registration order)
// and to a multiplexed broadcast stream of all envelopes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use ripley_api::Envelope;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{error, trace};

/// Capacity of the multiplexed envelope stream.
const STREAM_CAPACITY: usize = 256;

type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

struct Listener {
    token: u64,
    callback: Callback,
}

struct Registry {
    listeners: DashMap<String, Vec<Listener>>,
    next_token: AtomicU64,
    stream: broadcast::Sender<Arc<Envelope>>,
}

/// Fan-out of envelopes to subscribers.
///
/// Cheaply cloneable; clones share one registry.
#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<Registry>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event_types", &self.registry.listeners.len())
            .finish_non_exhaustive()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            registry: Arc::new(Registry {
                listeners: DashMap::new(),
                next_token: AtomicU64::new(1),
                stream,
            }),
        }
    }

    /// Register `callback` for `event_type`. The registration lives until
    /// the returned [`Subscription`] is unsubscribed or dropped.
    pub fn on<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let token = self.registry.next_token.fetch_add(1, Ordering::Relaxed);
        self.registry
            .listeners
            .entry(event_type.clone())
            .or_default()
            .push(Listener {
                token,
                callback: Arc::new(callback),
            });
        trace!(event_type, token, "listener registered");

        Subscription {
            registry: Arc::downgrade(&self.registry),
            event_type,
            token: Some(token),
        }
    }

    /// Publish `data` under `event_type`.
    pub fn emit(&self, event_type: &str, data: Value) {
        self.emit_envelope(Envelope::new(event_type, data));
    }

    /// Publish a received envelope.
    ///
    /// Callbacks run outside the registry lock, so they may subscribe or
    /// unsubscribe. A panicking callback is logged and skipped; the rest
    /// still run.
    pub fn emit_envelope(&self, envelope: Envelope) {
        let envelope = Arc::new(envelope);
        // No receivers is fine.
        let _ = self.registry.stream.send(Arc::clone(&envelope));

        let callbacks: Vec<(u64, Callback)> = self
            .registry
            .listeners
            .get(&envelope.event_type)
            .map(|entry| {
                entry
                    .iter()
                    .map(|l| (l.token, Arc::clone(&l.callback)))
                    .collect()
            })
            .unwrap_or_default();

        for (token, callback) in callbacks {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(&envelope.data))) {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_owned())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".into());
                error!(
                    event_type = %envelope.event_type,
                    token,
                    panic = %message,
                    "event listener panicked"
                );
            }
        }
    }

    /// Every emitted envelope, regardless of type.
    pub fn stream(&self) -> broadcast::Receiver<Arc<Envelope>> {
        self.registry.stream.subscribe()
    }

    /// Number of live registrations for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.registry
            .listeners
            .get(event_type)
            .map_or(0, |entry| entry.len())
    }
}

// ── Subscription ─────────────────────────────────────────────────────

/// Handle to one registration. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    registry: Weak<Registry>,
    event_type: String,
    token: Option<u64>,
}

impl Subscription {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Remove exactly this registration. Later calls are no-ops.
    pub fn unsubscribe(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // The removed callback is dropped after the shard lock is released.
        let _removed = registry
            .listeners
            .get_mut(&self.event_type)
            .and_then(|mut entry| {
                let index = entry.iter().position(|l| l.token == token)?;
                Some(entry.remove(index))
            });
        registry
            .listeners
            .remove_if(&self.event_type, |_, listeners| listeners.is_empty());
        trace!(event_type = %self.event_type, token, "listener removed");
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &self.event_type)
            .field("token", &self.token)
            .finish()
    }
}
