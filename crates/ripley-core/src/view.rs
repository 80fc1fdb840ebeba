// ── Reconciled views ──
//
// A view keeps one dashboard surface consistent with the service by
// combining two inputs: pushed events (applied as idempotent upserts) and
// periodic REST snapshots (upsert-and-prune). Either input alone is
// enough to converge; together they heal events missed while disconnected.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ripley_api::{EventKind, SnapshotSource};

use crate::dispatch::{EventDispatcher, Subscription};
use crate::error::CoreError;
use crate::notify::{Notification, Notifier};

// ── Surface ──────────────────────────────────────────────────────────

/// One reconciled dashboard surface: its state plus the merge policy for
/// each event type it consumes.
#[async_trait]
pub trait Surface: Send + Sync + 'static {
    /// Human-readable name used in logs and notifications.
    const NAME: &'static str;

    /// Event types this surface subscribes to.
    const EVENT_TYPES: &'static [EventKind];

    /// Everything one resync fetches. Applied atomically.
    type Fetched: Send + 'static;

    /// Called on the surface right before each [`fetch`](Self::fetch).
    fn fetch_started(&self) {}

    /// Fetch a full snapshot. Must not touch surface state.
    async fn fetch(source: &dyn SnapshotSource) -> Result<Self::Fetched, CoreError>;

    /// Merge a fetched snapshot into the surface.
    fn apply_snapshot(&self, fetched: Self::Fetched);

    /// Merge one pushed event. An `Err` means the payload was malformed;
    /// the event is dropped and state is unchanged.
    fn apply_event(&self, kind: EventKind, data: &Value) -> Result<(), CoreError>;

    /// Periodic clock tick for time-derived state.
    fn on_tick(&self, _now: DateTime<Utc>) {}
}

/// Decode an event payload, naming the event on failure.
pub(crate) fn payload<'a, T: serde::Deserialize<'a>>(
    kind: EventKind,
    data: &'a Value,
) -> Result<T, CoreError> {
    ripley_api::events::decode(data).map_err(|e| CoreError::invalid_payload(kind.as_ref(), &e))
}

// ── Options ──────────────────────────────────────────────────────────

/// Timers a mounted view runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Periodic snapshot resync. `None` seeds once on mount only.
    pub resync_interval: Option<Duration>,
    /// Clock tick forwarded to [`Surface::on_tick`].
    pub tick: Option<Duration>,
}

// ── ReconciledView ───────────────────────────────────────────────────

/// A mounted surface.
///
/// Mounting subscribes to the surface's events, seeds it from a snapshot,
/// then starts the resync and tick timers. [`unmount`](Self::unmount) (or
/// dropping the view) cancels the timers and drops every subscription;
/// after that no event, fetch, or tick can change the surface.
pub struct ReconciledView<S: Surface> {
    surface: Arc<S>,
    source: Arc<dyn SnapshotSource>,
    notifier: Arc<dyn Notifier>,
    subscriptions: Mutex<Vec<Subscription>>,
    cancel: CancellationToken,
}

impl<S: Surface> ReconciledView<S> {
    /// Mount `surface`. Subscribing before seeding is safe because every
    /// merge is an idempotent upsert. A failed seed is notified, not returned.
    pub async fn mount(
        surface: S,
        dispatcher: &EventDispatcher,
        source: Arc<dyn SnapshotSource>,
        notifier: Arc<dyn Notifier>,
        options: ViewOptions,
    ) -> Self {
        let surface = Arc::new(surface);
        let cancel = CancellationToken::new();

        let subscriptions = S::EVENT_TYPES
            .iter()
            .map(|&kind| {
                let weak = Arc::downgrade(&surface);
                let cancel = cancel.clone();
                dispatcher.on(kind.as_ref(), move |data: &Value| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let Some(surface) = weak.upgrade() else {
                        return;
                    };
                    if let Err(e) = surface.apply_event(kind, data) {
                        warn!(surface = S::NAME, event_type = %kind, error = %e, "dropping event");
                    }
                })
            })
            .collect();

        let view = Self {
            surface,
            source,
            notifier,
            subscriptions: Mutex::new(subscriptions),
            cancel,
        };

        // Failure is already notified; the surface simply starts empty.
        let _ = view.resync_now().await;

        if let Some(period) = options.resync_interval {
            tokio::spawn(resync_task(
                Arc::clone(&view.surface),
                Arc::clone(&view.source),
                Arc::clone(&view.notifier),
                period,
                view.cancel.clone(),
            ));
        }
        if let Some(period) = options.tick {
            tokio::spawn(tick_task(
                Arc::clone(&view.surface),
                period,
                view.cancel.clone(),
            ));
        }

        debug!(surface = S::NAME, ?options, "view mounted");
        view
    }

    /// The reconciled surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Fetch and apply a snapshot now.
    pub async fn resync_now(&self) -> Result<(), CoreError> {
        resync_once(self.surface.as_ref(), self.source.as_ref(), self.notifier.as_ref(), &self.cancel).await
    }

    pub fn is_mounted(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Cancel timers and drop subscriptions. Idempotent.
    pub fn unmount(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        let dropped: Vec<Subscription> = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        drop(dropped);
        debug!(surface = S::NAME, "view unmounted");
    }
}

impl<S: Surface> Drop for ReconciledView<S> {
    fn drop(&mut self) {
        self.unmount();
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn resync_once<S: Surface>(
    surface: &S,
    source: &dyn SnapshotSource,
    notifier: &dyn Notifier,
    cancel: &CancellationToken,
) -> Result<(), CoreError> {
    surface.fetch_started();
    let fetched = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = S::fetch(source) => result,
    };

    match fetched {
        Ok(fetched) => {
            // A fetch that resolves after teardown must not resurrect state.
            if !cancel.is_cancelled() {
                surface.apply_snapshot(fetched);
            }
            Ok(())
        }
        Err(e) => {
            warn!(surface = S::NAME, error = %e, "snapshot fetch failed; keeping previous state");
            notifier.notify(Notification::error(format!(
                "Failed to refresh {}: {e}",
                S::NAME
            )));
            Err(CoreError::SnapshotFailed {
                surface: S::NAME,
                message: e.to_string(),
            })
        }
    }
}

async fn resync_task<S: Surface>(
    surface: Arc<S>,
    source: Arc<dyn SnapshotSource>,
    notifier: Arc<dyn Notifier>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                debug!(surface = S::NAME, "periodic resync");
                let _ = resync_once(&*surface, source.as_ref(), notifier.as_ref(), &cancel).await;
            }
        }
    }
}

async fn tick_task<S: Surface>(surface: Arc<S>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => surface.on_tick(Utc::now()),
        }
    }
}
