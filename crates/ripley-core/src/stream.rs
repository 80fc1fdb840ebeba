// ── View state handles ──
//
// How renderers read a reconciled surface: hold an `EntityStream`, draw
// `current()`, and await `changed()` (or poll it as a `Stream`).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::store::Snapshot;

/// Handle on one reconciled collection.
///
/// Keeps the last snapshot it handed out, so a renderer can redraw from
/// [`current`](Self::current) without touching the channel.
pub struct EntityStream<T: Send + Sync + 'static> {
    seen: Snapshot<T>,
    rx: watch::Receiver<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(mut rx: watch::Receiver<Snapshot<T>>) -> Self {
        let seen = Arc::clone(&rx.borrow_and_update());
        Self { seen, rx }
    }

    /// Snapshot as of creation or the last [`changed`](Self::changed).
    pub fn current(&self) -> &Snapshot<T> {
        &self.seen
    }

    /// Newest published snapshot, without marking it seen.
    pub fn latest(&self) -> Snapshot<T> {
        Arc::clone(&self.rx.borrow())
    }

    /// `true` if a newer snapshot was published since `current()`.
    pub fn is_stale(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Wait until the collection changes. `None` once the surface is gone.
    pub async fn changed(&mut self) -> Option<Snapshot<T>> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        self.seen = Arc::clone(&self.rx.borrow_and_update());
        Some(Arc::clone(&self.seen))
    }

    /// Turn into a `Stream` that yields the newest snapshot first, then
    /// one item per change (intermediate versions may be skipped).
    pub fn into_stream(self) -> EntityWatchStream<T> {
        EntityWatchStream {
            inner: WatchStream::new(self.rx),
        }
    }
}

/// `Stream` form of an [`EntityStream`].
pub struct EntityWatchStream<T: Send + Sync + 'static> {
    inner: WatchStream<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> Stream for EntityWatchStream<T> {
    type Item = Snapshot<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Snapshot<T>>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}
