// ── Bounded append-only buffer ──
//
// Arrival-ordered ring buffer for the log tail. Overflow evicts the oldest
// entries; surviving entries are never reordered.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::collection::Snapshot;

pub(crate) struct LogBuffer<T: Send + Sync + 'static> {
    entries: Mutex<VecDeque<Arc<T>>>,
    capacity: usize,
    /// Entries ever pushed. Bumped under the `entries` lock.
    pushed: AtomicU64,
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> LogBuffer<T> {
    /// A capacity of zero is treated as one.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            pushed: AtomicU64::new(0),
            snapshot,
        }
    }

    /// Append one entry, evicting the oldest on overflow.
    pub(crate) fn push(&self, entry: T) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(Arc::new(entry));
        self.pushed.fetch_add(1, Ordering::AcqRel);
        self.publish(&entries);
    }

    /// Mark for [`replace_since`](Self::replace_since).
    pub(crate) fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Acquire)
    }

    /// Replace the buffer with `incoming` (oldest first), then re-append the
    /// entries pushed after `mark` unless `is_dup` finds them in `incoming`.
    /// Only the newest `capacity` entries are kept.
    pub(crate) fn replace_since(
        &self,
        incoming: Vec<T>,
        mark: u64,
        is_dup: impl Fn(&T, &T) -> bool,
    ) {
        let mut entries = self.lock();
        let newer = usize::try_from(self.pushed().saturating_sub(mark))
            .unwrap_or(usize::MAX)
            .min(entries.len());
        let mut tail: Vec<Arc<T>> = entries.iter().skip(entries.len() - newer).cloned().collect();
        tail.retain(|e| !incoming.iter().any(|i| is_dup(i, e)));

        entries.clear();
        entries.extend(incoming.into_iter().map(Arc::new));
        entries.extend(tail);
        let excess = entries.len().saturating_sub(self.capacity);
        entries.drain(..excess);
        self.publish(&entries);
    }

    pub(crate) fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        self.publish(&entries);
    }

    /// Current contents, oldest first.
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Arc<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, entries: &VecDeque<Arc<T>>) {
        let values: Vec<Arc<T>> = entries.iter().map(Arc::clone).collect();
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}
