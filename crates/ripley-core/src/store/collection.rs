// ── Keyed reactive collection ──
//
// Concurrent keyed storage with push-based change notification via
// `watch` channels. At most one record exists per key; every merge is an
// upsert, so applying the same event twice leaves the same state.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

/// Shared, immutable view of a collection at one point in time.
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// A reactive collection for a single record type.
///
/// Every mutation bumps a version counter and rebuilds the key-ordered
/// snapshot that subscribers receive.
pub(crate) struct EntityCollection<T: Clone + Send + Sync + 'static> {
    /// Primary storage: key string -> record.
    /// Keys are device paths for drives, prefixed ids (`op:{id}`,
    /// `job:{id}`) for operations and jobs.
    by_key: DashMap<String, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation.
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Clone + Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or replace a record. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, record: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(record)).is_none();
        self.publish();
        is_new
    }

    /// Insert or merge: `merge` receives the current record (if any) and
    /// returns the record to store. The read and write are atomic per key.
    pub(crate) fn upsert_with(&self, key: String, merge: impl FnOnce(Option<&T>) -> T) -> bool {
        let is_new = match self.by_key.entry(key) {
            Entry::Occupied(mut occupied) => {
                let merged = merge(Some(&**occupied.get()));
                occupied.insert(Arc::new(merged));
                false
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Arc::new(merge(None)));
                true
            }
        };
        self.publish();
        is_new
    }

    /// Modify an existing record in place. Returns `false` (and publishes
    /// nothing) when the key is absent.
    pub(crate) fn update(&self, key: &str, modify: impl FnOnce(&mut T)) -> bool {
        let Some(mut entry) = self.by_key.get_mut(key) else {
            return false;
        };
        modify(Arc::make_mut(entry.value_mut()));
        // Release the shard lock before the snapshot rebuild reads the map.
        drop(entry);
        self.publish();
        true
    }

    /// Modify every record for which `modify` reports a change, then
    /// publish once. Returns the number of changed records.
    pub(crate) fn update_all(&self, mut modify: impl FnMut(&str, &mut T) -> bool) -> usize {
        let mut changed = 0;
        for mut entry in self.by_key.iter_mut() {
            let key = entry.key().clone();
            let mut record = T::clone(entry.value());
            if modify(&key, &mut record) {
                *entry.value_mut() = Arc::new(record);
                changed += 1;
            }
        }
        if changed > 0 {
            self.publish();
        }
        changed
    }

    /// Remove a record by key. Returns the removed record if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    /// Upsert every incoming record through `merge`, then prune keys absent
    /// from the incoming set. Publishes a single snapshot; there is no
    /// intermediate empty state.
    pub(crate) fn upsert_and_prune(
        &self,
        items: Vec<(String, T)>,
        mut merge: impl FnMut(Option<&T>, T) -> T,
    ) -> usize {
        let incoming: HashSet<String> = items.iter().map(|(k, _)| k.clone()).collect();
        for (key, record) in items {
            let existing = self.get(&key);
            let merged = merge(existing.as_deref(), record);
            self.by_key.insert(key, Arc::new(merged));
        }

        let before = self.by_key.len();
        self.by_key.retain(|key, _| incoming.contains(key));
        let pruned = before - self.by_key.len();

        self.publish();
        pruned
    }

    /// Look up a record by key.
    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    /// Current snapshot (cheap `Arc` clone), ordered by key.
    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    /// Mutation counter.
    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the snapshot and bump the version.
    ///
    /// The rebuild runs inside `send_modify`, so concurrent publishers are
    /// serialized and the last one always sees every earlier mutation.
    fn publish(&self) {
        self.snapshot.send_modify(|snap| {
            let mut entries: Vec<(String, Arc<T>)> = self
                .by_key
                .iter()
                .map(|r| (r.key().clone(), Arc::clone(r.value())))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            *snap = Arc::new(entries.into_iter().map(|(_, v)| v).collect());
        });
        self.version.send_modify(|v| *v += 1);
    }
}
