// ── Generic reactive collection ──
//
// Concurrent keyed storage with O(1) lookups and push-based change
// notification via `watch` channels.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

/// A concurrent, reactive collection for one registry.
///
/// Every mutation bumps a version counter and rebuilds the snapshot that
/// subscribers receive. Keys are the hub's natural identifiers.
pub(crate) struct RegistryCollection<T: Clone + Send + Sync + 'static> {
    by_key: DashMap<String, Arc<T>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> RegistryCollection<T> {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_key: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Insert or update an entry. Returns `true` if the key was new.
    pub(crate) fn upsert(&self, key: String, entity: T) -> bool {
        let is_new = self.by_key.insert(key, Arc::new(entity)).is_none();
        self.publish();
        is_new
    }

    /// Remove an entry by key. Returns the removed entry if it existed.
    pub(crate) fn remove(&self, key: &str) -> Option<Arc<T>> {
        let removed = self.by_key.remove(key).map(|(_, v)| v);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    /// Replace the whole collection with `items`.
    ///
    /// Upserts every incoming entry, then prunes keys missing from the
    /// incoming set. Subscribers see one change and never an empty
    /// intermediate state.
    pub(crate) fn replace_all(&self, items: Vec<(String, T)>) {
        let incoming: HashSet<String> = items.iter().map(|(k, _)| k.clone()).collect();
        for (key, entity) in items {
            self.by_key.insert(key, Arc::new(entity));
        }
        self.by_key.retain(|key, _| incoming.contains(key));
        self.publish();
    }

    pub(crate) fn get(&self, key: &str) -> Option<Arc<T>> {
        self.by_key.get(key).map(|r| Arc::clone(r.value()))
    }

    pub(crate) fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<Vec<Arc<T>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<T>>>> {
        self.snapshot.subscribe()
    }

    #[allow(dead_code)]
    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Remove all entries.
    pub(crate) fn clear(&self) {
        self.by_key.clear();
        self.publish();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_key.len()
    }

    #[allow(dead_code)]
    pub(crate) fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the snapshot and bump the version.
    fn publish(&self) {
        let values: Vec<Arc<T>> = self.by_key.iter().map(|r| Arc::clone(r.value())).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn upsert_returns_true_only_for_new_key() {
        let col: RegistryCollection<String> = RegistryCollection::new();
        assert!(col.upsert("key1".into(), "hello".into()));
        assert!(!col.upsert("key1".into(), "world".into()));
        assert_eq!(*col.get("key1").unwrap(), "world");
    }

    #[test]
    fn remove_returns_entry_and_bumps_version() {
        let col: RegistryCollection<String> = RegistryCollection::new();
        col.upsert("key1".into(), "hello".into());
        let before = col.version();

        assert_eq!(*col.remove("key1").unwrap(), "hello");
        assert!(col.is_empty());
        assert!(col.version() > before);

        // Removing a missing key is not a mutation.
        let after = col.version();
        assert!(col.remove("key1").is_none());
        assert_eq!(col.version(), after);
    }

    #[test]
    fn replace_all_prunes_missing_keys() {
        let col: RegistryCollection<String> = RegistryCollection::new();
        col.upsert("a".into(), "1".into());
        col.upsert("b".into(), "2".into());

        col.replace_all(vec![("b".into(), "2b".into()), ("c".into(), "3".into())]);

        assert!(!col.contains("a"));
        assert_eq!(*col.get("b").unwrap(), "2b");
        assert_eq!(col.len(), 2);
        assert_eq!(col.snapshot().len(), 2);
    }

    #[test]
    fn replace_all_publishes_once() {
        let col: RegistryCollection<String> = RegistryCollection::new();
        let mut rx = col.subscribe();
        rx.borrow_and_update();

        col.replace_all(vec![("a".into(), "1".into()), ("b".into(), "2".into())]);

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
        assert_eq!(col.version(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let col: RegistryCollection<String> = RegistryCollection::new();
        col.upsert("a".into(), "x".into());
        col.upsert("b".into(), "y".into());
        assert_eq!(col.len(), 2);

        col.clear();
        assert!(col.is_empty());
        assert!(col.snapshot().is_empty());
    }
}
