//! Client-side read-through cache of owner-scoped rows.
//!
//! Each [`EntityCache`] holds one `(entity, owner)` row set plus the ids that
//! have writes in flight. Invalidations are published on a [`CacheBus`] so any
//! number of views can re-fetch without knowing about each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use uuid::Uuid;

/// A row the cache can track by id and revision.
pub trait CachedRow: Clone + Send + Sync + 'static {
    fn row_id(&self) -> Uuid;
    /// Store-maintained write counter; higher means newer.
    fn revision(&self) -> i64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub entity: &'static str,
    pub owner: Uuid,
}

impl CacheKey {
    pub fn new(entity: &'static str, owner: Uuid) -> Self {
        Self { entity, owner }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.entity, self.owner)
    }
}

#[derive(Debug, Clone)]
pub struct CacheBus {
    sender: broadcast::Sender<CacheKey>,
}

impl Default for CacheBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl CacheBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, key: CacheKey) {
        // No receivers is fine: nobody is watching this key yet.
        let _ = self.sender.send(key);
    }

    pub fn subscribe(&self, key: CacheKey) -> CacheSubscription {
        CacheSubscription {
            key,
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct CacheSubscription {
    key: CacheKey,
    receiver: broadcast::Receiver<CacheKey>,
}

impl CacheSubscription {
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// Waits for the next invalidation of this key. Returns `None` once the bus
    /// is gone. A lagged receiver reports an invalidation, since it may have
    /// missed one.
    pub async fn invalidated(&mut self) -> Option<CacheKey> {
        loop {
            match self.receiver.recv().await {
                Ok(key) if key == self.key => return Some(key),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => return Some(self.key),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`CacheSubscription::invalidated`].
    pub fn try_invalidated(&mut self) -> Option<CacheKey> {
        loop {
            match self.receiver.try_recv() {
                Ok(key) if key == self.key => return Some(key),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => return Some(self.key),
                Err(_) => return None,
            }
        }
    }
}

/// Handle for one in-flight write, returned by [`PendingTracker::begin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    id: Uuid,
    token: u64,
}

impl PendingWrite {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Default)]
struct PendingState {
    next_token: u64,
    writes: HashMap<Uuid, Vec<(u64, i64)>>,
}

/// Per-id record of writes in flight.
///
/// An optimistic write records the revision the row will have once the store
/// applies it. Pushes carrying a revision older than the highest one still in
/// flight for that id are stale. Overlapping writes to one row each hold their
/// own entry, so settling one leaves the others in force.
#[derive(Debug, Default)]
pub struct PendingTracker {
    state: Mutex<PendingState>,
}

impl PendingTracker {
    fn lock(&self) -> MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin(&self, id: Uuid, expected_revision: i64) -> PendingWrite {
        let mut state = self.lock();
        let token = state.next_token;
        state.next_token += 1;
        state.writes.entry(id).or_default().push((token, expected_revision));
        PendingWrite { id, token }
    }

    /// Clears one write. Other writes to the same id stay pending.
    pub fn settle(&self, write: PendingWrite) {
        let mut state = self.lock();
        if let Some(entries) = state.writes.get_mut(&write.id) {
            entries.retain(|(token, _)| *token != write.token);
            if entries.is_empty() {
                state.writes.remove(&write.id);
            }
        }
    }

    pub fn is_pending(&self, id: Uuid) -> bool {
        self.lock().writes.contains_key(&id)
    }

    /// Highest revision expected by the writes still in flight for `id`.
    pub fn expected_revision(&self, id: Uuid) -> Option<i64> {
        self.lock()
            .writes
            .get(&id)
            .and_then(|entries| entries.iter().map(|(_, expected)| *expected).max())
    }

    /// True when a push for `id` at `incoming_revision` predates a pending write.
    pub fn is_stale(&self, id: Uuid, incoming_revision: i64) -> bool {
        self.expected_revision(id)
            .is_some_and(|expected| incoming_revision < expected)
    }

    /// Number of ids with at least one write in flight.
    pub fn len(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().writes.is_empty()
    }
}

struct CacheState<T> {
    rows: Vec<T>,
    stale: bool,
    /// Bumped by every invalidation.
    generation: u64,
}

pub struct EntityCache<T: CachedRow> {
    key: CacheKey,
    state: Mutex<CacheState<T>>,
    pending: PendingTracker,
    bus: CacheBus,
}

impl<T: CachedRow> EntityCache<T> {
    pub fn new(key: CacheKey, bus: CacheBus) -> Self {
        Self {
            key,
            state: Mutex::new(CacheState {
                rows: Vec::new(),
                stale: true,
                generation: 0,
            }),
            pending: PendingTracker::default(),
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn key(&self) -> CacheKey {
        self.key
    }

    pub fn pending(&self) -> &PendingTracker {
        &self.pending
    }

    pub fn subscribe(&self) -> CacheSubscription {
        self.bus.subscribe(self.key)
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.lock().rows.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<T> {
        self.lock().rows.iter().find(|r| r.row_id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    pub fn is_stale(&self) -> bool {
        self.lock().stale
    }

    /// Invalidation counter; read it before a fetch and hand it to [`EntityCache::fill`].
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Replaces the row set with a fresh fetch and marks it current.
    pub fn replace_all(&self, rows: Vec<T>) {
        let mut state = self.lock();
        state.rows = rows;
        state.stale = false;
    }

    /// Stores rows fetched when the cache was at `generation`. The rows are
    /// kept either way, but the cache only becomes current if nothing
    /// invalidated it while the fetch was running. Returns whether it did.
    pub fn fill(&self, rows: Vec<T>, generation: u64) -> bool {
        let mut state = self.lock();
        state.rows = rows;
        let current = state.generation == generation;
        state.stale = !current;
        current
    }

    pub fn mutate<R>(&self, apply: impl FnOnce(&mut Vec<T>) -> R) -> R {
        apply(&mut self.lock().rows)
    }

    /// Puts back a snapshot taken with [`EntityCache::snapshot`].
    pub fn restore(&self, snapshot: Vec<T>) {
        self.lock().rows = snapshot;
    }

    pub fn upsert(&self, row: T) {
        let mut state = self.lock();
        match state.rows.iter_mut().find(|r| r.row_id() == row.row_id()) {
            Some(existing) => *existing = row,
            None => state.rows.push(row),
        }
    }

    /// Swaps a temporary id for the row the store returned.
    pub fn replace_id(&self, temp_id: Uuid, row: T) {
        let mut state = self.lock();
        match state.rows.iter_mut().find(|r| r.row_id() == temp_id) {
            Some(existing) => *existing = row,
            None => state.rows.push(row),
        }
    }

    pub fn remove(&self, id: Uuid) -> Option<T> {
        let mut state = self.lock();
        let index = state.rows.iter().position(|r| r.row_id() == id)?;
        Some(state.rows.remove(index))
    }

    /// Marks the row set stale and notifies subscribers.
    pub fn invalidate(&self) {
        {
            let mut state = self.lock();
            state.stale = true;
            state.generation += 1;
        }
        self.bus.publish(self.key);
    }

    /// Applies a pushed row unless an in-flight write makes it stale.
    pub fn accept_push(&self, row: T) -> bool {
        if self.pending.is_stale(row.row_id(), row.revision()) {
            tracing::warn!(
                key = %self.key,
                id = %row.row_id(),
                revision = row.revision(),
                "ignoring stale push for row with pending write"
            );
            return false;
        }
        self.upsert(row);
        true
    }

    /// Applies a pushed delete unless the row has a write in flight.
    pub fn accept_delete(&self, id: Uuid) -> bool {
        if self.pending.is_pending(id) {
            tracing::warn!(key = %self.key, id = %id, "ignoring delete push for row with pending write");
            return false;
        }
        self.remove(id).is_some()
    }
}

/// Lazily created [`EntityCache`]s for one entity, one per owner.
pub struct CacheSet<T: CachedRow> {
    entity: &'static str,
    bus: CacheBus,
    caches: Mutex<HashMap<Uuid, Arc<EntityCache<T>>>>,
}

impl<T: CachedRow> CacheSet<T> {
    pub fn new(entity: &'static str, bus: CacheBus) -> Self {
        Self {
            entity,
            bus,
            caches: Mutex::new(HashMap::new()),
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn for_owner(&self, owner: Uuid) -> Arc<EntityCache<T>> {
        let mut caches = self.caches.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        caches
            .entry(owner)
            .or_insert_with(|| Arc::new(EntityCache::new(CacheKey::new(self.entity, owner), self.bus.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Uuid,
        revision: i64,
        label: &'static str,
    }

    impl CachedRow for Row {
        fn row_id(&self) -> Uuid {
            self.id
        }

        fn revision(&self) -> i64 {
            self.revision
        }
    }

    fn cache() -> EntityCache<Row> {
        EntityCache::new(CacheKey::new("rows", Uuid::nil()), CacheBus::default())
    }

    #[test]
    fn test_new_cache_is_stale_until_filled() {
        let cache = cache();
        assert!(cache.is_stale());
        cache.replace_all(vec![]);
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_fill_after_invalidation_stays_stale() {
        let cache = cache();
        let generation = cache.generation();

        // A write lands while the fetch is still running
        cache.invalidate();

        assert!(!cache.fill(vec![Row { id: Uuid::now_v7(), revision: 0, label: "old" }], generation));
        assert!(cache.is_stale());

        let generation = cache.generation();
        assert!(cache.fill(vec![], generation));
        assert!(!cache.is_stale());
    }

    #[test]
    fn test_restore_puts_back_snapshot() {
        let cache = cache();
        let id = Uuid::now_v7();
        cache.replace_all(vec![Row { id, revision: 0, label: "a" }]);

        let snapshot = cache.snapshot();
        cache.mutate(|rows| rows[0].label = "b");
        cache.upsert(Row { id: Uuid::now_v7(), revision: 0, label: "c" });
        cache.restore(snapshot.clone());

        assert_eq!(cache.snapshot(), snapshot);
    }

    #[test]
    fn test_stale_push_is_ignored_while_pending() {
        let cache = cache();
        let id = Uuid::now_v7();
        cache.replace_all(vec![Row { id, revision: 3, label: "local" }]);
        cache.pending().begin(id, 4);

        assert!(!cache.accept_push(Row { id, revision: 3, label: "old" }));
        assert_eq!(cache.get(id).unwrap().label, "local");

        assert!(cache.accept_push(Row { id, revision: 4, label: "server" }));
        assert_eq!(cache.get(id).unwrap().label, "server");
    }

    #[test]
    fn test_push_accepted_after_settle() {
        let cache = cache();
        let id = Uuid::now_v7();
        let write = cache.pending().begin(id, 10);
        cache.pending().settle(write);
        assert!(cache.accept_push(Row { id, revision: 1, label: "x" }));
    }

    #[test]
    fn test_pending_keeps_highest_expected_revision() {
        let tracker = PendingTracker::default();
        let id = Uuid::now_v7();
        tracker.begin(id, 5);
        tracker.begin(id, 3);
        assert!(tracker.is_stale(id, 4));
        assert!(!tracker.is_stale(id, 5));
    }

    #[test]
    fn test_overlapping_writes_settle_independently() {
        let cache = cache();
        let id = Uuid::now_v7();
        cache.replace_all(vec![Row { id, revision: 1, label: "base" }]);

        let first = cache.pending().begin(id, 2);
        let second = cache.pending().begin(id, 3);

        cache.pending().settle(first);
        assert!(cache.pending().is_pending(id));
        assert_eq!(cache.pending().expected_revision(id), Some(3));
        assert!(!cache.accept_push(Row { id, revision: 2, label: "first write echo" }));
        assert_eq!(cache.get(id).unwrap().label, "base");

        cache.pending().settle(second);
        assert!(!cache.pending().is_pending(id));
        assert!(cache.accept_push(Row { id, revision: 3, label: "second write echo" }));
    }

    #[test]
    fn test_settle_is_idempotent() {
        let tracker = PendingTracker::default();
        let id = Uuid::now_v7();
        let write = tracker.begin(id, 2);
        tracker.settle(write);
        tracker.settle(write);
        assert!(tracker.is_empty());
        assert_eq!(tracker.expected_revision(id), None);
    }

    #[test]
    fn test_replace_id_swaps_temporary_row() {
        let cache = cache();
        let temp = Uuid::now_v7();
        cache.replace_all(vec![Row { id: temp, revision: 0, label: "draft" }]);

        let server = Row { id: Uuid::now_v7(), revision: 0, label: "saved" };
        cache.replace_id(temp, server.clone());

        assert_eq!(cache.snapshot(), vec![server]);
    }

    #[tokio::test]
    async fn test_invalidate_notifies_matching_subscribers_only() {
        let bus = CacheBus::default();
        let tasks: EntityCache<Row> = EntityCache::new(CacheKey::new("tasks", Uuid::nil()), bus.clone());
        let habits: EntityCache<Row> = EntityCache::new(CacheKey::new("habits", Uuid::nil()), bus);

        let mut task_sub = tasks.subscribe();
        let mut habit_sub = habits.subscribe();

        tasks.invalidate();

        assert_eq!(task_sub.invalidated().await, Some(tasks.key()));
        assert!(habit_sub.try_invalidated().is_none());
    }

    #[test]
    fn test_cache_set_shares_cache_per_owner() {
        let set: CacheSet<Row> = CacheSet::new("rows", CacheBus::default());
        let me = Uuid::now_v7();
        let other = Uuid::now_v7();

        set.for_owner(me).replace_all(vec![Row { id: Uuid::now_v7(), revision: 0, label: "mine" }]);

        assert_eq!(set.for_owner(me).len(), 1);
        assert!(set.for_owner(other).is_empty());
        assert_eq!(set.for_owner(other).key(), CacheKey::new("rows", other));
    }
}
