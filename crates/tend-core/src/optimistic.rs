//! Snapshot, apply locally, write remotely, then commit or revert.
//!
//! Every mutation in the services goes through [`OptimisticUpdate::run`]:
//!
//! 1. snapshot the cache and apply the change to it synchronously
//! 2. mark touched ids as pending so realtime pushes cannot clobber the edit
//! 3. await the store write
//! 4. on success reconcile the returned row(s) into the cache; on failure
//!    restore the snapshot and emit exactly one error notification
//! 5. clear the pending marks and invalidate the cache key either way

use std::future::Future;
use uuid::Uuid;

use crate::cache::{CachedRow, EntityCache};
use crate::error::CoreError;
use crate::notify::Notifier;

/// Expected revision for a row that is being deleted; any push is older.
pub const DELETE_REVISION: i64 = i64::MAX;

pub struct OptimisticUpdate<'a, T: CachedRow> {
    cache: &'a EntityCache<T>,
    notifier: &'a dyn Notifier,
    failure_message: String,
    pending: Vec<(Uuid, i64)>,
}

impl<'a, T: CachedRow> OptimisticUpdate<'a, T> {
    pub fn new(cache: &'a EntityCache<T>, notifier: &'a dyn Notifier) -> Self {
        Self {
            cache,
            notifier,
            failure_message: "Could not save your change".to_string(),
            pending: Vec::new(),
        }
    }

    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Marks `id` as having a write in flight that will leave it at `expected_revision`.
    pub fn pending(mut self, id: Uuid, expected_revision: i64) -> Self {
        self.pending.push((id, expected_revision));
        self
    }

    /// Marks the current cached row `id` as being updated (revision + 1).
    pub fn pending_update(self, id: Uuid) -> Self {
        let expected = self.cache.get(id).map(|row| row.revision() + 1).unwrap_or(1);
        self.pending(id, expected)
    }

    pub fn pending_delete(self, id: Uuid) -> Self {
        self.pending(id, DELETE_REVISION)
    }

    pub async fn run<R, Fut>(
        self,
        apply: impl FnOnce(&mut Vec<T>),
        remote: impl FnOnce() -> Fut,
        reconcile: impl FnOnce(&EntityCache<T>, &R),
    ) -> Result<R, CoreError>
    where
        Fut: Future<Output = Result<R, CoreError>>,
    {
        let snapshot = self.cache.snapshot();
        self.cache.mutate(apply);
        let writes: Vec<_> = self
            .pending
            .iter()
            .map(|(id, expected)| self.cache.pending().begin(*id, *expected))
            .collect();

        let result = remote().await;

        match &result {
            Ok(value) => reconcile(self.cache, value),
            Err(err) => {
                tracing::error!(key = %self.cache.key(), error = ?err, "remote write failed, reverting");
                self.cache.restore(snapshot);
                self.notifier
                    .error(&format!("{}: {}", self.failure_message, err.user_message()));
            }
        }

        for write in writes {
            self.cache.pending().settle(write);
        }
        self.cache.invalidate();

        result
    }
}

/// [`OptimisticUpdate::run`] without pending marks or reconciliation.
pub async fn with_optimistic_update<T, R, Fut>(
    cache: &EntityCache<T>,
    notifier: &dyn Notifier,
    apply: impl FnOnce(&mut Vec<T>),
    remote: impl FnOnce() -> Fut,
) -> Result<R, CoreError>
where
    T: CachedRow,
    Fut: Future<Output = Result<R, CoreError>>,
{
    OptimisticUpdate::new(cache, notifier)
        .run(apply, remote, |_, _| {})
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheBus, CacheKey};
    use crate::notify::RecordingNotifier;

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: Uuid,
        revision: i64,
        text: String,
    }

    impl CachedRow for Note {
        fn row_id(&self) -> Uuid {
            self.id
        }

        fn revision(&self) -> i64 {
            self.revision
        }
    }

    fn seeded() -> (EntityCache<Note>, Note) {
        let cache = EntityCache::new(CacheKey::new("notes", Uuid::nil()), CacheBus::default());
        let note = Note {
            id: Uuid::now_v7(),
            revision: 1,
            text: "before".to_string(),
        };
        cache.replace_all(vec![note.clone()]);
        (cache, note)
    }

    #[tokio::test]
    async fn test_failure_restores_snapshot_and_notifies_once() {
        let (cache, note) = seeded();
        let notifier = RecordingNotifier::new();
        let before = cache.snapshot();

        let result: Result<(), CoreError> = OptimisticUpdate::new(&cache, &notifier)
            .pending_update(note.id)
            .run(
                |rows| {
                    rows[0].text = "after".to_string();
                    rows.push(Note { id: Uuid::now_v7(), revision: 0, text: "extra".to_string() });
                },
                || async { Err(CoreError::InvalidInput("rejected".to_string())) },
                |_, _| {},
            )
            .await;

        assert!(result.is_err());
        assert_eq!(cache.snapshot(), before);
        assert_eq!(notifier.errors().len(), 1);
        assert!(cache.pending().is_empty());
        assert!(cache.is_stale());
    }

    #[tokio::test]
    async fn test_success_keeps_optimistic_state_and_reconciles() {
        let (cache, note) = seeded();
        let notifier = RecordingNotifier::new();
        let mut sub = cache.subscribe();

        let saved = OptimisticUpdate::new(&cache, &notifier)
            .pending_update(note.id)
            .run(
                |rows| rows[0].text = "after".to_string(),
                || async {
                    Ok(Note {
                        id: note.id,
                        revision: 2,
                        text: "after".to_string(),
                    })
                },
                |cache, saved: &Note| cache.upsert(saved.clone()),
            )
            .await
            .unwrap();

        assert_eq!(cache.get(note.id), Some(saved));
        assert!(notifier.all().is_empty());
        assert!(cache.pending().is_empty());
        assert!(sub.try_invalidated().is_some());
    }

    #[tokio::test]
    async fn test_pushes_during_flight_are_suppressed() {
        let (cache, note) = seeded();
        let notifier = RecordingNotifier::new();

        let result = OptimisticUpdate::new(&cache, &notifier)
            .pending_update(note.id)
            .run(
                |rows| rows[0].text = "mine".to_string(),
                || async {
                    // An old copy of the row arrives while the write is in flight
                    let accepted = cache.accept_push(Note {
                        id: note.id,
                        revision: 1,
                        text: "theirs".to_string(),
                    });
                    Ok::<bool, CoreError>(accepted)
                },
                |_, _| {},
            )
            .await
            .unwrap();

        assert!(!result);
        assert_eq!(cache.get(note.id).unwrap().text, "mine");
    }

    #[tokio::test]
    async fn test_overlapping_writes_keep_later_write_protected() {
        let (cache, note) = seeded();
        let notifier = RecordingNotifier::new();
        let (release_first, first_released) = tokio::sync::oneshot::channel::<()>();
        let (release_second, second_released) = tokio::sync::oneshot::channel::<()>();

        let first = async {
            let saved = OptimisticUpdate::new(&cache, &notifier)
                .pending(note.id, 2)
                .run(
                    |rows| rows[0].text = "first".to_string(),
                    || async {
                        let _ = first_released.await;
                        Ok::<_, CoreError>(())
                    },
                    |_, _| {},
                )
                .await;

            // First write is settled, second is still open: its echo is stale
            let echo_accepted = cache.accept_push(Note {
                id: note.id,
                revision: 2,
                text: "first".to_string(),
            });
            let still_pending = cache.pending().is_pending(note.id);
            let _ = release_second.send(());
            (saved, echo_accepted, still_pending)
        };
        let second = OptimisticUpdate::new(&cache, &notifier)
            .pending(note.id, 3)
            .run(
                |rows| rows[0].text = "second".to_string(),
                || async {
                    // Both writes are in flight once this runs
                    let _ = release_first.send(());
                    let _ = second_released.await;
                    Ok::<_, CoreError>(())
                },
                |_, _| {},
            );

        let ((saved, echo_accepted, still_pending), second) = tokio::join!(first, second);

        assert!(saved.is_ok());
        assert!(second.is_ok());
        assert!(!echo_accepted);
        assert!(still_pending);
        assert_eq!(cache.get(note.id).unwrap().text, "second");
        assert!(cache.pending().is_empty());
    }

    #[tokio::test]
    async fn test_with_optimistic_update_plain() {
        let (cache, note) = seeded();
        let notifier = RecordingNotifier::new();

        let removed = with_optimistic_update(
            &cache,
            &notifier,
            |rows| rows.retain(|n| n.id != note.id),
            || async { Ok::<_, CoreError>(1usize) },
        )
        .await
        .unwrap();

        assert_eq!(removed, 1);
        assert!(cache.is_empty());
    }
}
