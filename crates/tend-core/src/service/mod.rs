//! Services consumed by front ends.
//!
//! Each service reads through the keyed caches, writes through
//! [`OptimisticUpdate`](crate::optimistic::OptimisticUpdate), and reports every
//! failure to the [`Notifier`] exactly once. Reads never fail outward: a failed
//! read produces an empty result.

use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::Session;
use crate::cache::{CacheBus, CacheSet, CachedRow, EntityCache};
use crate::changes::{ChangeKind, FeedEvent, RowChange, Table};
use crate::error::CoreError;
use crate::models::{Appointment, Category, DoTodayOff, Goal, Habit, HabitLog, Section, Task};
use crate::notify::Notifier;
use crate::repository::Repository;

pub mod appointments;
pub mod goals;
pub mod habits;
pub mod sections;
pub mod suggestions;
pub mod tasks;

pub use appointments::AppointmentService;
pub use goals::GoalService;
pub use habits::{current_streak, HabitService};
pub use sections::SectionService;
pub use suggestions::SuggestionService;
pub use tasks::TaskService;

/// One cache set per entity, shared by every service built from the same context.
pub struct Caches {
    pub tasks: CacheSet<Task>,
    pub off_log: CacheSet<DoTodayOff>,
    pub sections: CacheSet<Section>,
    pub categories: CacheSet<Category>,
    pub appointments: CacheSet<Appointment>,
    pub habits: CacheSet<Habit>,
    pub habit_logs: CacheSet<HabitLog>,
    pub goals: CacheSet<Goal>,
}

impl Caches {
    pub fn new(bus: CacheBus) -> Self {
        Self {
            tasks: CacheSet::new(Table::Tasks.as_str(), bus.clone()),
            off_log: CacheSet::new(Table::DoTodayOff.as_str(), bus.clone()),
            sections: CacheSet::new(Table::Sections.as_str(), bus.clone()),
            categories: CacheSet::new(Table::Categories.as_str(), bus.clone()),
            appointments: CacheSet::new(Table::Appointments.as_str(), bus.clone()),
            habits: CacheSet::new(Table::Habits.as_str(), bus.clone()),
            habit_logs: CacheSet::new(Table::HabitLogs.as_str(), bus.clone()),
            goals: CacheSet::new(Table::Goals.as_str(), bus),
        }
    }
}

/// Collaborators shared by all services.
pub struct ServiceContext<R: Repository> {
    repo: Arc<R>,
    session: Arc<Session>,
    notifier: Arc<dyn Notifier>,
    timezone: Tz,
    bus: CacheBus,
    caches: Arc<Caches>,
}

impl<R: Repository> Clone for ServiceContext<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            session: Arc::clone(&self.session),
            notifier: Arc::clone(&self.notifier),
            timezone: self.timezone,
            bus: self.bus.clone(),
            caches: Arc::clone(&self.caches),
        }
    }
}

impl<R: Repository> ServiceContext<R> {
    pub fn new(repo: Arc<R>, session: Arc<Session>, notifier: Arc<dyn Notifier>, timezone: Tz) -> Self {
        let bus = CacheBus::default();
        Self {
            repo,
            session,
            notifier,
            timezone,
            caches: Arc::new(Caches::new(bus.clone())),
            bus,
        }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Bus carrying cache invalidations; subscribe to re-render on change.
    pub fn bus(&self) -> &CacheBus {
        &self.bus
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Signed-in user for a mutation. Reports once when nobody is signed in.
    pub(crate) fn owner(&self) -> Result<Uuid, CoreError> {
        self.session
            .require_user()
            .map_err(|err| self.reported("Could not save your change", err))
    }

    /// Logs `err`, emits one error notification, and hands the error back.
    pub(crate) fn reported(&self, context: &str, err: CoreError) -> CoreError {
        tracing::error!(error = ?err, "{}", context);
        self.notifier
            .error(&format!("{}: {}", context, err.user_message()));
        err
    }

    /// Unwraps a read, turning a failure into one notification and an empty result.
    pub(crate) fn read_or_empty<T>(&self, context: &str, result: Result<Vec<T>, CoreError>) -> Vec<T> {
        match result {
            Ok(rows) => rows,
            Err(err) => {
                self.reported(context, err);
                Vec::new()
            }
        }
    }

    /// Applies a realtime change to the matching cache.
    ///
    /// Inserts and updates older than an in-flight write are dropped, as are
    /// deletes of rows with a write in flight. Returns whether the cache changed.
    pub async fn apply_change(&self, event: FeedEvent) -> Result<bool, CoreError> {
        let change = match event {
            FeedEvent::Lagged => {
                let owner = self.session.require_user()?;
                self.invalidate_all(owner);
                return Ok(true);
            }
            FeedEvent::Change(change) => change,
        };

        let owner = change.owner;
        let caches = &self.caches;
        match change.table {
            Table::Tasks => {
                let cache = caches.tasks.for_owner(owner);
                if !admit(&cache, change.kind, change.id, change.revision) {
                    return Ok(false);
                }
                match change.kind {
                    ChangeKind::Delete => {
                        cache.accept_delete(change.id);
                    }
                    ChangeKind::Insert | ChangeKind::Update => {
                        match self.repo.find_task_by_id(owner, change.id).await? {
                            Some(task) => {
                                cache.accept_push(task);
                            }
                            None => {
                                cache.accept_delete(change.id);
                            }
                        }
                    }
                }
                cache.invalidate();
                Ok(true)
            }
            Table::DoTodayOff => Ok(admit_and_invalidate(&caches.off_log.for_owner(owner), &change)),
            Table::Sections => Ok(admit_and_invalidate(&caches.sections.for_owner(owner), &change)),
            Table::Categories => Ok(admit_and_invalidate(&caches.categories.for_owner(owner), &change)),
            Table::Appointments => Ok(admit_and_invalidate(&caches.appointments.for_owner(owner), &change)),
            Table::Habits => Ok(admit_and_invalidate(&caches.habits.for_owner(owner), &change)),
            Table::HabitLogs => Ok(admit_and_invalidate(&caches.habit_logs.for_owner(owner), &change)),
            Table::Goals => Ok(admit_and_invalidate(&caches.goals.for_owner(owner), &change)),
        }
    }

    pub fn invalidate_all(&self, owner: Uuid) {
        let caches = &self.caches;
        caches.tasks.for_owner(owner).invalidate();
        caches.off_log.for_owner(owner).invalidate();
        caches.sections.for_owner(owner).invalidate();
        caches.categories.for_owner(owner).invalidate();
        caches.appointments.for_owner(owner).invalidate();
        caches.habits.for_owner(owner).invalidate();
        caches.habit_logs.for_owner(owner).invalidate();
        caches.goals.for_owner(owner).invalidate();
    }
}

fn admit<T: CachedRow>(cache: &EntityCache<T>, kind: ChangeKind, id: Uuid, revision: i64) -> bool {
    let stale = match kind {
        ChangeKind::Delete => cache.pending().is_pending(id),
        ChangeKind::Insert | ChangeKind::Update => cache.pending().is_stale(id, revision),
    };
    if stale {
        tracing::warn!(key = %cache.key(), id = %id, revision, "ignoring push for row with pending write");
    }
    !stale
}

fn admit_and_invalidate<T: CachedRow>(cache: &EntityCache<T>, change: &RowChange) -> bool {
    if !admit(cache, change.kind, change.id, change.revision) {
        return false;
    }
    cache.invalidate();
    true
}

/// Cached rows when current, otherwise a fresh fetch that refills the cache.
pub(crate) async fn read_through<T, Fut>(cache: &EntityCache<T>, fetch: impl FnOnce() -> Fut) -> Result<Vec<T>, CoreError>
where
    T: CachedRow,
    Fut: Future<Output = Result<Vec<T>, CoreError>>,
{
    if !cache.is_stale() {
        return Ok(cache.snapshot());
    }
    let generation = cache.generation();
    let rows = fetch().await?;
    if cache.fill(rows.clone(), generation) {
        tracing::debug!(key = %cache.key(), rows = rows.len(), "cache refilled");
    } else {
        tracing::debug!(key = %cache.key(), "cache invalidated during fetch, left stale");
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Uuid,
        revision: i64,
    }

    impl CachedRow for Row {
        fn row_id(&self) -> Uuid {
            self.id
        }

        fn revision(&self) -> i64 {
            self.revision
        }
    }

    #[tokio::test]
    async fn test_read_through_serves_cache_when_current() {
        let cache: EntityCache<Row> = EntityCache::new(CacheKey::new("rows", Uuid::nil()), CacheBus::default());
        let row = Row { id: Uuid::now_v7(), revision: 1 };

        let first = read_through(&cache, || async { Ok(vec![row.clone()]) }).await.unwrap();
        let second = read_through(&cache, || async { Err(CoreError::InvalidInput("not called".to_string())) })
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_read_through_stays_stale_when_invalidated_mid_fetch() {
        let cache: EntityCache<Row> = EntityCache::new(CacheKey::new("rows", Uuid::nil()), CacheBus::default());
        let old = Row { id: Uuid::now_v7(), revision: 1 };

        let rows = read_through(&cache, || async {
            // A mutation completes while the read is in flight
            cache.invalidate();
            Ok(vec![old.clone()])
        })
        .await
        .unwrap();

        assert_eq!(rows, vec![old]);
        assert!(cache.is_stale());

        let fresh = Row { id: Uuid::now_v7(), revision: 2 };
        let rows = read_through(&cache, || async { Ok(vec![fresh.clone()]) }).await.unwrap();
        assert_eq!(rows, vec![fresh]);
        assert!(!cache.is_stale());
    }
}
