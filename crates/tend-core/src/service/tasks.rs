use chrono::{NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{read_through, ServiceContext};
use crate::cache::EntityCache;
use crate::changes::{ChangeSubscription, FeedEvent, Table};
use crate::do_today::{plan_toggle_all, DoTodayState};
use crate::error::CoreError;
use crate::models::{DoTodayOff, NewTaskData, Task, TaskStatus, UpdateTaskData};
use crate::optimistic::OptimisticUpdate;
use crate::recurrence::DailyResolver;
use crate::repository::Repository;
use crate::timezone::today_in;

const TOGGLE_FAILED: &str = "Could not update today's list";

/// Daily task list, task mutations, and the do-today toggle.
pub struct TaskService<R: Repository> {
    ctx: ServiceContext<R>,
    // Day whose off-log entries are currently cached, per owner
    off_days: Mutex<HashMap<Uuid, NaiveDate>>,
}

impl<R: Repository> TaskService<R> {
    pub fn new(ctx: ServiceContext<R>) -> Self {
        Self {
            ctx,
            off_days: Mutex::new(HashMap::new()),
        }
    }

    pub fn context(&self) -> &ServiceContext<R> {
        &self.ctx
    }

    fn task_cache(&self, owner: Uuid) -> Arc<EntityCache<Task>> {
        self.ctx.caches().tasks.for_owner(owner)
    }

    fn off_cache(&self, owner: Uuid) -> Arc<EntityCache<DoTodayOff>> {
        self.ctx.caches().off_log.for_owner(owner)
    }

    fn off_days(&self) -> MutexGuard<'_, HashMap<Uuid, NaiveDate>> {
        self.off_days.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch_tasks(&self, owner: Uuid) -> Result<Vec<Task>, CoreError> {
        let cache = self.task_cache(owner);
        read_through(&cache, || self.ctx.repo().find_tasks(owner)).await
    }

    async fn fetch_off_set(&self, owner: Uuid, date: NaiveDate) -> Result<HashSet<Uuid>, CoreError> {
        let cache = self.off_cache(owner);
        let loaded = self.off_days().get(&owner).copied();
        if loaded != Some(date) {
            cache.invalidate();
        }

        let entries = read_through(&cache, || self.ctx.repo().find_off_entries(owner, date)).await?;
        self.off_days().insert(owner, date);

        Ok(entries
            .iter()
            .filter(|entry| entry.off_date == date)
            .map(|entry| entry.task_id)
            .collect())
    }

    /// Every task of the signed-in user, sub-tasks included.
    pub async fn tasks(&self) -> Vec<Task> {
        let result = match self.ctx.session().require_user() {
            Ok(owner) => self.fetch_tasks(owner).await,
            Err(err) => Err(err),
        };
        self.ctx.read_or_empty("Could not load tasks", result)
    }

    /// Creates the occurrences recurring lineages need on `date`.
    pub async fn materialize_recurring(&self, date: NaiveDate) -> Result<Vec<Task>, CoreError> {
        let owner = self.ctx.session().require_user()?;
        self.materialize_for(owner, date).await
    }

    async fn materialize_for(&self, owner: Uuid, date: NaiveDate) -> Result<Vec<Task>, CoreError> {
        let tasks = self.fetch_tasks(owner).await?;
        let resolver = DailyResolver::new(date, self.ctx.timezone(), HashSet::new());
        let drafts = resolver.occurrences_to_materialize(&tasks, Utc::now());
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let created = self.ctx.repo().add_tasks(owner, drafts).await?;
        tracing::debug!(count = created.len(), %date, "materialized recurring occurrences");

        let cache = self.task_cache(owner);
        for task in &created {
            cache.upsert(task.clone());
        }
        Ok(created)
    }

    /// Tasks and off-set for `date`. Today's recurring occurrences are created first.
    async fn load_day(&self, owner: Uuid, date: NaiveDate) -> Result<(Vec<Task>, HashSet<Uuid>), CoreError> {
        if date == today_in(&self.ctx.timezone()) {
            self.materialize_for(owner, date).await?;
        }
        let tasks = self.fetch_tasks(owner).await?;
        let off_set = self.fetch_off_set(owner, date).await?;
        Ok((tasks, off_set))
    }

    async fn load_day_for_user(&self, date: NaiveDate) -> Result<(Vec<Task>, HashSet<Uuid>), CoreError> {
        let owner = self.ctx.session().require_user()?;
        self.load_day(owner, date).await
    }

    /// Tasks presented as due on `date`, switched-off lineages excluded.
    pub async fn today(&self, date: NaiveDate) -> Vec<Task> {
        let result = self
            .load_day_for_user(date)
            .await
            .map(|(tasks, off_set)| DailyResolver::new(date, self.ctx.timezone(), off_set).resolve(&tasks));
        self.ctx.read_or_empty("Could not load today's tasks", result)
    }

    /// The day's list including switched-off lineages, each with its state.
    pub async fn day_plan(&self, date: NaiveDate) -> Vec<(Task, DoTodayState)> {
        let result = self.load_day_for_user(date).await.map(|(tasks, off_set)| {
            DailyResolver::new(date, self.ctx.timezone(), HashSet::new())
                .resolve(&tasks)
                .into_iter()
                .map(|task| {
                    let state = DoTodayState::of(task.lineage_id(), &off_set);
                    (task, state)
                })
                .collect()
        });
        self.ctx.read_or_empty("Could not load today's tasks", result)
    }

    /// Number of due tasks that belong in focus mode.
    pub async fn daily_count(&self, date: NaiveDate) -> usize {
        let result = async {
            let owner = self.ctx.session().require_user()?;
            let (tasks, off_set) = self.load_day(owner, date).await?;
            let sections_cache = self.ctx.caches().sections.for_owner(owner);
            let sections = read_through(&sections_cache, || self.ctx.repo().find_sections(owner)).await?;
            Ok::<_, CoreError>(DailyResolver::new(date, self.ctx.timezone(), off_set).count_focus(&tasks, &sections))
        }
        .await;

        match result {
            Ok(count) => count,
            Err(err) => {
                self.ctx.reported("Could not count today's tasks", err);
                0
            }
        }
    }

    pub async fn add_task(&self, data: NewTaskData) -> Result<Task, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.task_cache(owner);
        let temp_id = Uuid::new_v4();
        let draft = Task::draft(temp_id, owner, &data, Utc::now());

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not add task")
            .run(
                move |rows| rows.push(draft),
                || self.ctx.repo().add_task(owner, data),
                move |cache: &EntityCache<Task>, saved: &Task| cache.replace_id(temp_id, saved.clone()),
            )
            .await
    }

    pub async fn update_task(&self, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.task_cache(owner);
        let local = data.clone();
        let now = Utc::now();

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not update task")
            .pending_update(id)
            .run(
                move |rows| {
                    if let Some(task) = rows.iter_mut().find(|t| t.id == id) {
                        task.apply_update(&local, now);
                    }
                },
                || self.ctx.repo().update_task(owner, id, data),
                |cache: &EntityCache<Task>, saved: &Task| cache.upsert(saved.clone()),
            )
            .await
    }

    pub async fn set_status(&self, id: Uuid, status: TaskStatus) -> Result<Task, CoreError> {
        self.update_task(id, UpdateTaskData::status(status)).await
    }

    pub async fn complete_task(&self, id: Uuid) -> Result<Task, CoreError> {
        self.set_status(id, TaskStatus::Completed).await
    }

    pub async fn skip_task(&self, id: Uuid) -> Result<Task, CoreError> {
        self.set_status(id, TaskStatus::Skipped).await
    }

    pub async fn archive_task(&self, id: Uuid) -> Result<Task, CoreError> {
        self.set_status(id, TaskStatus::Archived).await
    }

    /// Deletes a task together with its sub-tasks.
    pub async fn delete_task(&self, id: Uuid) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.task_cache(owner);

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not delete task")
            .pending_delete(id)
            .run(
                move |rows| rows.retain(|t| t.id != id && t.parent_task_id != Some(id)),
                || self.ctx.repo().delete_task(owner, id),
                |_, _: &()| {},
            )
            .await
    }

    /// Gives the listed tasks consecutive manual positions starting at zero.
    pub async fn reorder_tasks(&self, ordered_ids: &[Uuid]) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.task_cache(owner);
        let positions: HashMap<Uuid, i64> = ordered_ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position as i64))
            .collect();

        let mut update = OptimisticUpdate::new(&cache, self.ctx.notifier()).failure_message("Could not reorder tasks");
        for id in ordered_ids {
            update = update.pending_update(*id);
        }

        update
            .run(
                move |rows| {
                    for task in rows.iter_mut() {
                        if let Some(position) = positions.get(&task.id) {
                            task.order = *position;
                        }
                    }
                    rows.sort_by_key(|t| (t.order, t.created_at));
                },
                || self.ctx.repo().reorder_tasks(owner, ordered_ids),
                |_, _: &()| {},
            )
            .await
    }

    async fn lineage_of(&self, owner: Uuid, task_id: Uuid) -> Result<Uuid, CoreError> {
        if let Some(task) = self.task_cache(owner).get(task_id) {
            return Ok(task.lineage_id());
        }
        self.ctx
            .repo()
            .find_task_by_id(owner, task_id)
            .await?
            .map(|task| task.lineage_id())
            .ok_or_else(|| CoreError::NotFound(format!("Task {}", task_id)))
    }

    /// Flips the do-today state of the task's lineage on `date`.
    pub async fn toggle_do_today(&self, task_id: Uuid, date: NaiveDate) -> Result<DoTodayState, CoreError> {
        let owner = self.ctx.owner()?;
        let (lineage_id, current) = self.do_today_state(owner, task_id, date).await?;
        let target = current.toggled();
        self.write_do_today(owner, lineage_id, date, target).await?;
        Ok(target)
    }

    /// Puts the task's lineage in `target` state on `date`. Nothing is written
    /// when it is already there.
    pub async fn set_do_today(&self, task_id: Uuid, date: NaiveDate, target: DoTodayState) -> Result<DoTodayState, CoreError> {
        let owner = self.ctx.owner()?;
        let (lineage_id, current) = self.do_today_state(owner, task_id, date).await?;
        if current != target {
            self.write_do_today(owner, lineage_id, date, target).await?;
        }
        Ok(target)
    }

    async fn do_today_state(&self, owner: Uuid, task_id: Uuid, date: NaiveDate) -> Result<(Uuid, DoTodayState), CoreError> {
        let lineage_id = self
            .lineage_of(owner, task_id)
            .await
            .map_err(|err| self.ctx.reported(TOGGLE_FAILED, err))?;
        let off_set = self
            .fetch_off_set(owner, date)
            .await
            .map_err(|err| self.ctx.reported(TOGGLE_FAILED, err))?;
        Ok((lineage_id, DoTodayState::of(lineage_id, &off_set)))
    }

    async fn write_do_today(&self, owner: Uuid, lineage_id: Uuid, date: NaiveDate, target: DoTodayState) -> Result<(), CoreError> {
        let cache = self.off_cache(owner);
        let update = OptimisticUpdate::new(&cache, self.ctx.notifier()).failure_message(TOGGLE_FAILED);

        match target {
            DoTodayState::Off => {
                let temp_id = Uuid::new_v4();
                let entry = DoTodayOff {
                    id: temp_id,
                    user_id: owner,
                    task_id: lineage_id,
                    off_date: date,
                    created_at: Utc::now(),
                };
                update
                    .run(
                        move |rows| rows.push(entry),
                        || self.ctx.repo().add_off(owner, lineage_id, date),
                        move |cache: &EntityCache<DoTodayOff>, saved: &DoTodayOff| cache.replace_id(temp_id, saved.clone()),
                    )
                    .await?;
            }
            DoTodayState::On => {
                update
                    .run(
                        move |rows| rows.retain(|e| !(e.task_id == lineage_id && e.off_date == date)),
                        || self.ctx.repo().remove_off(owner, lineage_id, date),
                        |_, _: &()| {},
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Switches every visible one-off task off when most are on, otherwise
    /// switches them all on. Returns the state they now share.
    pub async fn toggle_all_do_today(&self, date: NaiveDate) -> Result<DoTodayState, CoreError> {
        let owner = self.ctx.owner()?;
        let (tasks, off_set) = self
            .load_day(owner, date)
            .await
            .map_err(|err| self.ctx.reported(TOGGLE_FAILED, err))?;

        let visible = DailyResolver::new(date, self.ctx.timezone(), HashSet::new()).resolve(&tasks);
        let plan = plan_toggle_all(&visible, &off_set);
        let target = plan.target;
        tracing::debug!(visible = visible.len(), target = ?target, %date, "toggle-all planned");

        let now = Utc::now();
        let optimistic: Vec<DoTodayOff> = plan
            .insert
            .iter()
            .map(|lineage_id| DoTodayOff {
                id: Uuid::new_v4(),
                user_id: owner,
                task_id: *lineage_id,
                off_date: date,
                created_at: now,
            })
            .collect();

        let cache = self.off_cache(owner);
        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message(TOGGLE_FAILED)
            .run(
                move |rows| {
                    rows.retain(|e| e.off_date != date);
                    rows.extend(optimistic);
                },
                || self.ctx.repo().apply_toggle_all(owner, date, &plan),
                move |cache: &EntityCache<DoTodayOff>, saved: &Vec<DoTodayOff>| {
                    cache.mutate(|rows| {
                        rows.retain(|e| e.off_date != date);
                        rows.extend(saved.iter().cloned());
                    });
                },
            )
            .await?;

        Ok(target)
    }

    /// Realtime task changes for the signed-in user.
    pub fn subscribe_changes(&self) -> Result<ChangeSubscription, CoreError> {
        let owner = self.ctx.session().require_user()?;
        Ok(self.ctx.repo().changes().subscribe(Table::Tasks, owner))
    }

    pub async fn apply_change(&self, event: FeedEvent) -> Result<bool, CoreError> {
        self.ctx.apply_change(event).await
    }
}
