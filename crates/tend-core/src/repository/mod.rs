use crate::changes::{ChangeFeed, ChangeKind, RowChange, Table};
use crate::db::DbPool;
use crate::do_today::ToggleAllPlan;
use crate::error::CoreError;
use crate::models::{
    Appointment, Category, DoTodayOff, Goal, Habit, HabitLog, NewAppointmentData,
    NewCategoryData, NewGoalData, NewHabitData, NewSectionData, NewTaskData, Section, Task,
    UpdateAppointmentData, UpdateSectionData, UpdateTaskData,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use uuid::Uuid;

pub mod appointments;
pub mod categories;
pub mod do_today;
pub mod goals;
pub mod habits;
pub mod sections;
pub mod tasks;

// Every operation takes the owner id first; rows of other owners are invisible
// and behave as missing.

/// Domain-specific trait for task operations
#[async_trait]
pub trait TaskRepository {
    async fn add_task(&self, owner: Uuid, data: NewTaskData) -> Result<Task, CoreError>;
    async fn add_tasks(&self, owner: Uuid, data: Vec<NewTaskData>) -> Result<Vec<Task>, CoreError>;
    async fn find_task_by_id(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, CoreError>;
    async fn find_tasks_by_short_id_prefix(&self, owner: Uuid, short_id: &str) -> Result<Vec<Task>, CoreError>;
    /// All tasks of the owner, ordered by manual order then creation time.
    async fn find_tasks(&self, owner: Uuid) -> Result<Vec<Task>, CoreError>;
    async fn update_task(&self, owner: Uuid, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError>;
    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError>;
    async fn reorder_tasks(&self, owner: Uuid, ordered_ids: &[Uuid]) -> Result<(), CoreError>;
}

/// Domain-specific trait for section operations
#[async_trait]
pub trait SectionRepository {
    async fn add_section(&self, owner: Uuid, data: NewSectionData) -> Result<Section, CoreError>;
    async fn find_sections(&self, owner: Uuid) -> Result<Vec<Section>, CoreError>;
    async fn update_section(&self, owner: Uuid, id: Uuid, data: UpdateSectionData) -> Result<Section, CoreError>;
    /// Deletes the section; its tasks stay and lose their section.
    async fn delete_section(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError>;
    async fn reorder_sections(&self, owner: Uuid, ordered_ids: &[Uuid]) -> Result<(), CoreError>;
}

/// Domain-specific trait for category operations
#[async_trait]
pub trait CategoryRepository {
    async fn add_category(&self, owner: Uuid, data: NewCategoryData) -> Result<Category, CoreError>;
    async fn find_categories(&self, owner: Uuid) -> Result<Vec<Category>, CoreError>;
    /// Deletes the category; tasks referencing it lose their category.
    async fn delete_category(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for the do-today opt-out log
#[async_trait]
pub trait DoTodayRepository {
    async fn find_off_entries(&self, owner: Uuid, date: NaiveDate) -> Result<Vec<DoTodayOff>, CoreError>;
    async fn find_off_set(&self, owner: Uuid, date: NaiveDate) -> Result<HashSet<Uuid>, CoreError>;
    async fn add_off(&self, owner: Uuid, lineage_id: Uuid, date: NaiveDate) -> Result<DoTodayOff, CoreError>;
    async fn remove_off(&self, owner: Uuid, lineage_id: Uuid, date: NaiveDate) -> Result<(), CoreError>;
    /// Clears the day's log and inserts the plan's entries in one transaction.
    async fn apply_toggle_all(&self, owner: Uuid, date: NaiveDate, plan: &ToggleAllPlan) -> Result<Vec<DoTodayOff>, CoreError>;
}

/// Domain-specific trait for appointment operations
#[async_trait]
pub trait AppointmentRepository {
    async fn add_appointment(&self, owner: Uuid, data: NewAppointmentData) -> Result<Appointment, CoreError>;
    async fn find_appointments(&self, owner: Uuid) -> Result<Vec<Appointment>, CoreError>;
    async fn find_appointments_on(&self, owner: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, CoreError>;
    async fn update_appointment(&self, owner: Uuid, id: Uuid, data: UpdateAppointmentData) -> Result<Appointment, CoreError>;
    async fn delete_appointment(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError>;
}

/// Domain-specific trait for habit operations
#[async_trait]
pub trait HabitRepository {
    async fn add_habit(&self, owner: Uuid, data: NewHabitData) -> Result<Habit, CoreError>;
    async fn find_habits(&self, owner: Uuid) -> Result<Vec<Habit>, CoreError>;
    async fn delete_habit(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError>;
    /// Records (or overwrites) the habit's outcome for a day.
    async fn log_habit(&self, owner: Uuid, habit_id: Uuid, date: NaiveDate, completed: bool) -> Result<HabitLog, CoreError>;
    async fn find_habit_logs(&self, owner: Uuid, habit_id: Uuid) -> Result<Vec<HabitLog>, CoreError>;
}

/// Domain-specific trait for goal operations
#[async_trait]
pub trait GoalRepository {
    async fn add_goal(&self, owner: Uuid, data: NewGoalData) -> Result<Goal, CoreError>;
    /// Open goals first, then completed ones.
    async fn find_goals(&self, owner: Uuid) -> Result<Vec<Goal>, CoreError>;
    async fn set_goal_completed(&self, owner: Uuid, id: Uuid, completed: bool) -> Result<Goal, CoreError>;
    async fn delete_goal(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository:
    TaskRepository
    + SectionRepository
    + CategoryRepository
    + DoTodayRepository
    + AppointmentRepository
    + HabitRepository
    + GoalRepository
    + Send
    + Sync
{
    /// Feed of every write made through this repository
    fn changes(&self) -> &ChangeFeed;
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    changes: ChangeFeed,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            changes: ChangeFeed::default(),
        }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn publish(&self, table: Table, owner: Uuid, kind: ChangeKind, id: Uuid, revision: i64) {
        self.changes.publish(RowChange {
            table,
            owner,
            kind,
            id,
            revision,
        });
    }
}

impl Repository for SqliteRepository {
    fn changes(&self) -> &ChangeFeed {
        &self.changes
    }
}

/// Fails with `InvalidInput` when `value` is blank.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::InvalidInput(format!("{} must not be empty", field)));
    }
    Ok(())
}
