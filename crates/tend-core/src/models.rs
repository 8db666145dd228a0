use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::cache::CachedRow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "to-do")]
    #[sqlx(rename = "to-do")]
    ToDo,
    #[serde(rename = "completed")]
    #[sqlx(rename = "completed")]
    Completed,
    #[serde(rename = "skipped")]
    #[sqlx(rename = "skipped")]
    Skipped,
    #[serde(rename = "archived")]
    #[sqlx(rename = "archived")]
    Archived,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::ToDo => write!(f, "to-do"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Skipped => write!(f, "skipped"),
            TaskStatus::Archived => write!(f, "archived"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task status: {0}")]
pub struct ParseTaskStatusError(String);

impl FromStr for TaskStatus {
    type Err = ParseTaskStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "to-do" | "todo" => Ok(TaskStatus::ToDo),
            "completed" | "done" => Ok(TaskStatus::Completed),
            "skipped" => Ok(TaskStatus::Skipped),
            "archived" => Ok(TaskStatus::Archived),
            _ => Err(ParseTaskStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
    #[default]
    None,
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
            TaskPriority::None => write!(f, "none"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid task priority: {0}")]
pub struct ParseTaskPriorityError(String);

impl FromStr for TaskPriority {
    type Err = ParseTaskPriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            "none" => Ok(TaskPriority::None),
            _ => Err(ParseTaskPriorityError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecurringType {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for RecurringType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurringType::None => write!(f, "none"),
            RecurringType::Daily => write!(f, "daily"),
            RecurringType::Weekly => write!(f, "weekly"),
            RecurringType::Monthly => write!(f, "monthly"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence: {0}")]
pub struct ParseRecurringTypeError(String);

impl FromStr for RecurringType {
    type Err = ParseRecurringTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(RecurringType::None),
            "daily" => Ok(RecurringType::Daily),
            "weekly" => Ok(RecurringType::Weekly),
            "monthly" => Ok(RecurringType::Monthly),
            _ => Err(ParseRecurringTypeError(s.to_string())),
        }
    }
}

/// An action item. Recurring tasks are stored as one row per occurrence; all
/// occurrences of the same logical task share a lineage (see [`Task::lineage_id`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub link: Option<String>,
    pub remind_at: Option<DateTime<Utc>>,
    pub section_id: Option<Uuid>,
    pub category: Option<Uuid>,
    pub recurring_type: RecurringType,
    /// Null on the original occurrence, otherwise the id of the original.
    pub original_task_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub order: i64,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Identifier shared by every occurrence of the same logical task.
    #[inline]
    pub fn lineage_id(&self) -> Uuid {
        self.original_task_id.unwrap_or(self.id)
    }

    #[inline]
    pub fn is_recurring(&self) -> bool {
        self.recurring_type != RecurringType::None
    }

    #[inline]
    pub fn is_top_level(&self) -> bool {
        self.parent_task_id.is_none()
    }

    /// Builds an unsaved task from creation data.
    pub fn draft(id: Uuid, user_id: Uuid, data: &NewTaskData, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            description: data.description.clone(),
            status: TaskStatus::ToDo,
            priority: data.priority.unwrap_or_default(),
            due_date: data.due_date,
            notes: data.notes.clone(),
            link: data.link.clone(),
            remind_at: data.remind_at,
            section_id: data.section_id,
            category: data.category,
            recurring_type: data.recurring_type.unwrap_or_default(),
            original_task_id: data.original_task_id,
            parent_task_id: data.parent_task_id,
            order: data.order.unwrap_or(0),
            revision: 0,
            created_at: data.created_at.unwrap_or(now),
            updated_at: now,
            completed_at: None,
        }
    }

    /// Applies an update in memory, mirroring what the store will write.
    pub fn apply_update(&mut self, data: &UpdateTaskData, now: DateTime<Utc>) {
        if let Some(description) = &data.description {
            self.description = description.clone();
        }
        if let Some(status) = data.status {
            self.status = status;
            self.completed_at = match status {
                TaskStatus::Completed => Some(now),
                _ => None,
            };
        }
        if let Some(priority) = data.priority {
            self.priority = priority;
        }
        if let Some(due_date) = data.due_date {
            self.due_date = due_date;
        }
        if let Some(notes) = &data.notes {
            self.notes = notes.clone();
        }
        if let Some(link) = &data.link {
            self.link = link.clone();
        }
        if let Some(remind_at) = data.remind_at {
            self.remind_at = remind_at;
        }
        if let Some(section_id) = data.section_id {
            self.section_id = section_id;
        }
        if let Some(category) = data.category {
            self.category = category;
        }
        if let Some(recurring_type) = data.recurring_type {
            self.recurring_type = recurring_type;
        }
        if let Some(order) = data.order {
            self.order = order;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewTaskData {
    pub description: String,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub link: Option<String>,
    pub remind_at: Option<DateTime<Utc>>,
    pub section_id: Option<Uuid>,
    pub category: Option<Uuid>,
    pub recurring_type: Option<RecurringType>,
    /// Set when materializing a further occurrence of a recurring lineage
    pub original_task_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub order: Option<i64>,
    /// Overrides the creation timestamp (occurrence materialization, imports)
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTaskData {
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
    pub link: Option<Option<String>>,
    pub remind_at: Option<Option<DateTime<Utc>>>,
    pub section_id: Option<Option<Uuid>>,
    pub category: Option<Option<Uuid>>,
    pub recurring_type: Option<RecurringType>,
    pub order: Option<i64>,
}

impl UpdateTaskData {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Section {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub order: i64,
    pub include_in_focus_mode: bool,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewSectionData {
    pub name: String,
    pub order: Option<i64>,
    pub include_in_focus_mode: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSectionData {
    pub name: Option<String>,
    pub include_in_focus_mode: Option<bool>,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub color: String,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCategoryData {
    pub name: String,
    pub color: String,
}

/// "Do not present the lineage `task_id` as due on `off_date`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DoTodayOff {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub off_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub color: String,
    pub task_id: Option<Uuid>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

pub const DEFAULT_APPOINTMENT_COLOR: &str = "#3b82f6";

#[derive(Debug, Clone)]
pub struct NewAppointmentData {
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub color: Option<String>,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAppointmentData {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub color: Option<String>,
    pub task_id: Option<Option<Uuid>>,
}

impl Appointment {
    pub fn apply_update(&mut self, data: &UpdateAppointmentData) {
        if let Some(title) = &data.title {
            self.title = title.clone();
        }
        if let Some(description) = &data.description {
            self.description = description.clone();
        }
        if let Some(date) = data.date {
            self.date = date;
        }
        if let Some(start_time) = data.start_time {
            self.start_time = start_time;
        }
        if let Some(end_time) = data.end_time {
            self.end_time = end_time;
        }
        if let Some(color) = &data.color {
            self.color = color.clone();
        }
        if let Some(task_id) = data.task_id {
            self.task_id = task_id;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Habit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub order: i64,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewHabitData {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct HabitLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub habit_id: Uuid,
    pub log_date: NaiveDate,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// A longer-term outcome the user is working towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
    pub completed: bool,
    pub order: i64,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewGoalData {
    pub title: String,
    pub description: Option<String>,
    pub target_date: Option<NaiveDate>,
}

macro_rules! impl_cached_row {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl CachedRow for $ty {
                fn row_id(&self) -> Uuid {
                    self.id
                }

                fn revision(&self) -> i64 {
                    self.revision
                }
            }
        )+
    };
}

impl_cached_row!(Task, Section, Category, Appointment, Habit, Goal);

impl CachedRow for DoTodayOff {
    fn row_id(&self) -> Uuid {
        self.id
    }

    fn revision(&self) -> i64 {
        0
    }
}

impl CachedRow for HabitLog {
    fn row_id(&self) -> Uuid {
        self.id
    }

    fn revision(&self) -> i64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("to-do", TaskStatus::ToDo)]
    #[case("todo", TaskStatus::ToDo)]
    #[case("Completed", TaskStatus::Completed)]
    #[case("skipped", TaskStatus::Skipped)]
    #[case("ARCHIVED", TaskStatus::Archived)]
    fn test_parse_status(#[case] input: &str, #[case] expected: TaskStatus) {
        assert_eq!(input.parse::<TaskStatus>().unwrap(), expected);
    }

    #[test]
    fn test_parse_status_invalid() {
        assert!("pending".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde_uses_hyphenated_todo() {
        let json = serde_json::to_string(&TaskStatus::ToDo).unwrap();
        assert_eq!(json, "\"to-do\"");
        let back: TaskStatus = serde_json::from_str("\"archived\"").unwrap();
        assert_eq!(back, TaskStatus::Archived);
    }

    #[test]
    fn test_lineage_id_falls_back_to_own_id() {
        let now = Utc::now();
        let original = Task::draft(Uuid::now_v7(), Uuid::nil(), &NewTaskData::default(), now);
        assert_eq!(original.lineage_id(), original.id);

        let data = NewTaskData {
            original_task_id: Some(original.id),
            ..Default::default()
        };
        let instance = Task::draft(Uuid::now_v7(), Uuid::nil(), &data, now);
        assert_eq!(instance.lineage_id(), original.id);
    }

    #[test]
    fn test_apply_update_sets_completed_at_only_for_completed() {
        let now = Utc::now();
        let mut task = Task::draft(Uuid::now_v7(), Uuid::nil(), &NewTaskData::default(), now);

        task.apply_update(&UpdateTaskData::status(TaskStatus::Completed), now);
        assert_eq!(task.completed_at, Some(now));

        task.apply_update(&UpdateTaskData::status(TaskStatus::ToDo), now);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn test_apply_update_clears_optional_fields() {
        let now = Utc::now();
        let data = NewTaskData {
            description: "Water plants".to_string(),
            notes: Some("balcony".to_string()),
            section_id: Some(Uuid::now_v7()),
            ..Default::default()
        };
        let mut task = Task::draft(Uuid::now_v7(), Uuid::nil(), &data, now);

        task.apply_update(
            &UpdateTaskData {
                notes: Some(None),
                section_id: Some(None),
                ..Default::default()
            },
            now,
        );

        assert_eq!(task.description, "Water plants");
        assert!(task.notes.is_none());
        assert!(task.section_id.is_none());
    }
}
