use crate::changes::{ChangeKind, Table};
use crate::error::CoreError;
use crate::models::{NewTaskData, Task, UpdateTaskData};
use crate::repository::{require_text, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

pub(crate) const TASK_COLUMNS: &str = r#"id, user_id, description, status, priority, due_date, notes, link, remind_at,
    section_id, category, recurring_type, original_task_id, parent_task_id, "order", revision,
    created_at, updated_at, completed_at"#;

#[async_trait]
impl super::TaskRepository for SqliteRepository {
    async fn add_task(&self, owner: Uuid, data: NewTaskData) -> Result<Task, CoreError> {
        let mut tx = self.pool().begin().await?;
        let task = Self::add_task_in_transaction(&mut tx, owner, data).await?;
        tx.commit().await?;

        self.publish(Table::Tasks, owner, ChangeKind::Insert, task.id, task.revision);
        Ok(task)
    }

    async fn add_tasks(&self, owner: Uuid, data: Vec<NewTaskData>) -> Result<Vec<Task>, CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut created = Vec::with_capacity(data.len());
        for item in data {
            created.push(Self::add_task_in_transaction(&mut tx, owner, item).await?);
        }
        tx.commit().await?;

        for task in &created {
            self.publish(Table::Tasks, owner, ChangeKind::Insert, task.id, task.revision);
        }
        Ok(created)
    }

    async fn find_task_by_id(&self, owner: Uuid, id: Uuid) -> Result<Option<Task>, CoreError> {
        let task = sqlx::query_as(&format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool())
        .await?;
        Ok(task)
    }

    async fn find_tasks_by_short_id_prefix(&self, owner: Uuid, short_id: &str) -> Result<Vec<Task>, CoreError> {
        // Ids are stored as 16-byte blobs, so match against their hex form.
        // Only hex digits survive, which also keeps LIKE wildcards out.
        let mut pattern: String = short_id
            .chars()
            .filter(char::is_ascii_hexdigit)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if pattern.is_empty() {
            return Ok(Vec::new());
        }
        pattern.push('%');

        let tasks = sqlx::query_as(&format!(
            "SELECT {} FROM tasks WHERE user_id = $1 AND lower(hex(id)) LIKE $2",
            TASK_COLUMNS
        ))
        .bind(owner)
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;
        Ok(tasks)
    }

    async fn find_tasks(&self, owner: Uuid) -> Result<Vec<Task>, CoreError> {
        let tasks = sqlx::query_as(&format!(
            r#"SELECT {} FROM tasks WHERE user_id = $1 ORDER BY "order", created_at"#,
            TASK_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(tasks)
    }

    async fn update_task(&self, owner: Uuid, id: Uuid, data: UpdateTaskData) -> Result<Task, CoreError> {
        if let Some(description) = &data.description {
            require_text("Task description", description)?;
        }

        let mut tx = self.pool().begin().await?;

        let mut task: Task = sqlx::query_as(&format!(
            "SELECT {} FROM tasks WHERE id = $1 AND user_id = $2",
            TASK_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;

        if let Some(Some(section_id)) = data.section_id {
            Self::ensure_owned(&mut tx, "sections", owner, section_id).await?;
        }
        if let Some(Some(category)) = data.category {
            Self::ensure_owned(&mut tx, "categories", owner, category).await?;
        }

        task.apply_update(&data, Utc::now());

        let updated: Task = sqlx::query_as(&format!(
            r#"UPDATE tasks
            SET description = $1, status = $2, priority = $3, due_date = $4, notes = $5, link = $6,
                remind_at = $7, section_id = $8, category = $9, recurring_type = $10, "order" = $11,
                updated_at = $12, completed_at = $13, revision = revision + 1
            WHERE id = $14 AND user_id = $15
            RETURNING {}"#,
            TASK_COLUMNS
        ))
        .bind(&task.description)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(&task.notes)
        .bind(&task.link)
        .bind(task.remind_at)
        .bind(task.section_id)
        .bind(task.category)
        .bind(task.recurring_type)
        .bind(task.order)
        .bind(task.updated_at)
        .bind(task.completed_at)
        .bind(id)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.publish(Table::Tasks, owner, ChangeKind::Update, updated.id, updated.revision);
        Ok(updated)
    }

    async fn delete_task(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Task {}", id)));
        }

        self.publish(Table::Tasks, owner, ChangeKind::Delete, id, 0);
        Ok(())
    }

    async fn reorder_tasks(&self, owner: Uuid, ordered_ids: &[Uuid]) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut revisions = Vec::with_capacity(ordered_ids.len());

        for (position, id) in ordered_ids.iter().enumerate() {
            let revision: Option<(i64,)> = sqlx::query_as(
                r#"UPDATE tasks SET "order" = $1, updated_at = $2, revision = revision + 1
                WHERE id = $3 AND user_id = $4
                RETURNING revision"#,
            )
            .bind(position as i64)
            .bind(Utc::now())
            .bind(*id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;

            let (revision,) = revision.ok_or_else(|| CoreError::NotFound(format!("Task {}", id)))?;
            revisions.push((*id, revision));
        }

        tx.commit().await?;

        for (id, revision) in revisions {
            self.publish(Table::Tasks, owner, ChangeKind::Update, id, revision);
        }
        Ok(())
    }
}

impl SqliteRepository {
    pub(crate) async fn add_task_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        owner: Uuid,
        data: NewTaskData,
    ) -> Result<Task, CoreError> {
        require_text("Task description", &data.description)?;

        if let Some(section_id) = data.section_id {
            Self::ensure_owned(tx, "sections", owner, section_id).await?;
        }
        if let Some(category) = data.category {
            Self::ensure_owned(tx, "categories", owner, category).await?;
        }
        if let Some(parent_id) = data.parent_task_id {
            Self::ensure_owned(tx, "tasks", owner, parent_id).await?;
        }

        let draft = Task::draft(Uuid::now_v7(), owner, &data, Utc::now());

        let task = sqlx::query_as(&format!(
            r#"INSERT INTO tasks (id, user_id, description, status, priority, due_date, notes, link, remind_at,
                section_id, category, recurring_type, original_task_id, parent_task_id, "order", revision,
                created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING {}"#,
            TASK_COLUMNS
        ))
        .bind(draft.id)
        .bind(draft.user_id)
        .bind(&draft.description)
        .bind(draft.status)
        .bind(draft.priority)
        .bind(draft.due_date)
        .bind(&draft.notes)
        .bind(&draft.link)
        .bind(draft.remind_at)
        .bind(draft.section_id)
        .bind(draft.category)
        .bind(draft.recurring_type)
        .bind(draft.original_task_id)
        .bind(draft.parent_task_id)
        .bind(draft.order)
        .bind(draft.revision)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .bind(draft.completed_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(task)
    }

    /// Row-level check that `id` in `table` belongs to `owner`.
    pub(crate) async fn ensure_owned(
        tx: &mut Transaction<'_, Sqlite>,
        table: &'static str,
        owner: Uuid,
        id: Uuid,
    ) -> Result<(), CoreError> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE id = $1 AND user_id = $2",
            table
        ))
        .bind(id)
        .bind(owner)
        .fetch_one(&mut **tx)
        .await?;

        if count == 0 {
            let label = match table {
                "sections" => "section",
                "categories" => "category",
                "habits" => "habit",
                _ => "task",
            };
            return Err(CoreError::InvalidInput(format!("Unknown {} id {}", label, id)));
        }
        Ok(())
    }
}
