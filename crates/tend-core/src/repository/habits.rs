use crate::changes::{ChangeKind, Table};
use crate::error::CoreError;
use crate::models::{Habit, HabitLog, NewHabitData};
use crate::repository::{require_text, SqliteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

const HABIT_COLUMNS: &str = r#"id, user_id, name, description, "order", revision, created_at"#;
const HABIT_LOG_COLUMNS: &str = "id, user_id, habit_id, log_date, completed, created_at";

#[async_trait]
impl super::HabitRepository for SqliteRepository {
    async fn add_habit(&self, owner: Uuid, data: NewHabitData) -> Result<Habit, CoreError> {
        require_text("Habit name", &data.name)?;

        let habit: Habit = sqlx::query_as(&format!(
            r#"INSERT INTO habits (id, user_id, name, description, "order", revision, created_at)
            VALUES ($1, $2, $3, $4, (SELECT COALESCE(MAX("order") + 1, 0) FROM habits WHERE user_id = $2), 0, $5)
            RETURNING {}"#,
            HABIT_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(data.name.trim())
        .bind(&data.description)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        self.publish(Table::Habits, owner, ChangeKind::Insert, habit.id, habit.revision);
        Ok(habit)
    }

    async fn find_habits(&self, owner: Uuid) -> Result<Vec<Habit>, CoreError> {
        let habits = sqlx::query_as(&format!(
            r#"SELECT {} FROM habits WHERE user_id = $1 ORDER BY "order", created_at"#,
            HABIT_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(habits)
    }

    async fn delete_habit(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM habits WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Habit {}", id)));
        }

        self.publish(Table::Habits, owner, ChangeKind::Delete, id, 0);
        Ok(())
    }

    async fn log_habit(&self, owner: Uuid, habit_id: Uuid, date: NaiveDate, completed: bool) -> Result<HabitLog, CoreError> {
        let mut tx = self.pool().begin().await?;
        Self::ensure_owned(&mut tx, "habits", owner, habit_id).await?;

        let log: HabitLog = sqlx::query_as(&format!(
            r#"INSERT INTO habit_logs (id, user_id, habit_id, log_date, completed, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (habit_id, log_date) DO UPDATE SET completed = excluded.completed
            RETURNING {}"#,
            HABIT_LOG_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(habit_id)
        .bind(date)
        .bind(completed)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.publish(Table::HabitLogs, owner, ChangeKind::Insert, log.id, 0);
        Ok(log)
    }

    async fn find_habit_logs(&self, owner: Uuid, habit_id: Uuid) -> Result<Vec<HabitLog>, CoreError> {
        let logs = sqlx::query_as(&format!(
            "SELECT {} FROM habit_logs WHERE user_id = $1 AND habit_id = $2 ORDER BY log_date",
            HABIT_LOG_COLUMNS
        ))
        .bind(owner)
        .bind(habit_id)
        .fetch_all(self.pool())
        .await?;
        Ok(logs)
    }
}
