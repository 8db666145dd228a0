use crate::changes::{ChangeKind, Table};
use crate::error::CoreError;
use crate::models::{Goal, NewGoalData};
use crate::repository::{require_text, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

const GOAL_COLUMNS: &str = r#"id, user_id, title, description, target_date, completed, "order", revision, created_at"#;

#[async_trait]
impl super::GoalRepository for SqliteRepository {
    async fn add_goal(&self, owner: Uuid, data: NewGoalData) -> Result<Goal, CoreError> {
        require_text("Goal title", &data.title)?;

        let goal: Goal = sqlx::query_as(&format!(
            r#"INSERT INTO goals (id, user_id, title, description, target_date, completed, "order", revision, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, (SELECT COALESCE(MAX("order") + 1, 0) FROM goals WHERE user_id = $2), 0, $6)
            RETURNING {}"#,
            GOAL_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(data.target_date)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        self.publish(Table::Goals, owner, ChangeKind::Insert, goal.id, goal.revision);
        Ok(goal)
    }

    async fn find_goals(&self, owner: Uuid) -> Result<Vec<Goal>, CoreError> {
        let goals = sqlx::query_as(&format!(
            r#"SELECT {} FROM goals WHERE user_id = $1 ORDER BY completed, "order", created_at"#,
            GOAL_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(goals)
    }

    async fn set_goal_completed(&self, owner: Uuid, id: Uuid, completed: bool) -> Result<Goal, CoreError> {
        let goal: Goal = sqlx::query_as(&format!(
            r#"UPDATE goals SET completed = $1, revision = revision + 1
            WHERE id = $2 AND user_id = $3
            RETURNING {}"#,
            GOAL_COLUMNS
        ))
        .bind(completed)
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Goal {}", id)))?;

        self.publish(Table::Goals, owner, ChangeKind::Update, goal.id, goal.revision);
        Ok(goal)
    }

    async fn delete_goal(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Goal {}", id)));
        }

        self.publish(Table::Goals, owner, ChangeKind::Delete, id, 0);
        Ok(())
    }
}
