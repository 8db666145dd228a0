use crate::changes::{ChangeKind, Table};
use crate::error::CoreError;
use crate::models::{Category, NewCategoryData};
use crate::repository::{require_text, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

const CATEGORY_COLUMNS: &str = "id, user_id, name, color, revision, created_at";

#[async_trait]
impl super::CategoryRepository for SqliteRepository {
    async fn add_category(&self, owner: Uuid, data: NewCategoryData) -> Result<Category, CoreError> {
        require_text("Category name", &data.name)?;
        require_text("Category color", &data.color)?;

        let category: Category = sqlx::query_as(&format!(
            r#"INSERT INTO categories (id, user_id, name, color, revision, created_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            RETURNING {}"#,
            CATEGORY_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(data.name.trim())
        .bind(data.color.trim())
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        self.publish(Table::Categories, owner, ChangeKind::Insert, category.id, category.revision);
        Ok(category)
    }

    async fn find_categories(&self, owner: Uuid) -> Result<Vec<Category>, CoreError> {
        let categories = sqlx::query_as(&format!(
            "SELECT {} FROM categories WHERE user_id = $1 ORDER BY name",
            CATEGORY_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(categories)
    }

    async fn delete_category(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let detached: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"UPDATE tasks SET category = NULL, updated_at = $1, revision = revision + 1
            WHERE category = $2 AND user_id = $3
            RETURNING id, revision"#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(owner)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Category {}", id)));
        }

        tx.commit().await?;

        for (task_id, revision) in detached {
            self.publish(Table::Tasks, owner, ChangeKind::Update, task_id, revision);
        }
        self.publish(Table::Categories, owner, ChangeKind::Delete, id, 0);
        Ok(())
    }
}
