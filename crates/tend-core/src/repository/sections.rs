use crate::changes::{ChangeKind, Table};
use crate::error::CoreError;
use crate::models::{NewSectionData, Section, UpdateSectionData};
use crate::repository::{require_text, SqliteRepository};
use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

const SECTION_COLUMNS: &str = r#"id, user_id, name, "order", include_in_focus_mode, revision, created_at"#;

#[async_trait]
impl super::SectionRepository for SqliteRepository {
    async fn add_section(&self, owner: Uuid, data: NewSectionData) -> Result<Section, CoreError> {
        require_text("Section name", &data.name)?;

        let order = match data.order {
            Some(order) => order,
            None => {
                let (next,): (i64,) = sqlx::query_as(
                    r#"SELECT COALESCE(MAX("order") + 1, 0) FROM sections WHERE user_id = $1"#,
                )
                .bind(owner)
                .fetch_one(self.pool())
                .await?;
                next
            }
        };

        let section: Section = sqlx::query_as(&format!(
            r#"INSERT INTO sections (id, user_id, name, "order", include_in_focus_mode, revision, created_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING {}"#,
            SECTION_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(data.name.trim())
        .bind(order)
        .bind(data.include_in_focus_mode.unwrap_or(true))
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        self.publish(Table::Sections, owner, ChangeKind::Insert, section.id, section.revision);
        Ok(section)
    }

    async fn find_sections(&self, owner: Uuid) -> Result<Vec<Section>, CoreError> {
        let sections = sqlx::query_as(&format!(
            r#"SELECT {} FROM sections WHERE user_id = $1 ORDER BY "order", created_at"#,
            SECTION_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(sections)
    }

    async fn update_section(&self, owner: Uuid, id: Uuid, data: UpdateSectionData) -> Result<Section, CoreError> {
        if let Some(name) = &data.name {
            require_text("Section name", name)?;
        }

        let section: Section = sqlx::query_as(&format!(
            r#"UPDATE sections
            SET name = COALESCE($1, name),
                include_in_focus_mode = COALESCE($2, include_in_focus_mode),
                "order" = COALESCE($3, "order"),
                revision = revision + 1
            WHERE id = $4 AND user_id = $5
            RETURNING {}"#,
            SECTION_COLUMNS
        ))
        .bind(data.name.as_deref().map(str::trim))
        .bind(data.include_in_focus_mode)
        .bind(data.order)
        .bind(id)
        .bind(owner)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Section {}", id)))?;

        self.publish(Table::Sections, owner, ChangeKind::Update, section.id, section.revision);
        Ok(section)
    }

    async fn delete_section(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let orphaned: Vec<(Uuid, i64)> = sqlx::query_as(
            r#"UPDATE tasks SET section_id = NULL, updated_at = $1, revision = revision + 1
            WHERE section_id = $2 AND user_id = $3
            RETURNING id, revision"#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(owner)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM sections WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Section {}", id)));
        }

        tx.commit().await?;

        for (task_id, revision) in orphaned {
            self.publish(Table::Tasks, owner, ChangeKind::Update, task_id, revision);
        }
        self.publish(Table::Sections, owner, ChangeKind::Delete, id, 0);
        Ok(())
    }

    async fn reorder_sections(&self, owner: Uuid, ordered_ids: &[Uuid]) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut revisions = Vec::with_capacity(ordered_ids.len());

        for (position, id) in ordered_ids.iter().enumerate() {
            let revision: Option<(i64,)> = sqlx::query_as(
                r#"UPDATE sections SET "order" = $1, revision = revision + 1
                WHERE id = $2 AND user_id = $3
                RETURNING revision"#,
            )
            .bind(position as i64)
            .bind(*id)
            .bind(owner)
            .fetch_optional(&mut *tx)
            .await?;

            let (revision,) = revision.ok_or_else(|| CoreError::NotFound(format!("Section {}", id)))?;
            revisions.push((*id, revision));
        }

        tx.commit().await?;

        for (id, revision) in revisions {
            self.publish(Table::Sections, owner, ChangeKind::Update, id, revision);
        }
        Ok(())
    }
}
