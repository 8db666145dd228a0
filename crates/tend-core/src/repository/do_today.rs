use crate::changes::{ChangeKind, Table};
use crate::do_today::ToggleAllPlan;
use crate::error::CoreError;
use crate::models::DoTodayOff;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Sqlite, Transaction};
use std::collections::HashSet;
use uuid::Uuid;

const OFF_COLUMNS: &str = "id, user_id, task_id, off_date, created_at";

#[async_trait]
impl super::DoTodayRepository for SqliteRepository {
    async fn find_off_entries(&self, owner: Uuid, date: NaiveDate) -> Result<Vec<DoTodayOff>, CoreError> {
        let entries = sqlx::query_as(&format!(
            "SELECT {} FROM do_today_off_log WHERE user_id = $1 AND off_date = $2",
            OFF_COLUMNS
        ))
        .bind(owner)
        .bind(date)
        .fetch_all(self.pool())
        .await?;
        Ok(entries)
    }

    async fn find_off_set(&self, owner: Uuid, date: NaiveDate) -> Result<HashSet<Uuid>, CoreError> {
        let entries = self.find_off_entries(owner, date).await?;
        Ok(entries.into_iter().map(|e| e.task_id).collect())
    }

    async fn add_off(&self, owner: Uuid, lineage_id: Uuid, date: NaiveDate) -> Result<DoTodayOff, CoreError> {
        let mut tx = self.pool().begin().await?;
        let entry = Self::insert_off(&mut tx, owner, lineage_id, date).await?;
        tx.commit().await?;

        self.publish(Table::DoTodayOff, owner, ChangeKind::Insert, entry.id, 0);
        Ok(entry)
    }

    async fn remove_off(&self, owner: Uuid, lineage_id: Uuid, date: NaiveDate) -> Result<(), CoreError> {
        let removed: Option<(Uuid,)> = sqlx::query_as(
            r#"DELETE FROM do_today_off_log
            WHERE user_id = $1 AND task_id = $2 AND off_date = $3
            RETURNING id"#,
        )
        .bind(owner)
        .bind(lineage_id)
        .bind(date)
        .fetch_optional(self.pool())
        .await?;

        // Already on: nothing to delete
        if let Some((id,)) = removed {
            self.publish(Table::DoTodayOff, owner, ChangeKind::Delete, id, 0);
        }
        Ok(())
    }

    async fn apply_toggle_all(&self, owner: Uuid, date: NaiveDate, plan: &ToggleAllPlan) -> Result<Vec<DoTodayOff>, CoreError> {
        let mut tx = self.pool().begin().await?;

        let cleared: Vec<(Uuid,)> = sqlx::query_as(
            "DELETE FROM do_today_off_log WHERE user_id = $1 AND off_date = $2 RETURNING id",
        )
        .bind(owner)
        .bind(date)
        .fetch_all(&mut *tx)
        .await?;

        let mut inserted = Vec::with_capacity(plan.insert.len());
        for lineage_id in &plan.insert {
            inserted.push(Self::insert_off(&mut tx, owner, *lineage_id, date).await?);
        }

        tx.commit().await?;

        tracing::debug!(cleared = cleared.len(), inserted = inserted.len(), %date, "toggle-all applied");
        for (id,) in cleared {
            self.publish(Table::DoTodayOff, owner, ChangeKind::Delete, id, 0);
        }
        for entry in &inserted {
            self.publish(Table::DoTodayOff, owner, ChangeKind::Insert, entry.id, 0);
        }
        Ok(inserted)
    }
}

impl SqliteRepository {
    async fn insert_off(
        tx: &mut Transaction<'_, Sqlite>,
        owner: Uuid,
        lineage_id: Uuid,
        date: NaiveDate,
    ) -> Result<DoTodayOff, CoreError> {
        // Switching off twice keeps the original entry
        let entry = sqlx::query_as(&format!(
            r#"INSERT INTO do_today_off_log (id, user_id, task_id, off_date, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, task_id, off_date) DO UPDATE SET off_date = excluded.off_date
            RETURNING {}"#,
            OFF_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(lineage_id)
        .bind(date)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;
        Ok(entry)
    }
}
