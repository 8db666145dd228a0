use crate::changes::{ChangeKind, Table};
use crate::error::CoreError;
use crate::models::{Appointment, NewAppointmentData, UpdateAppointmentData, DEFAULT_APPOINTMENT_COLOR};
use crate::repository::{require_text, SqliteRepository};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

const APPOINTMENT_COLUMNS: &str =
    "id, user_id, title, description, date, start_time, end_time, color, task_id, revision, created_at";

fn validate_times(start_time: NaiveTime, end_time: NaiveTime) -> Result<(), CoreError> {
    if end_time <= start_time {
        return Err(CoreError::InvalidInput(
            "Appointment must end after it starts".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl super::AppointmentRepository for SqliteRepository {
    async fn add_appointment(&self, owner: Uuid, data: NewAppointmentData) -> Result<Appointment, CoreError> {
        require_text("Appointment title", &data.title)?;
        validate_times(data.start_time, data.end_time)?;

        let mut tx = self.pool().begin().await?;
        if let Some(task_id) = data.task_id {
            Self::ensure_owned(&mut tx, "tasks", owner, task_id).await?;
        }

        let color = data
            .color
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_APPOINTMENT_COLOR);

        let appointment: Appointment = sqlx::query_as(&format!(
            r#"INSERT INTO appointments (id, user_id, title, description, date, start_time, end_time, color, task_id, revision, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10)
            RETURNING {}"#,
            APPOINTMENT_COLUMNS
        ))
        .bind(Uuid::now_v7())
        .bind(owner)
        .bind(data.title.trim())
        .bind(&data.description)
        .bind(data.date)
        .bind(data.start_time)
        .bind(data.end_time)
        .bind(color)
        .bind(data.task_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.publish(Table::Appointments, owner, ChangeKind::Insert, appointment.id, appointment.revision);
        Ok(appointment)
    }

    async fn find_appointments(&self, owner: Uuid) -> Result<Vec<Appointment>, CoreError> {
        let appointments = sqlx::query_as(&format!(
            "SELECT {} FROM appointments WHERE user_id = $1 ORDER BY date, start_time",
            APPOINTMENT_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool())
        .await?;
        Ok(appointments)
    }

    async fn find_appointments_on(&self, owner: Uuid, date: NaiveDate) -> Result<Vec<Appointment>, CoreError> {
        let appointments = sqlx::query_as(&format!(
            "SELECT {} FROM appointments WHERE user_id = $1 AND date = $2 ORDER BY start_time",
            APPOINTMENT_COLUMNS
        ))
        .bind(owner)
        .bind(date)
        .fetch_all(self.pool())
        .await?;
        Ok(appointments)
    }

    async fn update_appointment(&self, owner: Uuid, id: Uuid, data: UpdateAppointmentData) -> Result<Appointment, CoreError> {
        if let Some(title) = &data.title {
            require_text("Appointment title", title)?;
        }

        let mut tx = self.pool().begin().await?;

        let mut appointment: Appointment = sqlx::query_as(&format!(
            "SELECT {} FROM appointments WHERE id = $1 AND user_id = $2",
            APPOINTMENT_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("Appointment {}", id)))?;

        if let Some(Some(task_id)) = data.task_id {
            Self::ensure_owned(&mut tx, "tasks", owner, task_id).await?;
        }

        appointment.apply_update(&data);
        validate_times(appointment.start_time, appointment.end_time)?;

        let updated: Appointment = sqlx::query_as(&format!(
            r#"UPDATE appointments
            SET title = $1, description = $2, date = $3, start_time = $4, end_time = $5, color = $6,
                task_id = $7, revision = revision + 1
            WHERE id = $8 AND user_id = $9
            RETURNING {}"#,
            APPOINTMENT_COLUMNS
        ))
        .bind(&appointment.title)
        .bind(&appointment.description)
        .bind(appointment.date)
        .bind(appointment.start_time)
        .bind(appointment.end_time)
        .bind(&appointment.color)
        .bind(appointment.task_id)
        .bind(id)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.publish(Table::Appointments, owner, ChangeKind::Update, updated.id, updated.revision);
        Ok(updated)
    }

    async fn delete_appointment(&self, owner: Uuid, id: Uuid) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Appointment {}", id)));
        }

        self.publish(Table::Appointments, owner, ChangeKind::Delete, id, 0);
        Ok(())
    }
}
