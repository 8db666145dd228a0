use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::{read_through, ServiceContext};
use crate::cache::EntityCache;
use crate::completion::ParsedAppointment;
use crate::error::CoreError;
use crate::models::{Appointment, NewAppointmentData, UpdateAppointmentData, DEFAULT_APPOINTMENT_COLOR};
use crate::optimistic::OptimisticUpdate;
use crate::repository::Repository;

pub struct AppointmentService<R: Repository> {
    ctx: ServiceContext<R>,
}

impl<R: Repository> AppointmentService<R> {
    pub fn new(ctx: ServiceContext<R>) -> Self {
        Self { ctx }
    }

    /// All appointments, ordered by date and start time.
    pub async fn appointments(&self) -> Vec<Appointment> {
        let result = match self.ctx.session().require_user() {
            Ok(owner) => {
                let cache = self.ctx.caches().appointments.for_owner(owner);
                read_through(&cache, || self.ctx.repo().find_appointments(owner)).await
            }
            Err(err) => Err(err),
        };
        self.ctx.read_or_empty("Could not load appointments", result)
    }

    pub async fn appointments_on(&self, date: NaiveDate) -> Vec<Appointment> {
        self.appointments()
            .await
            .into_iter()
            .filter(|appointment| appointment.date == date)
            .collect()
    }

    pub async fn add_appointment(&self, data: NewAppointmentData) -> Result<Appointment, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().appointments.for_owner(owner);
        let temp_id = Uuid::new_v4();
        let draft = Appointment {
            id: temp_id,
            user_id: owner,
            title: data.title.clone(),
            description: data.description.clone(),
            date: data.date,
            start_time: data.start_time,
            end_time: data.end_time,
            color: data.color.clone().unwrap_or_else(|| DEFAULT_APPOINTMENT_COLOR.to_string()),
            task_id: data.task_id,
            revision: 0,
            created_at: Utc::now(),
        };

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not add appointment")
            .run(
                move |rows| {
                    rows.push(draft);
                    rows.sort_by_key(|a| (a.date, a.start_time));
                },
                || self.ctx.repo().add_appointment(owner, data),
                move |cache: &EntityCache<Appointment>, saved: &Appointment| cache.replace_id(temp_id, saved.clone()),
            )
            .await
    }

    /// Saves an appointment the completion service extracted from free text.
    pub async fn save_parsed_appointment(&self, parsed: &ParsedAppointment) -> Result<Appointment, CoreError> {
        let data = parsed
            .to_new_appointment()
            .map_err(|err| self.ctx.reported("Could not add appointment", err.into()))?;
        self.add_appointment(data).await
    }

    pub async fn update_appointment(&self, id: Uuid, data: UpdateAppointmentData) -> Result<Appointment, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().appointments.for_owner(owner);
        let local = data.clone();

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not update appointment")
            .pending_update(id)
            .run(
                move |rows| {
                    if let Some(appointment) = rows.iter_mut().find(|a| a.id == id) {
                        appointment.apply_update(&local);
                    }
                },
                || self.ctx.repo().update_appointment(owner, id, data),
                |cache: &EntityCache<Appointment>, saved: &Appointment| cache.upsert(saved.clone()),
            )
            .await
    }

    pub async fn delete_appointment(&self, id: Uuid) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().appointments.for_owner(owner);

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not delete appointment")
            .pending_delete(id)
            .run(
                move |rows| rows.retain(|a| a.id != id),
                || self.ctx.repo().delete_appointment(owner, id),
                |_, _: &()| {},
            )
            .await
    }
}
