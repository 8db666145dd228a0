use anyhow::Result;
use tend_core::models::{NewAppointmentData, UpdateAppointmentData};
use tend_core::repository::Repository;
use tend_core::service::{AppointmentService, ServiceContext};

use crate::cli::{AppointmentAction, AppointmentCommand};
use crate::parser::{parse_clock, parse_day};
use crate::util::{resolve_named, resolve_task_id, Reported};
use crate::views::table::display_appointments;

pub async fn appointment_command<R: Repository>(ctx: &ServiceContext<R>, command: AppointmentCommand) -> Result<()> {
    let service = AppointmentService::new(ctx.clone());
    let tz = ctx.timezone();

    match command.action {
        AppointmentAction::Add {
            title,
            date,
            start,
            end,
            description,
            color,
            task,
        } => {
            let task_id = match task.as_deref() {
                Some(id) => Some(resolve_task_id(ctx, id).await?),
                None => None,
            };
            let data = NewAppointmentData {
                title,
                description,
                date: parse_day(&date, &tz)?,
                start_time: parse_clock(&start)?,
                end_time: parse_clock(&end)?,
                color,
                task_id,
            };
            let appointment = service.add_appointment(data).await.map_err(Reported)?;
            ctx.notifier().success(&format!(
                "Appointment added: {} on {}",
                appointment.title, appointment.date
            ));
        }
        AppointmentAction::List { date } => {
            let appointments = match date.as_deref() {
                Some(day) => service.appointments_on(parse_day(day, &tz)?).await,
                None => service.appointments().await,
            };
            display_appointments(&appointments);
        }
        AppointmentAction::Edit {
            id,
            title,
            date,
            start,
            end,
            color,
        } => {
            let appointments = service.appointments().await;
            let appointment = resolve_named(&appointments, &id, "appointment")?;
            let data = UpdateAppointmentData {
                title,
                date: date.as_deref().map(|d| parse_day(d, &tz)).transpose()?,
                start_time: start.as_deref().map(parse_clock).transpose()?,
                end_time: end.as_deref().map(parse_clock).transpose()?,
                color,
                ..Default::default()
            };
            let updated = service
                .update_appointment(appointment.id, data)
                .await
                .map_err(Reported)?;
            ctx.notifier().success(&format!("Appointment updated: {}", updated.title));
        }
        AppointmentAction::Delete { id } => {
            let appointments = service.appointments().await;
            let appointment = resolve_named(&appointments, &id, "appointment")?;
            service
                .delete_appointment(appointment.id)
                .await
                .map_err(Reported)?;
            ctx.notifier()
                .success(&format!("Appointment deleted: {}", appointment.title));
        }
    }

    Ok(())
}
