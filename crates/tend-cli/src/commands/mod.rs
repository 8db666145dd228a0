use anyhow::Result;
use chrono::NaiveDate;
use dialoguer::Confirm;
use tend_core::repository::Repository;
use tend_core::service::ServiceContext;
use tend_core::timezone::today_in;

use crate::cli::{Commands, DayArg};
use crate::config::Config;
use crate::parser::parse_day;

pub mod appointment;
pub mod category;
pub mod day;
pub mod goal;
pub mod habit;
pub mod section;
pub mod suggest;
pub mod task;

pub async fn dispatch<R: Repository>(command: Commands, ctx: &ServiceContext<R>, config: &Config) -> Result<()> {
    match command {
        Commands::Today(command) => day::show_today(ctx, command).await,
        Commands::Count(arg) => day::show_count(ctx, arg).await,
        Commands::Add(command) => task::add_task(ctx, command).await,
        Commands::Edit(command) => task::edit_task(ctx, command).await,
        Commands::Done(command) => task::complete_task(ctx, command).await,
        Commands::Skip(command) => task::skip_task(ctx, command).await,
        Commands::Archive(command) => task::archive_task(ctx, command).await,
        Commands::Delete(command) => task::delete_task(ctx, command).await,
        Commands::Reorder(command) => task::reorder_tasks(ctx, command).await,
        Commands::Off(command) => day::switch_off(ctx, command).await,
        Commands::On(command) => day::switch_on(ctx, command).await,
        Commands::ToggleAll(arg) => day::toggle_all(ctx, arg).await,
        Commands::Section(command) => section::section_command(ctx, command).await,
        Commands::Category(command) => category::category_command(ctx, command).await,
        Commands::Appt(command) => appointment::appointment_command(ctx, command).await,
        Commands::Habit(command) => habit::habit_command(ctx, command).await,
        Commands::Goal(command) => goal::goal_command(ctx, command).await,
        Commands::Suggest(command) => suggest::suggest_command(ctx, command, &config.functions).await,
    }
}

/// The `--date` value, or today in the configured timezone.
pub fn resolve_day<R: Repository>(ctx: &ServiceContext<R>, day: &DayArg) -> Result<NaiveDate> {
    let tz = ctx.timezone();
    match &day.date {
        Some(input) => parse_day(input, &tz),
        None => Ok(today_in(&tz)),
    }
}

/// Asks before a destructive action unless `force` is set.
pub fn confirmed(prompt: String, force: bool) -> bool {
    if force {
        return true;
    }
    let confirmation = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false);
    if !confirmation {
        println!("Deletion cancelled.");
    }
    confirmation
}
