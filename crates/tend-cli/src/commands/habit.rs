use anyhow::Result;
use owo_colors::OwoColorize;
use tend_core::models::NewHabitData;
use tend_core::repository::Repository;
use tend_core::service::{current_streak, HabitService, ServiceContext};
use tend_core::timezone::today_in;

use super::confirmed;
use crate::cli::{HabitAction, HabitCommand};
use crate::parser::parse_day;
use crate::util::{resolve_named, Reported};
use crate::views::table::{display_habits, ViewHabit};

pub async fn habit_command<R: Repository>(ctx: &ServiceContext<R>, command: HabitCommand) -> Result<()> {
    let service = HabitService::new(ctx.clone());
    let tz = ctx.timezone();
    let today = today_in(&tz);

    match command.action {
        HabitAction::Add { name, description } => {
            let habit = service
                .add_habit(NewHabitData { name, description })
                .await
                .map_err(Reported)?;
            ctx.notifier().success(&format!("Habit added: {}", habit.name));
        }
        HabitAction::List => {
            let mut view = Vec::new();
            for habit in service.habits().await {
                let logs = service.logs(habit.id).await;
                view.push(ViewHabit {
                    id: habit.id,
                    streak: current_streak(&logs, today),
                    done_today: logs.iter().any(|l| l.log_date == today && l.completed),
                    name: habit.name,
                    description: habit.description,
                });
            }
            display_habits(&view);
        }
        HabitAction::Log { name, date, missed } => {
            let habits = service.habits().await;
            let habit = resolve_named(&habits, &name, "habit")?;
            let day = match date.as_deref() {
                Some(input) => parse_day(input, &tz)?,
                None => today,
            };
            service
                .log_habit(habit.id, day, !missed)
                .await
                .map_err(Reported)?;

            let streak = service.streak(habit.id, today).await;
            let outcome = if missed { "missed" } else { "done" };
            ctx.notifier().success(&format!(
                "{} {} on {} (streak: {})",
                habit.name, outcome, day, streak
            ));
        }
        HabitAction::History { name } => {
            let habits = service.habits().await;
            let habit = resolve_named(&habits, &name, "habit")?;
            let logs = service.logs(habit.id).await;
            if logs.is_empty() {
                println!("No entries for {} yet.", habit.name);
            }
            for log in logs {
                if log.completed {
                    println!("{}  {}", log.log_date, "done".green());
                } else {
                    println!("{}  {}", log.log_date, "missed".dimmed());
                }
            }
        }
        HabitAction::Delete { name, force } => {
            let habits = service.habits().await;
            let habit = resolve_named(&habits, &name, "habit")?;
            if !confirmed(
                format!("Stop tracking '{}' and drop its history?", habit.name),
                force,
            ) {
                return Ok(());
            }
            service.delete_habit(habit.id).await.map_err(Reported)?;
            ctx.notifier().success(&format!("Habit deleted: {}", habit.name));
        }
    }

    Ok(())
}
