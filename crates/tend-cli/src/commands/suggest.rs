use anyhow::Result;
use dialoguer::Confirm;
use owo_colors::OwoColorize;
use tend_core::completion::CompletionClient;
use tend_core::error::CoreError;
use tend_core::repository::Repository;
use tend_core::service::{
    AppointmentService, GoalService, HabitService, ServiceContext, SuggestionService, TaskService,
};
use tend_core::timezone::today_in;

use crate::cli::{SuggestAction, SuggestCommand};
use crate::config::FunctionsConfig;
use crate::util::{resolve_named, Reported};

fn accept(prompt: &str, save: bool) -> bool {
    save || Confirm::new()
        .with_prompt(prompt)
        .default(true)
        .interact()
        .unwrap_or(false)
}

fn field(label: &str, value: Option<impl std::fmt::Display>) {
    if let Some(value) = value {
        println!("  {:<10} {}", format!("{}:", label).dimmed(), value);
    }
}

pub async fn suggest_command<R: Repository>(
    ctx: &ServiceContext<R>,
    command: SuggestCommand,
    functions: &FunctionsConfig,
) -> Result<()> {
    let client = CompletionClient::new(
        functions.base_url.clone().unwrap_or_default(),
        functions.api_key.clone(),
    )
    .map_err(CoreError::from)?;
    let suggestions = SuggestionService::new(ctx.clone(), client);
    let today = today_in(&ctx.timezone());

    match command.action {
        SuggestAction::Task { description, save } => {
            let draft = suggestions
                .suggest_task(&description, today)
                .await
                .map_err(Reported)?;

            println!("{}", draft.description.bold());
            field("priority", draft.priority);
            field("due", draft.due_date);
            field("notes", draft.notes.as_deref());
            field("repeats", draft.recurring_type);

            if accept("Add this task?", save) {
                let task = TaskService::new(ctx.clone())
                    .add_task(draft)
                    .await
                    .map_err(Reported)?;
                ctx.notifier().success(&format!("Task added: {}", task.description));
            }
        }
        SuggestAction::Appt { text, save } => {
            let parsed = suggestions
                .parse_appointment(&text, today)
                .await
                .map_err(Reported)?;

            println!("{}", parsed.title.bold());
            println!("  {} {}-{}", parsed.date, parsed.start_time, parsed.end_time);
            field("notes", parsed.description.as_deref());

            if accept("Add this appointment?", save) {
                let appointment = AppointmentService::new(ctx.clone())
                    .save_parsed_appointment(&parsed)
                    .await
                    .map_err(Reported)?;
                ctx.notifier()
                    .success(&format!("Appointment added: {}", appointment.title));
            }
        }
        SuggestAction::Goal { goal, save } => {
            let suggestion = suggestions.suggest_goal(&goal).await.map_err(Reported)?;
            let draft = suggestion.to_new_goal(&goal);
            println!("{}", draft.title.bold());
            field("details", draft.description.as_deref());
            field("target", draft.target_date);

            if accept("Set this goal?", save) {
                let saved = GoalService::new(ctx.clone())
                    .add_goal(draft)
                    .await
                    .map_err(Reported)?;
                ctx.notifier().success(&format!("Goal added: {}", saved.title));
            }
        }
        SuggestAction::Habit { save } => {
            let draft = suggestions.suggest_habit().await.map_err(Reported)?;
            println!("{}", draft.name.bold());
            field("why", draft.description.as_deref());

            if accept("Track this habit?", save) {
                let habit = HabitService::new(ctx.clone())
                    .add_habit(draft)
                    .await
                    .map_err(Reported)?;
                ctx.notifier().success(&format!("Habit added: {}", habit.name));
            }
        }
        SuggestAction::Challenge { habit: Some(name) } => {
            let habits = HabitService::new(ctx.clone()).habits().await;
            let habit = resolve_named(&habits, &name, "habit")?;
            let (habit, challenge) = suggestions
                .suggest_habit_challenge(habit.id, today)
                .await
                .map_err(Reported)?;

            println!("{} {}", format!("{}:", habit.name).dimmed(), challenge.title.bold());
            field("details", challenge.description.as_deref());
            field("days", challenge.duration_days);
        }
        SuggestAction::Challenge { habit: None } => {
            let suggestion = suggestions
                .pick_habit_challenge(today)
                .await
                .map_err(Reported)?;

            println!("{} {}", format!("{}:", suggestion.habit_name).dimmed(), suggestion.challenge.bold());
            field("why", suggestion.reason.as_deref());
        }
    }

    Ok(())
}
