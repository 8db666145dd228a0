use anyhow::Result;
use std::collections::HashMap;
use tend_core::do_today::DoTodayState;
use tend_core::models::Task;
use tend_core::repository::Repository;
use tend_core::service::{SectionService, ServiceContext, TaskService};
use uuid::Uuid;

use super::resolve_day;
use crate::cli::{DayArg, DoTodayCommand, TodayCommand};
use crate::util::{resolve_task_id, Reported};
use crate::views::table::{display_tasks, ViewTask};

pub async fn show_today<R: Repository>(ctx: &ServiceContext<R>, command: TodayCommand) -> Result<()> {
    let day = resolve_day(ctx, &command.day)?;
    let tasks = TaskService::new(ctx.clone());

    let rows: Vec<(Task, Option<DoTodayState>)> = if command.all {
        tasks
            .day_plan(day)
            .await
            .into_iter()
            .map(|(task, state)| (task, Some(state)))
            .collect()
    } else {
        tasks.today(day).await.into_iter().map(|task| (task, None)).collect()
    };

    let view = to_view(ctx, rows).await;
    display_tasks(&view, day);
    Ok(())
}

pub async fn show_count<R: Repository>(ctx: &ServiceContext<R>, day: DayArg) -> Result<()> {
    let day = resolve_day(ctx, &day)?;
    let count = TaskService::new(ctx.clone()).daily_count(day).await;
    println!("{}", count);
    Ok(())
}

pub async fn switch_off<R: Repository>(ctx: &ServiceContext<R>, command: DoTodayCommand) -> Result<()> {
    set_state(ctx, command, DoTodayState::Off).await
}

pub async fn switch_on<R: Repository>(ctx: &ServiceContext<R>, command: DoTodayCommand) -> Result<()> {
    set_state(ctx, command, DoTodayState::On).await
}

async fn set_state<R: Repository>(ctx: &ServiceContext<R>, command: DoTodayCommand, target: DoTodayState) -> Result<()> {
    let day = resolve_day(ctx, &command.day)?;
    let task_id = resolve_task_id(ctx, &command.id).await?;
    TaskService::new(ctx.clone())
        .set_do_today(task_id, day, target)
        .await
        .map_err(Reported)?;

    let message = match target {
        DoTodayState::Off => format!("Task hidden from {}", day),
        DoTodayState::On => format!("Task back on {}", day),
    };
    ctx.notifier().success(&message);
    Ok(())
}

pub async fn toggle_all<R: Repository>(ctx: &ServiceContext<R>, day: DayArg) -> Result<()> {
    let day = resolve_day(ctx, &day)?;
    let state = TaskService::new(ctx.clone())
        .toggle_all_do_today(day)
        .await
        .map_err(Reported)?;

    let message = match state {
        DoTodayState::Off => format!("All one-off tasks switched off for {}", day),
        DoTodayState::On => format!("All one-off tasks switched on for {}", day),
    };
    ctx.notifier().success(&message);
    Ok(())
}

async fn to_view<R: Repository>(ctx: &ServiceContext<R>, rows: Vec<(Task, Option<DoTodayState>)>) -> Vec<ViewTask> {
    let sections = SectionService::new(ctx.clone());
    let section_names: HashMap<Uuid, String> = sections.sections().await.into_iter().map(|s| (s.id, s.name)).collect();
    let category_names: HashMap<Uuid, String> =
        sections.categories().await.into_iter().map(|c| (c.id, c.name)).collect();

    rows.into_iter()
        .map(|(task, state)| ViewTask {
            id: task.id,
            recurring: task.is_recurring(),
            section_name: task.section_id.and_then(|id| section_names.get(&id).cloned()),
            category_name: task.category.and_then(|id| category_names.get(&id).cloned()),
            description: task.description,
            status: task.status,
            priority: task.priority,
            due_date: task.due_date,
            created_at: task.created_at,
            state,
        })
        .collect()
}
