use anyhow::{anyhow, Result};
use tend_core::error::CoreError;
use tend_core::models::{NewTaskData, TaskStatus, UpdateTaskData};
use tend_core::repository::Repository;
use tend_core::service::{SectionService, ServiceContext, TaskService};
use uuid::Uuid;

use super::confirmed;
use crate::cli::{AddCommand, DeleteCommand, EditCommand, ReorderCommand, TaskIdArg};
use crate::parser::{parse_day, parse_instant};
use crate::util::{resolve_named, resolve_task_id, short_id, Reported};

async fn section_id<R: Repository>(ctx: &ServiceContext<R>, name: &str) -> Result<Uuid> {
    let sections = SectionService::new(ctx.clone()).sections().await;
    Ok(resolve_named(&sections, name, "section")?.id)
}

async fn category_id<R: Repository>(ctx: &ServiceContext<R>, name: &str) -> Result<Uuid> {
    let categories = SectionService::new(ctx.clone()).categories().await;
    Ok(resolve_named(&categories, name, "category")?.id)
}

pub async fn add_task<R: Repository>(ctx: &ServiceContext<R>, command: AddCommand) -> Result<()> {
    let tz = ctx.timezone();

    let due_date = command.due.as_deref().map(|d| parse_day(d, &tz)).transpose()?;
    let remind_at = command.remind.as_deref().map(|r| parse_instant(r, &tz)).transpose()?;
    let section_id = match command.section.as_deref() {
        Some(name) => Some(section_id(ctx, name).await?),
        None => None,
    };
    let category = match command.category.as_deref() {
        Some(name) => Some(category_id(ctx, name).await?),
        None => None,
    };
    let parent_task_id = match command.parent.as_deref() {
        Some(parent) => Some(resolve_task_id(ctx, parent).await?),
        None => None,
    };

    let data = NewTaskData {
        description: command.description,
        priority: command.priority,
        due_date,
        notes: command.notes,
        link: command.link,
        remind_at,
        section_id,
        category,
        recurring_type: command.every,
        parent_task_id,
        ..Default::default()
    };

    let task = TaskService::new(ctx.clone()).add_task(data).await.map_err(Reported)?;
    ctx.notifier()
        .success(&format!("Task added: {} ({})", task.description, short_id(task.id)));
    Ok(())
}

pub async fn edit_task<R: Repository>(ctx: &ServiceContext<R>, command: EditCommand) -> Result<()> {
    let tz = ctx.timezone();
    let task_id = resolve_task_id(ctx, &command.id).await?;

    let mut data = UpdateTaskData {
        description: command.description,
        status: command.status,
        priority: command.priority,
        recurring_type: command.every,
        ..Default::default()
    };

    if let Some(due) = command.due.as_deref() {
        data.due_date = Some(Some(parse_day(due, &tz)?));
    } else if command.due_clear {
        data.due_date = Some(None);
    }

    if let Some(notes) = command.notes {
        data.notes = Some(Some(notes));
    } else if command.notes_clear {
        data.notes = Some(None);
    }

    if let Some(link) = command.link {
        data.link = Some(Some(link));
    } else if command.link_clear {
        data.link = Some(None);
    }

    if let Some(remind) = command.remind.as_deref() {
        data.remind_at = Some(Some(parse_instant(remind, &tz)?));
    } else if command.remind_clear {
        data.remind_at = Some(None);
    }

    if let Some(name) = command.section.as_deref() {
        data.section_id = Some(Some(section_id(ctx, name).await?));
    } else if command.section_clear {
        data.section_id = Some(None);
    }

    if let Some(name) = command.category.as_deref() {
        data.category = Some(Some(category_id(ctx, name).await?));
    } else if command.category_clear {
        data.category = Some(None);
    }

    let task = TaskService::new(ctx.clone())
        .update_task(task_id, data)
        .await
        .map_err(Reported)?;
    ctx.notifier().success(&format!("Task updated: {}", task.description));
    Ok(())
}

async fn set_status<R: Repository>(ctx: &ServiceContext<R>, command: TaskIdArg, status: TaskStatus) -> Result<()> {
    let task_id = resolve_task_id(ctx, &command.id).await?;
    let task = TaskService::new(ctx.clone())
        .set_status(task_id, status)
        .await
        .map_err(Reported)?;
    ctx.notifier()
        .success(&format!("Task {}: {}", status, task.description));
    Ok(())
}

pub async fn complete_task<R: Repository>(ctx: &ServiceContext<R>, command: TaskIdArg) -> Result<()> {
    set_status(ctx, command, TaskStatus::Completed).await
}

pub async fn skip_task<R: Repository>(ctx: &ServiceContext<R>, command: TaskIdArg) -> Result<()> {
    set_status(ctx, command, TaskStatus::Skipped).await
}

pub async fn archive_task<R: Repository>(ctx: &ServiceContext<R>, command: TaskIdArg) -> Result<()> {
    set_status(ctx, command, TaskStatus::Archived).await
}

pub async fn delete_task<R: Repository>(ctx: &ServiceContext<R>, command: DeleteCommand) -> Result<()> {
    let task_id = resolve_task_id(ctx, &command.id).await?;
    let owner = ctx.session().require_user()?;
    let task = ctx
        .repo()
        .find_task_by_id(owner, task_id)
        .await?
        .ok_or_else(|| anyhow!(CoreError::NotFound(format!("Task with ID '{}' not found.", task_id))))?;

    if !confirmed(
        format!("Are you sure you want to delete task '{}'?", task.description),
        command.force,
    ) {
        return Ok(());
    }

    TaskService::new(ctx.clone())
        .delete_task(task_id)
        .await
        .map_err(Reported)?;
    ctx.notifier().success(&format!("Task deleted: {}", task.description));
    Ok(())
}

pub async fn reorder_tasks<R: Repository>(ctx: &ServiceContext<R>, command: ReorderCommand) -> Result<()> {
    let mut ordered = Vec::with_capacity(command.ids.len());
    for id in &command.ids {
        ordered.push(resolve_task_id(ctx, id).await?);
    }

    TaskService::new(ctx.clone())
        .reorder_tasks(&ordered)
        .await
        .map_err(Reported)?;
    ctx.notifier().success("Tasks reordered");
    Ok(())
}
