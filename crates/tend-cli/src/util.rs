use anyhow::{anyhow, Result};
use tend_core::error::CoreError;
use tend_core::models::{Appointment, Category, Goal, Habit, Section};
use tend_core::repository::Repository;
use tend_core::service::ServiceContext;
use thiserror::Error;
use uuid::Uuid;

/// A service failure the notifier has already shown to the user.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Reported(#[from] pub CoreError);

pub async fn resolve_task_id<R: Repository>(ctx: &ServiceContext<R>, short_id: &str) -> Result<Uuid> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let owner = ctx.session().require_user()?;
    let tasks = ctx.repo().find_tasks_by_short_id_prefix(owner, short_id).await?;
    if tasks.len() == 1 {
        Ok(tasks[0].id)
    } else if tasks.is_empty() {
        Err(anyhow!(CoreError::NotFound(format!(
            "No task found with ID prefix '{}'",
            short_id
        ))))
    } else {
        let task_info: Vec<(String, String)> = tasks
            .into_iter()
            .map(|t| (t.id.to_string(), t.description))
            .collect();
        Err(anyhow!(CoreError::AmbiguousId(task_info)))
    }
}

/// Things the CLI lets the user pick by name.
pub trait Named {
    fn id(&self) -> Uuid;
    fn name(&self) -> &str;
}

impl Named for Section {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Category {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Habit {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for Goal {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.title
    }
}

impl Named for Appointment {
    fn id(&self) -> Uuid {
        self.id
    }
    fn name(&self) -> &str {
        &self.title
    }
}

/// Finds the item whose name matches case-insensitively, or whose ID starts
/// with `query`.
pub fn resolve_named<'a, T: Named>(items: &'a [T], query: &str, kind: &str) -> Result<&'a T> {
    let wanted = query.trim().to_lowercase();
    if let Some(item) = items.iter().find(|item| item.name().to_lowercase() == wanted) {
        return Ok(item);
    }

    let by_prefix: Vec<&T> = if wanted.len() >= 2 {
        items
            .iter()
            .filter(|item| item.id().to_string().starts_with(&wanted))
            .collect()
    } else {
        Vec::new()
    };

    match by_prefix.as_slice() {
        [item] => Ok(*item),
        [] => Err(anyhow!(CoreError::NotFound(format!("No {} named '{}'", kind, query)))),
        many => Err(anyhow!(CoreError::AmbiguousId(
            many.iter()
                .map(|item| (item.id().to_string(), item.name().to_string()))
                .collect()
        ))),
    }
}

pub fn short_id(id: Uuid) -> String {
    id.to_string()[..7].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn section(name: &str) -> Section {
        Section {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            order: 0,
            include_in_focus_mode: true,
            revision: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_named_by_name_ignores_case() {
        let sections = vec![section("Work"), section("Home")];
        let found = resolve_named(&sections, "home", "section").unwrap();
        assert_eq!(found.name, "Home");
    }

    #[test]
    fn test_resolve_named_by_id_prefix() {
        let sections = vec![section("Work")];
        let prefix = sections[0].id.to_string()[..8].to_string();
        assert_eq!(resolve_named(&sections, &prefix, "section").unwrap().name, "Work");
    }

    #[test]
    fn test_resolve_named_missing() {
        let sections = vec![section("Work")];
        let err = resolve_named(&sections, "Garden", "section").unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::NotFound(_))));
    }
}
