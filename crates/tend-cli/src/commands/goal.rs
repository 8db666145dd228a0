use anyhow::Result;
use tend_core::models::NewGoalData;
use tend_core::repository::Repository;
use tend_core::service::{GoalService, ServiceContext};

use super::confirmed;
use crate::cli::{GoalAction, GoalCommand};
use crate::parser::parse_day;
use crate::util::{resolve_named, Reported};
use crate::views::table::display_goals;

pub async fn goal_command<R: Repository>(ctx: &ServiceContext<R>, command: GoalCommand) -> Result<()> {
    let service = GoalService::new(ctx.clone());

    match command.action {
        GoalAction::Add {
            title,
            description,
            target,
        } => {
            let target_date = target
                .as_deref()
                .map(|input| parse_day(input, &ctx.timezone()))
                .transpose()?;
            let goal = service
                .add_goal(NewGoalData {
                    title,
                    description,
                    target_date,
                })
                .await
                .map_err(Reported)?;
            match goal.target_date {
                Some(date) => ctx
                    .notifier()
                    .success(&format!("Goal added: {} (by {})", goal.title, date)),
                None => ctx.notifier().success(&format!("Goal added: {}", goal.title)),
            }
        }
        GoalAction::List => display_goals(&service.goals().await),
        GoalAction::Done { name, undo } => {
            let goals = service.goals().await;
            let goal = resolve_named(&goals, &name, "goal")?;
            service.set_completed(goal.id, !undo).await.map_err(Reported)?;
            let outcome = if undo { "reopened" } else { "reached" };
            ctx.notifier().success(&format!("Goal {}: {}", outcome, goal.title));
        }
        GoalAction::Delete { name, force } => {
            let goals = service.goals().await;
            let goal = resolve_named(&goals, &name, "goal")?;
            if !confirmed(format!("Delete goal '{}'?", goal.title), force) {
                return Ok(());
            }
            service.delete_goal(goal.id).await.map_err(Reported)?;
            ctx.notifier().success(&format!("Goal deleted: {}", goal.title));
        }
    }

    Ok(())
}
