use chrono::Utc;
use uuid::Uuid;

use super::{read_through, ServiceContext};
use crate::cache::EntityCache;
use crate::error::CoreError;
use crate::models::{Goal, NewGoalData};
use crate::optimistic::OptimisticUpdate;
use crate::repository::Repository;

pub struct GoalService<R: Repository> {
    ctx: ServiceContext<R>,
}

impl<R: Repository> GoalService<R> {
    pub fn new(ctx: ServiceContext<R>) -> Self {
        Self { ctx }
    }

    /// Open goals first, then completed ones.
    pub async fn goals(&self) -> Vec<Goal> {
        let result = match self.ctx.session().require_user() {
            Ok(owner) => {
                let cache = self.ctx.caches().goals.for_owner(owner);
                read_through(&cache, || self.ctx.repo().find_goals(owner)).await
            }
            Err(err) => Err(err),
        };
        self.ctx.read_or_empty("Could not load goals", result)
    }

    pub async fn add_goal(&self, data: NewGoalData) -> Result<Goal, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().goals.for_owner(owner);
        let temp_id = Uuid::new_v4();
        let draft = Goal {
            id: temp_id,
            user_id: owner,
            title: data.title.clone(),
            description: data.description.clone(),
            target_date: data.target_date,
            completed: false,
            order: cache.len() as i64,
            revision: 0,
            created_at: Utc::now(),
        };

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not add goal")
            .run(
                move |rows| rows.push(draft),
                || self.ctx.repo().add_goal(owner, data),
                move |cache: &EntityCache<Goal>, saved: &Goal| cache.replace_id(temp_id, saved.clone()),
            )
            .await
    }

    pub async fn set_completed(&self, id: Uuid, completed: bool) -> Result<Goal, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().goals.for_owner(owner);

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not update goal")
            .pending_update(id)
            .run(
                move |rows| {
                    if let Some(goal) = rows.iter_mut().find(|g| g.id == id) {
                        goal.completed = completed;
                    }
                },
                || self.ctx.repo().set_goal_completed(owner, id, completed),
                |cache: &EntityCache<Goal>, saved: &Goal| cache.upsert(saved.clone()),
            )
            .await
    }

    pub async fn delete_goal(&self, id: Uuid) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().goals.for_owner(owner);

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not delete goal")
            .pending_delete(id)
            .run(
                move |rows| rows.retain(|g| g.id != id),
                || self.ctx.repo().delete_goal(owner, id),
                |_, _: &()| {},
            )
            .await
    }
}
