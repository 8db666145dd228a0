use chrono::{NaiveDate, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use super::{read_through, ServiceContext};
use crate::cache::EntityCache;
use crate::error::CoreError;
use crate::models::{Habit, HabitLog, NewHabitData};
use crate::optimistic::OptimisticUpdate;
use crate::repository::Repository;

/// Consecutive completed days ending today, or yesterday when today has not
/// been logged yet.
pub fn current_streak(logs: &[HabitLog], today: NaiveDate) -> u32 {
    let done: HashSet<NaiveDate> = logs.iter().filter(|l| l.completed).map(|l| l.log_date).collect();

    let mut day = if done.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if done.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while done.contains(&day) {
        streak += 1;
        day = match day.pred_opt() {
            Some(previous) => previous,
            None => break,
        };
    }
    streak
}

pub struct HabitService<R: Repository> {
    ctx: ServiceContext<R>,
}

impl<R: Repository> HabitService<R> {
    pub fn new(ctx: ServiceContext<R>) -> Self {
        Self { ctx }
    }

    pub async fn habits(&self) -> Vec<Habit> {
        let result = match self.ctx.session().require_user() {
            Ok(owner) => {
                let cache = self.ctx.caches().habits.for_owner(owner);
                read_through(&cache, || self.ctx.repo().find_habits(owner)).await
            }
            Err(err) => Err(err),
        };
        self.ctx.read_or_empty("Could not load habits", result)
    }

    /// Logs of one habit, oldest first. The log cache holds one habit at a time.
    pub async fn logs(&self, habit_id: Uuid) -> Vec<HabitLog> {
        let result = match self.ctx.session().require_user() {
            Ok(owner) => {
                let cache = self.ctx.caches().habit_logs.for_owner(owner);
                if cache.snapshot().iter().any(|log| log.habit_id != habit_id) {
                    cache.invalidate();
                }
                read_through(&cache, || self.ctx.repo().find_habit_logs(owner, habit_id)).await
            }
            Err(err) => Err(err),
        };
        self.ctx.read_or_empty("Could not load habit history", result)
    }

    pub async fn streak(&self, habit_id: Uuid, today: NaiveDate) -> u32 {
        current_streak(&self.logs(habit_id).await, today)
    }

    pub async fn add_habit(&self, data: NewHabitData) -> Result<Habit, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().habits.for_owner(owner);
        let temp_id = Uuid::new_v4();
        let draft = Habit {
            id: temp_id,
            user_id: owner,
            name: data.name.clone(),
            description: data.description.clone(),
            order: cache.len() as i64,
            revision: 0,
            created_at: Utc::now(),
        };

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not add habit")
            .run(
                move |rows| rows.push(draft),
                || self.ctx.repo().add_habit(owner, data),
                move |cache: &EntityCache<Habit>, saved: &Habit| cache.replace_id(temp_id, saved.clone()),
            )
            .await
    }

    pub async fn delete_habit(&self, id: Uuid) -> Result<(), CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().habits.for_owner(owner);
        let logs = self.ctx.caches().habit_logs.for_owner(owner);

        let result = OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not delete habit")
            .pending_delete(id)
            .run(
                move |rows| rows.retain(|h| h.id != id),
                || self.ctx.repo().delete_habit(owner, id),
                |_, _: &()| {},
            )
            .await;

        logs.invalidate();
        result
    }

    /// Records whether the habit was done on `date`, replacing an earlier entry.
    pub async fn log_habit(&self, habit_id: Uuid, date: NaiveDate, completed: bool) -> Result<HabitLog, CoreError> {
        let owner = self.ctx.owner()?;
        let cache = self.ctx.caches().habit_logs.for_owner(owner);
        let draft = HabitLog {
            id: Uuid::new_v4(),
            user_id: owner,
            habit_id,
            log_date: date,
            completed,
            created_at: Utc::now(),
        };

        OptimisticUpdate::new(&cache, self.ctx.notifier())
            .failure_message("Could not log habit")
            .run(
                move |rows| match rows.iter_mut().find(|l| l.habit_id == habit_id && l.log_date == date) {
                    Some(existing) => existing.completed = completed,
                    None => rows.push(draft),
                },
                || self.ctx.repo().log_habit(owner, habit_id, date, completed),
                move |cache: &EntityCache<HabitLog>, saved: &HabitLog| {
                    cache.mutate(|rows| {
                        rows.retain(|l| !(l.habit_id == habit_id && l.log_date == date));
                        rows.push(saved.clone());
                        rows.sort_by_key(|l| l.log_date);
                    });
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn log(date: &str, completed: bool) -> HabitLog {
        HabitLog {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            habit_id: Uuid::nil(),
            log_date: date.parse().unwrap(),
            completed,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case::ends_today(vec![log("2024-03-08", true), log("2024-03-09", true), log("2024-03-10", true)], 3)]
    #[case::ends_yesterday(vec![log("2024-03-08", true), log("2024-03-09", true)], 2)]
    #[case::broken_by_gap(vec![log("2024-03-07", true), log("2024-03-09", true), log("2024-03-10", true)], 2)]
    #[case::broken_by_miss(vec![log("2024-03-08", true), log("2024-03-09", false), log("2024-03-10", true)], 1)]
    #[case::lapsed(vec![log("2024-03-07", true), log("2024-03-08", true)], 0)]
    #[case::empty(vec![], 0)]
    fn test_current_streak(#[case] logs: Vec<HabitLog>, #[case] expected: u32) {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(current_streak(&logs, today), expected);
    }

    #[test]
    fn test_unlogged_today_keeps_yesterdays_streak() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let logs = vec![log("2024-03-09", true), log("2024-03-10", false)];
        assert_eq!(current_streak(&logs, today), 1);
    }
}
