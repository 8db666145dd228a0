use chrono::NaiveDate;

use uuid::Uuid;

use super::{current_streak, read_through, ServiceContext};
use crate::completion::{
    CompletionClient, GoalSuggestion, HabitChallenge, HabitChallengeSuggestion, HabitProgress,
    ParsedAppointment,
};
use crate::error::CoreError;
use crate::models::{Habit, NewHabitData, NewTaskData};
use crate::repository::Repository;

/// Text-completion helpers. Results are drafts for the user to confirm; nothing
/// here writes to the store.
pub struct SuggestionService<R: Repository> {
    ctx: ServiceContext<R>,
    client: CompletionClient,
}

impl<R: Repository> SuggestionService<R> {
    pub fn new(ctx: ServiceContext<R>, client: CompletionClient) -> Self {
        Self { ctx, client }
    }

    /// Task draft from a free-form description, with category and section
    /// names matched against the user's own.
    pub async fn suggest_task(&self, description: &str, today: NaiveDate) -> Result<NewTaskData, CoreError> {
        let result = async {
            let owner = self.ctx.session().require_user()?;
            let categories_cache = self.ctx.caches().categories.for_owner(owner);
            let categories = read_through(&categories_cache, || self.ctx.repo().find_categories(owner)).await?;
            let sections_cache = self.ctx.caches().sections.for_owner(owner);
            let sections = read_through(&sections_cache, || self.ctx.repo().find_sections(owner)).await?;

            let suggestion = self
                .client
                .suggest_task_details(description, today, &categories, &sections)
                .await?;
            let mut draft = suggestion.to_new_task(&categories, &sections);
            if draft.description.is_empty() {
                draft.description = description.trim().to_string();
            }
            Ok::<_, CoreError>(draft)
        }
        .await;

        result.map_err(|err| self.ctx.reported("Could not get task suggestions", err))
    }

    /// Appointment extracted from text such as "lunch with Sam tomorrow 12-13".
    pub async fn parse_appointment(&self, text: &str, today: NaiveDate) -> Result<ParsedAppointment, CoreError> {
        self.client
            .parse_appointment_text(text, today)
            .await
            .map_err(|err| self.ctx.reported("Could not read that appointment", err.into()))
    }

    pub async fn suggest_goal(&self, goal: &str) -> Result<GoalSuggestion, CoreError> {
        self.client
            .suggest_goal_details(goal)
            .await
            .map_err(|err| self.ctx.reported("Could not get goal suggestions", err.into()))
    }

    /// A habit the user does not track yet.
    pub async fn suggest_habit(&self) -> Result<NewHabitData, CoreError> {
        let result = async {
            let owner = self.ctx.session().require_user()?;
            let habits_cache = self.ctx.caches().habits.for_owner(owner);
            let existing: Vec<String> = read_through(&habits_cache, || self.ctx.repo().find_habits(owner))
                .await?
                .into_iter()
                .map(|habit| habit.name)
                .collect();

            let suggestion = self.client.suggest_new_habit(&existing).await?;
            Ok::<_, CoreError>(suggestion.to_new_habit())
        }
        .await;

        result.map_err(|err| self.ctx.reported("Could not get habit suggestions", err))
    }

    async fn tracked_habits(&self, owner: Uuid) -> Result<Vec<Habit>, CoreError> {
        let habits_cache = self.ctx.caches().habits.for_owner(owner);
        read_through(&habits_cache, || self.ctx.repo().find_habits(owner)).await
    }

    /// A stretch goal for one habit, sized by its current streak.
    pub async fn suggest_habit_challenge(
        &self,
        habit_id: Uuid,
        today: NaiveDate,
    ) -> Result<(Habit, HabitChallenge), CoreError> {
        let result = async {
            let owner = self.ctx.session().require_user()?;
            let habit = self
                .tracked_habits(owner)
                .await?
                .into_iter()
                .find(|h| h.id == habit_id)
                .ok_or_else(|| CoreError::NotFound(format!("Habit {}", habit_id)))?;
            let logs = self.ctx.repo().find_habit_logs(owner, habit_id).await?;

            let challenge = self
                .client
                .suggest_habit_challenge(&habit, current_streak(&logs, today))
                .await?;
            Ok::<_, CoreError>((habit, challenge))
        }
        .await;

        result.map_err(|err| self.ctx.reported("Could not get a habit challenge", err))
    }

    /// Lets the completion service pick which tracked habit to push on.
    pub async fn pick_habit_challenge(&self, today: NaiveDate) -> Result<HabitChallengeSuggestion, CoreError> {
        let result = async {
            let owner = self.ctx.session().require_user()?;
            let habits = self.tracked_habits(owner).await?;
            if habits.is_empty() {
                return Err(CoreError::InvalidInput(
                    "Track a habit before asking for a challenge".to_string(),
                ));
            }

            let mut progress = Vec::with_capacity(habits.len());
            for habit in &habits {
                let logs = self.ctx.repo().find_habit_logs(owner, habit.id).await?;
                progress.push(HabitProgress {
                    name: habit.name.clone(),
                    current_streak: current_streak(&logs, today),
                });
            }

            let suggestion = self.client.get_habit_challenge_suggestion(&progress, today).await?;
            Ok::<_, CoreError>(suggestion)
        }
        .await;

        result.map_err(|err| self.ctx.reported("Could not get a habit challenge", err))
    }
}
