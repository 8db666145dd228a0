//! Client for the text-completion functions (AI parsing and suggestions).

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Category, Habit, NewAppointmentData, NewGoalData, NewHabitData, NewTaskData, Section,
    TaskPriority,
};

pub const PARSE_APPOINTMENT_TEXT: &str = "parse-appointment-text";
pub const SUGGEST_TASK_DETAILS: &str = "suggest-task-details";
pub const SUGGEST_GOAL_DETAILS: &str = "suggest_goal_details";
pub const SUGGEST_NEW_HABIT: &str = "suggest-new-habit";
pub const SUGGEST_HABIT_CHALLENGE: &str = "suggest-habit-challenge";
pub const GET_HABIT_CHALLENGE_SUGGESTION: &str = "get-habit-challenge-suggestion";

#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("unauthorized")]
    Unauthorized,
    #[error("json error: {0}")]
    Serde(String),
    #[error("no completion endpoint configured")]
    MissingEndpoint,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AppointmentRequest<'a> {
    text: &'a str,
    current_date: NaiveDate,
}

/// `parse-appointment-text` response
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedAppointment {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl ParsedAppointment {
    pub fn to_new_appointment(&self) -> Result<NewAppointmentData, CompletionError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| CompletionError::Serde(format!("bad date '{}': {}", self.date, e)))?;
        let start_time = parse_clock(&self.start_time)?;
        let end_time = parse_clock(&self.end_time)?;

        Ok(NewAppointmentData {
            title: self.title.clone(),
            description: self.description.clone().filter(|d| !d.trim().is_empty()),
            date,
            start_time,
            end_time,
            color: None,
            task_id: None,
        })
    }
}

fn parse_clock(value: &str) -> Result<NaiveTime, CompletionError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| CompletionError::Serde(format!("bad time '{}': {}", value, e)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskSuggestionRequest<'a> {
    description: &'a str,
    current_date: NaiveDate,
    categories: Vec<&'a str>,
    sections: Vec<&'a str>,
}

/// `suggest-task-details` response
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskSuggestion {
    pub cleaned_description: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
    pub notes: Option<String>,
    pub remind_at: Option<String>,
    pub section: Option<String>,
    pub link: Option<String>,
}

impl TaskSuggestion {
    /// Maps the suggestion onto creation data, resolving category and section
    /// names case-insensitively. Unparseable fields are dropped so the user
    /// can fill them in by hand.
    pub fn to_new_task(&self, categories: &[Category], sections: &[Section]) -> NewTaskData {
        let category = self.category.as_deref().and_then(|name| {
            categories
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
                .map(|c| c.id)
        });
        let section_id = self.section.as_deref().and_then(|name| {
            sections
                .iter()
                .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
                .map(|s| s.id)
        });

        NewTaskData {
            description: self.cleaned_description.trim().to_string(),
            priority: self.priority.as_deref().and_then(|p| p.parse::<TaskPriority>().ok()),
            due_date: self
                .due_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
            notes: self.notes.clone().filter(|n| !n.trim().is_empty()),
            link: self.link.clone().filter(|l| !l.trim().is_empty()),
            remind_at: self
                .remind_at
                .as_deref()
                .and_then(|r| DateTime::parse_from_rfc3339(r.trim()).ok())
                .map(|r| r.with_timezone(&Utc)),
            section_id,
            category,
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct GoalRequest<'a> {
    goal: &'a str,
}

/// `suggest_goal_details` response
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoalSuggestion {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
}

impl GoalSuggestion {
    /// Falls back to the user's own wording when the reply has no title.
    pub fn to_new_goal(&self, asked: &str) -> NewGoalData {
        let title = match self.title.trim() {
            "" => asked.trim(),
            title => title,
        };
        NewGoalData {
            title: title.to_string(),
            description: self.description.clone().filter(|d| !d.trim().is_empty()),
            target_date: self
                .due_date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HabitRequest<'a> {
    existing_habits: &'a [String],
}

/// `suggest-new-habit` response
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct HabitSuggestion {
    pub name: String,
    pub description: Option<String>,
}

impl HabitSuggestion {
    pub fn to_new_habit(&self) -> NewHabitData {
        NewHabitData {
            name: self.name.trim().to_string(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HabitChallengeRequest<'a> {
    habit_name: &'a str,
    habit_description: Option<&'a str>,
    current_streak: u32,
}

/// `suggest-habit-challenge` response: a stretch goal for one habit.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HabitChallenge {
    pub title: String,
    pub description: Option<String>,
    pub duration_days: Option<u32>,
}

/// A tracked habit and its streak, as sent to `get-habit-challenge-suggestion`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitProgress {
    pub name: String,
    pub current_streak: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChallengePickRequest<'a> {
    habits: &'a [HabitProgress],
    current_date: NaiveDate,
}

/// `get-habit-challenge-suggestion` response: which habit to push on, and how.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HabitChallengeSuggestion {
    pub habit_name: String,
    pub challenge: String,
    pub reason: Option<String>,
}

impl HabitChallengeSuggestion {
    /// The user's habit the suggestion names, matched case-insensitively.
    pub fn habit<'a>(&self, habits: &'a [Habit]) -> Option<&'a Habit> {
        let wanted = self.habit_name.trim();
        habits.iter().find(|h| h.name.eq_ignore_ascii_case(wanted))
    }
}

/// Calls the hosted completion functions over HTTP. Failures are returned to
/// the caller untouched; there is no retry.
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CompletionClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, CompletionError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CompletionError::MissingEndpoint);
        }

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("tend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn function_url(&self, function: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, function)
    }

    /// Posts `body` to `function` and decodes the JSON reply.
    pub async fn invoke<B, T>(&self, function: &str, body: &B) -> Result<T, CompletionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.function_url(function)).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let text = res.text().await.map_err(map_reqwest_error)?;
                decode_json(function, &text)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CompletionError::Unauthorized),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                tracing::error!(function, status, "completion function failed");
                Err(CompletionError::Http { status, body })
            }
        }
    }

    pub async fn parse_appointment_text(
        &self,
        text: &str,
        current_date: NaiveDate,
    ) -> Result<ParsedAppointment, CompletionError> {
        self.invoke(PARSE_APPOINTMENT_TEXT, &AppointmentRequest { text, current_date })
            .await
    }

    pub async fn suggest_task_details(
        &self,
        description: &str,
        current_date: NaiveDate,
        categories: &[Category],
        sections: &[Section],
    ) -> Result<TaskSuggestion, CompletionError> {
        let request = TaskSuggestionRequest {
            description,
            current_date,
            categories: categories.iter().map(|c| c.name.as_str()).collect(),
            sections: sections.iter().map(|s| s.name.as_str()).collect(),
        };
        self.invoke(SUGGEST_TASK_DETAILS, &request).await
    }

    pub async fn suggest_goal_details(&self, goal: &str) -> Result<GoalSuggestion, CompletionError> {
        self.invoke(SUGGEST_GOAL_DETAILS, &GoalRequest { goal }).await
    }

    pub async fn suggest_new_habit(&self, existing_habits: &[String]) -> Result<HabitSuggestion, CompletionError> {
        self.invoke(SUGGEST_NEW_HABIT, &HabitRequest { existing_habits })
            .await
    }

    pub async fn suggest_habit_challenge(
        &self,
        habit: &Habit,
        current_streak: u32,
    ) -> Result<HabitChallenge, CompletionError> {
        let request = HabitChallengeRequest {
            habit_name: &habit.name,
            habit_description: habit.description.as_deref(),
            current_streak,
        };
        self.invoke(SUGGEST_HABIT_CHALLENGE, &request).await
    }

    pub async fn get_habit_challenge_suggestion(
        &self,
        habits: &[HabitProgress],
        current_date: NaiveDate,
    ) -> Result<HabitChallengeSuggestion, CompletionError> {
        self.invoke(GET_HABIT_CHALLENGE_SUGGESTION, &ChallengePickRequest { habits, current_date })
            .await
    }
}

fn map_reqwest_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Transport(e.to_string())
    }
}

fn decode_json<T: DeserializeOwned>(function: &str, text: &str) -> Result<T, CompletionError> {
    let json_str = extract_json(text);
    if json_str.is_empty() {
        tracing::error!(function, "completion function returned an empty body");
        return Err(CompletionError::Serde("empty response".to_string()));
    }

    serde_json::from_str(json_str).map_err(|e| {
        tracing::error!(
            function,
            json_error = %e,
            preview = %json_str.chars().take(200).collect::<String>(),
            "malformed completion response"
        );
        CompletionError::Serde(e.to_string())
    })
}

/// Extract JSON from a string that might contain markdown code blocks
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_extract_json_plain_and_fenced() {
        assert_eq!(extract_json(r#" {"a": 1} "#), r#"{"a": 1}"#);
        assert_eq!(extract_json("Sure:\n```json\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
        assert_eq!(extract_json("```\n{\"a\": 1}\n```"), r#"{"a": 1}"#);
    }

    #[test]
    fn test_decode_parsed_appointment() {
        let body = r#"{"title":"Dentist","description":"","date":"2024-05-02","startTime":"14:30","endTime":"15:15"}"#;
        let parsed: ParsedAppointment = decode_json(PARSE_APPOINTMENT_TEXT, body).unwrap();
        let data = parsed.to_new_appointment().unwrap();

        assert_eq!(data.title, "Dentist");
        assert!(data.description.is_none());
        assert_eq!(data.date, NaiveDate::from_ymd_opt(2024, 5, 2).unwrap());
        assert_eq!(data.start_time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
        assert_eq!(data.end_time, NaiveTime::from_hms_opt(15, 15, 0).unwrap());
    }

    #[test]
    fn test_bad_appointment_time_is_a_parse_failure() {
        let parsed = ParsedAppointment {
            title: "Call".to_string(),
            description: None,
            date: "2024-05-02".to_string(),
            start_time: "half past two".to_string(),
            end_time: "15:00".to_string(),
        };
        assert!(matches!(parsed.to_new_appointment(), Err(CompletionError::Serde(_))));
    }

    #[test]
    fn test_malformed_json_is_serde_error() {
        let result: Result<TaskSuggestion, _> = decode_json(SUGGEST_TASK_DETAILS, "I could not help with that");
        assert!(matches!(result, Err(CompletionError::Serde(_))));
        let empty: Result<TaskSuggestion, _> = decode_json(SUGGEST_TASK_DETAILS, "   ");
        assert!(matches!(empty, Err(CompletionError::Serde(_))));
    }

    #[test]
    fn test_task_suggestion_maps_names_to_ids() {
        let now = Utc::now();
        let work = Category {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            name: "Work".to_string(),
            color: "#ff0000".to_string(),
            revision: 0,
            created_at: now,
        };
        let morning = Section {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            name: "Morning".to_string(),
            order: 0,
            include_in_focus_mode: true,
            revision: 0,
            created_at: now,
        };
        let body = r#"{
            "cleanedDescription": " Send invoice ",
            "category": "work",
            "priority": "urgent",
            "dueDate": "2024-06-01",
            "notes": "",
            "remindAt": "2024-06-01T09:00:00Z",
            "section": "MORNING",
            "link": null
        }"#;
        let suggestion: TaskSuggestion = decode_json(SUGGEST_TASK_DETAILS, body).unwrap();
        let data = suggestion.to_new_task(&[work.clone()], &[morning.clone()]);

        assert_eq!(data.description, "Send invoice");
        assert_eq!(data.category, Some(work.id));
        assert_eq!(data.section_id, Some(morning.id));
        assert_eq!(data.priority, Some(TaskPriority::Urgent));
        assert_eq!(data.due_date, NaiveDate::from_ymd_opt(2024, 6, 1));
        assert!(data.notes.is_none());
        assert!(data.remind_at.is_some());
    }

    #[test]
    fn test_unknown_suggestion_fields_are_dropped() {
        let suggestion = TaskSuggestion {
            cleaned_description: "Stretch".to_string(),
            category: Some("Nope".to_string()),
            priority: Some("whenever".to_string()),
            due_date: Some("next week".to_string()),
            ..Default::default()
        };
        let data = suggestion.to_new_task(&[], &[]);
        assert!(data.category.is_none());
        assert!(data.priority.is_none());
        assert!(data.due_date.is_none());
    }

    #[test]
    fn test_goal_suggestion_to_new_goal() {
        let body = "```json\n{\"title\":\"Run a half marathon\",\"description\":\"Build up to 21km\",\"dueDate\":\"2024-10-06\"}\n```";
        let suggestion: GoalSuggestion = decode_json(SUGGEST_GOAL_DETAILS, body).unwrap();
        let data = suggestion.to_new_goal("run more");

        assert_eq!(data.title, "Run a half marathon");
        assert_eq!(data.description.as_deref(), Some("Build up to 21km"));
        assert_eq!(data.target_date, NaiveDate::from_ymd_opt(2024, 10, 6));

        let untitled = GoalSuggestion {
            due_date: Some("someday".to_string()),
            ..Default::default()
        };
        let data = untitled.to_new_goal("  run more ");
        assert_eq!(data.title, "run more");
        assert!(data.target_date.is_none());
    }

    #[test]
    fn test_decode_habit_challenge() {
        let body = r#"{"title":"Stretch before breakfast","description":"Ten minutes","durationDays":14}"#;
        let challenge: HabitChallenge = decode_json(SUGGEST_HABIT_CHALLENGE, body).unwrap();
        assert_eq!(challenge.title, "Stretch before breakfast");
        assert_eq!(challenge.duration_days, Some(14));

        let sparse: HabitChallenge = decode_json(SUGGEST_HABIT_CHALLENGE, r#"{"title":"Go longer"}"#).unwrap();
        assert!(sparse.description.is_none());
        assert!(sparse.duration_days.is_none());
    }

    #[test]
    fn test_challenge_suggestion_names_a_tracked_habit() {
        let habit = |name: &str| Habit {
            id: Uuid::now_v7(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            description: None,
            order: 0,
            revision: 0,
            created_at: Utc::now(),
        };
        let habits = vec![habit("Stretch"), habit("Read")];
        let body = r#"{"habitName":"read ","challenge":"Finish one book this month","reason":"Streak is steady"}"#;
        let suggestion: HabitChallengeSuggestion = decode_json(GET_HABIT_CHALLENGE_SUGGESTION, body).unwrap();

        assert_eq!(suggestion.habit(&habits).map(|h| h.name.as_str()), Some("Read"));
        assert_eq!(suggestion.reason.as_deref(), Some("Streak is steady"));

        let unknown = HabitChallengeSuggestion {
            habit_name: "Juggle".to_string(),
            ..Default::default()
        };
        assert!(unknown.habit(&habits).is_none());
    }

    #[test]
    fn test_habit_progress_wire_format() {
        let progress = HabitProgress {
            name: "Stretch".to_string(),
            current_streak: 4,
        };
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(json, serde_json::json!({"name": "Stretch", "currentStreak": 4}));
    }

    #[test]
    fn test_missing_endpoint() {
        assert!(matches!(CompletionClient::new("", None), Err(CompletionError::MissingEndpoint)));
    }

    #[test]
    fn test_function_url() {
        let client = CompletionClient::new("https://example.test/", None).unwrap();
        assert_eq!(
            client.function_url(SUGGEST_NEW_HABIT),
            "https://example.test/functions/v1/suggest-new-habit"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = CompletionClient::new("http://127.0.0.1:9", None).unwrap();
        let result = client.suggest_goal_details("run a marathon").await;
        assert!(matches!(result, Err(CompletionError::Transport(_)) | Err(CompletionError::Timeout)));
    }
}
