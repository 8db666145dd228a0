use thiserror::Error;

use crate::completion::CompletionError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous ID: matches {} tasks", .0.len())]
    AmbiguousId(Vec<(String, String)>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("You must be signed in to do that.")]
    Unauthenticated,

    #[error("Text completion failed: {0}")]
    Completion(#[from] CompletionError),
}

impl CoreError {
    /// Short message suitable for a transient user notification.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Database(_) | CoreError::Migration(_) | CoreError::Io(_) => {
                "Could not reach the data store. Your change was not saved.".to_string()
            }
            CoreError::Completion(CompletionError::Serde(_)) => {
                "Could not understand the suggestion response.".to_string()
            }
            other => other.to_string(),
        }
    }
}
