//! # Tend Core Library
//!
//! The engine behind the `tend` daily planner: tasks with recurring lineages,
//! sections and categories, appointments, habits, goals, and text-completion helpers.
//!
//! ## Features
//!
//! - **Daily Resolution**: picks exactly one instance per recurring lineage for
//!   a day and carries unfinished one-off tasks forward
//! - **Do-Today Toggle**: per-day opt-out of lineages, with a majority-based
//!   toggle-all
//! - **Optimistic Updates**: local cache edits that roll back with a single
//!   notification when the store rejects the write
//! - **Realtime Changes**: a change feed with revision-based suppression of
//!   stale pushes
//! - **Timezone Awareness**: creation days are evaluated in the user's IANA zone
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`repository`]: Owner-scoped data access with the Repository pattern
//! - [`recurrence`]: Daily resolver and occurrence materialization
//! - [`do_today`]: Do-today state and toggle-all planning
//! - [`cache`] / [`optimistic`]: Keyed entity cache and optimistic mutations
//! - [`service`]: Task, section, appointment, habit, goal and suggestion services
//! - [`completion`]: Text-completion HTTP client
//! - [`error`]: Error types shared across the crate
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tend_core::{
//!     auth::Session, db, notify::TracingNotifier, repository::SqliteRepository,
//!     service::{ServiceContext, TaskService},
//! };
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tend_core::error::CoreError> {
//!     let pool = db::establish_connection("tend.db").await?;
//!     let repo = Arc::new(SqliteRepository::new(pool));
//!     let session = Arc::new(Session::signed_in(Uuid::now_v7()));
//!     let timezone = tend_core::timezone::parse_timezone("Europe/Berlin")?;
//!
//!     let ctx = ServiceContext::new(repo, session, Arc::new(TracingNotifier), timezone);
//!     let tasks = TaskService::new(ctx);
//!
//!     let today = tend_core::timezone::today_in(&timezone);
//!     for task in tasks.today(today).await {
//!         println!("{}", task.description);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cache;
pub mod changes;
pub mod completion;
pub mod db;
pub mod do_today;
pub mod error;
pub mod models;
pub mod notify;
pub mod optimistic;
pub mod recurrence;
pub mod repository;
pub mod service;
pub mod timezone;
