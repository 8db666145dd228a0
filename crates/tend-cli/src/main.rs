use clap::Parser;
use owo_colors::{OwoColorize, Style};
use std::sync::Arc;
use tend_core::auth::Session;
use tend_core::db;
use tend_core::error::CoreError;
use tend_core::repository::SqliteRepository;
use tend_core::service::ServiceContext;
use tend_core::timezone::parse_timezone;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use util::Reported;
use views::notifier::ConsoleNotifier;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    // Silent unless RUST_LOG asks for output; logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = cli::Cli::parse();

    if let Err(e) = run(cli).await {
        handle_error(e);
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let config = config::Config::new()?;
    let timezone = parse_timezone(&config.timezone)?;
    let user_id = config.resolve_user_id()?;
    tracing::debug!(database = %config.database_path, %timezone, %user_id, "starting");

    let pool = db::establish_connection(&config.database_path).await?;
    let repository = Arc::new(SqliteRepository::new(pool));
    let ctx = ServiceContext::new(
        repository,
        Arc::new(Session::signed_in(user_id)),
        Arc::new(ConsoleNotifier),
        timezone,
    );

    commands::dispatch(cli.command, &ctx, &config).await
}

fn handle_error(err: anyhow::Error) {
    // Already shown by the notifier
    if err.downcast_ref::<Reported>().is_some() {
        return;
    }

    let error_style = Style::new().red().bold();
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::NotFound(s)) => {
            eprintln!("{} {}", "Error:".style(error_style), s);
        }
        Some(CoreError::AmbiguousId(tasks)) => {
            eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
            eprintln!("Did you mean one of these?");
            for (id, name) in tasks {
                eprintln!("  {} ({})", id.yellow(), name);
            }
        }
        Some(CoreError::InvalidInput(s)) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        Some(CoreError::InvalidTimezone(tz)) => {
            eprintln!("{} Unknown timezone '{}'", "Error:".style(error_style), tz);
            let suggestions = config::suggest_timezones(tz);
            if !suggestions.is_empty() {
                eprintln!("Did you mean one of these?");
                for name in suggestions {
                    eprintln!("  {}", name.yellow());
                }
            }
        }
        Some(core_error) => eprintln!("{} {}", "Error:".style(error_style), core_error.user_message()),
        None => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
