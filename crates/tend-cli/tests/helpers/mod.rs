use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Fixed account so runs against the same database see the same rows
pub const TEST_USER_ID: &str = "018f4a2c-7b1e-7c3d-9a5f-2b6c8d0e1f23";

/// Runs the `tend` binary against a temporary database
pub struct CliTestHarness {
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self {
            _temp_dir: temp_dir,
            db_path,
        }
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("tend").expect("Failed to find tend binary");
        cmd.env("TEND_DATABASE_PATH", &self.db_path)
            .env("TEND_USER_ID", TEST_USER_ID)
            .env("TEND_TIMEZONE", "UTC")
            .env_remove("TEND_FUNCTIONS__BASE_URL")
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    pub fn stdout_of(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        String::from_utf8(output).expect("stdout is not UTF-8")
    }

    /// Adds a task and returns the short ID printed in the confirmation.
    pub fn add_task(&self, args: &[&str]) -> String {
        let mut full = vec!["add"];
        full.extend_from_slice(args);
        let stdout = self.stdout_of(&full);
        extract_short_id(&stdout).expect("No task ID in add output")
    }
}

/// The ID in a line like "Task added: Buy milk (0190a1b)".
pub fn extract_short_id(output: &str) -> Option<String> {
    let line = output.lines().find(|line| line.contains("Task added:"))?;
    let start = line.rfind('(')? + 1;
    let end = line.rfind(')')?;
    Some(line[start..end].to_string())
}

pub mod assertions {
    use predicates::prelude::*;

    pub fn has_task_table_headers() -> impl Predicate<str> {
        predicate::str::contains("ID")
            .and(predicate::str::contains("Task"))
            .and(predicate::str::contains("Priority"))
    }

    pub fn nothing_due() -> impl Predicate<str> {
        predicate::str::contains("Nothing due on")
    }
}
