mod helpers;

use helpers::{assertions, CliTestHarness};
use predicates::prelude::*;

#[test]
fn test_today_starts_empty() {
    let harness = CliTestHarness::new();
    harness
        .run_success(&["today"])
        .stdout(assertions::nothing_due());
    harness.run_success(&["count"]).stdout("0\n");
}

#[test]
fn test_added_task_is_due_today() {
    let harness = CliTestHarness::new();
    harness.add_task(&["Water the plants", "--priority", "high"]);

    harness
        .run_success(&["today"])
        .stdout(assertions::has_task_table_headers())
        .stdout(predicate::str::contains("Water the plants"));
    harness.run_success(&["count"]).stdout("1\n");
}

#[test]
fn test_blank_description_is_rejected() {
    let harness = CliTestHarness::new();
    harness
        .run_failure(&["add", "   "])
        .stderr(predicate::str::contains("Could not add task"));
    harness.run_success(&["count"]).stdout("0\n");
}

#[test]
fn test_archived_task_leaves_today() {
    let harness = CliTestHarness::new();
    let id = harness.add_task(&["Old idea"]);

    harness.run_success(&["archive", &id]);
    harness
        .run_success(&["today"])
        .stdout(assertions::nothing_due());
}

#[test]
fn test_off_hides_task_and_on_restores_it() {
    let harness = CliTestHarness::new();
    let id = harness.add_task(&["Call the bank"]);

    harness.run_success(&["off", &id]);
    harness
        .run_success(&["today"])
        .stdout(predicate::str::contains("Call the bank").not());
    harness
        .run_success(&["today", "--all"])
        .stdout(predicate::str::contains("Call the bank"))
        .stdout(predicate::str::contains("off"));
    harness.run_success(&["count"]).stdout("0\n");

    harness.run_success(&["on", &id]);
    harness
        .run_success(&["today"])
        .stdout(predicate::str::contains("Call the bank"));
}

#[test]
fn test_toggle_all_flips_the_whole_day() {
    let harness = CliTestHarness::new();
    harness.add_task(&["First"]);
    harness.add_task(&["Second"]);

    harness
        .run_success(&["toggle-all"])
        .stdout(predicate::str::contains("switched off"));
    harness.run_success(&["count"]).stdout("0\n");

    harness
        .run_success(&["toggle-all"])
        .stdout(predicate::str::contains("switched on"));
    harness.run_success(&["count"]).stdout("2\n");
}

#[test]
fn test_focus_count_skips_excluded_sections() {
    let harness = CliTestHarness::new();
    harness.run_success(&["section", "add", "Work"]);
    harness.run_success(&["section", "add", "Someday", "--no-focus"]);
    harness.add_task(&["Write report", "--section", "work"]);
    harness.add_task(&["Learn piano", "--section", "Someday"]);
    harness.add_task(&["Buy milk"]);

    harness.run_success(&["count"]).stdout("2\n");

    harness.run_success(&["section", "focus", "Someday", "true"]);
    harness.run_success(&["count"]).stdout("3\n");
}

#[test]
fn test_deleting_section_keeps_its_tasks() {
    let harness = CliTestHarness::new();
    harness.run_success(&["section", "add", "Errands"]);
    harness.add_task(&["Post letter", "--section", "Errands"]);

    harness.run_success(&["section", "delete", "Errands", "--force"]);
    harness
        .run_success(&["section", "list"])
        .stdout(predicate::str::contains("No sections found."));
    harness
        .run_success(&["today"])
        .stdout(predicate::str::contains("Post letter"));
}

#[test]
fn test_unknown_section_is_reported() {
    let harness = CliTestHarness::new();
    harness
        .run_failure(&["add", "Task", "--section", "Nowhere"])
        .stderr(predicate::str::contains("No section named 'Nowhere'"));
}

#[test]
fn test_delete_task_with_force() {
    let harness = CliTestHarness::new();
    let id = harness.add_task(&["Temporary"]);

    harness
        .run_success(&["delete", &id, "--force"])
        .stdout(predicate::str::contains("Task deleted: Temporary"));
    harness
        .run_failure(&["done", &id])
        .stderr(predicate::str::contains("No task found with ID prefix"));
}

#[test]
fn test_short_id_must_have_two_characters() {
    let harness = CliTestHarness::new();
    harness
        .run_failure(&["done", "a"])
        .stderr(predicate::str::contains("at least 2 characters"));
}

#[test]
fn test_appointment_must_end_after_start() {
    let harness = CliTestHarness::new();
    harness
        .run_failure(&[
            "appt", "add", "Dentist", "--date", "2024-05-02", "--start", "10:00", "--end", "09:00",
        ])
        .stderr(predicate::str::contains("must end after it starts"));

    harness
        .run_success(&[
            "appt", "add", "Dentist", "--date", "2024-05-02", "--start", "09:00", "--end", "10:00",
        ])
        .stdout(predicate::str::contains("Appointment added: Dentist on 2024-05-02"));
    harness
        .run_success(&["appt", "list", "--date", "2024-05-02"])
        .stdout(predicate::str::contains("09:00-10:00"));
}

#[test]
fn test_habit_streak_is_listed() {
    let harness = CliTestHarness::new();
    harness.run_success(&["habit", "add", "Stretch"]);
    harness
        .run_success(&["habit", "log", "stretch"])
        .stdout(predicate::str::contains("streak: 1"));
    harness
        .run_success(&["habit", "log", "Stretch", "--date", "yesterday"])
        .stdout(predicate::str::contains("streak: 2"));

    harness
        .run_success(&["habit", "list"])
        .stdout(predicate::str::contains("Stretch"))
        .stdout(predicate::str::contains("2"));
}

#[test]
fn test_invalid_timezone_fails_with_hint() {
    let harness = CliTestHarness::new();
    harness
        .command()
        .env("TEND_TIMEZONE", "Berlin")
        .arg("today")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown timezone 'Berlin'"))
        .stderr(predicate::str::contains("Europe/Berlin"));
}

#[test]
fn test_suggestions_need_an_endpoint() {
    let harness = CliTestHarness::new();
    harness
        .run_failure(&["suggest", "goal", "run a marathon"])
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_goal_add_done_and_list() {
    let harness = CliTestHarness::new();
    harness
        .run_success(&["goal", "add", "Run a marathon", "--target", "2024-10-06"])
        .stdout(predicate::str::contains("Goal added: Run a marathon (by 2024-10-06)"));
    harness.run_success(&["goal", "add", "Read 20 books"]);

    harness
        .run_success(&["goal", "done", "run a marathon"])
        .stdout(predicate::str::contains("Goal reached: Run a marathon"));
    harness
        .run_success(&["goal", "list"])
        .stdout(predicate::str::contains("Read 20 books"))
        .stdout(predicate::str::contains("reached"))
        .stdout(predicate::str::contains("2024-10-06"));

    harness.run_success(&["goal", "delete", "Read 20 books", "--force"]);
    harness
        .run_failure(&["goal", "done", "Read 20 books"])
        .stderr(predicate::str::contains("No goal named 'Read 20 books'"));
}

#[test]
fn test_wildcard_id_matches_nothing() {
    let harness = CliTestHarness::new();
    harness.add_task(&["Only task"]);
    harness
        .run_failure(&["done", "__"])
        .stderr(predicate::str::contains("No task found with ID prefix"));
}
