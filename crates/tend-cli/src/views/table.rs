use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use tend_core::do_today::DoTodayState;
use tend_core::models::{Appointment, Category, Goal, Section, TaskPriority, TaskStatus};
use uuid::Uuid;

use crate::util::short_id;

#[derive(Debug, Clone)]
pub struct ViewTask {
    pub id: Uuid,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub section_name: Option<String>,
    pub category_name: Option<String>,
    pub recurring: bool,
    pub created_at: DateTime<Utc>,
    /// Only set when switched-off tasks are listed too
    pub state: Option<DoTodayState>,
}

#[derive(Debug, Clone)]
pub struct ViewHabit {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub streak: u32,
    pub done_today: bool,
}

pub fn display_tasks(tasks: &[ViewTask], day: NaiveDate) {
    if tasks.is_empty() {
        println!("Nothing due on {}.", day);
        return;
    }

    let with_state = tasks.iter().any(|t| t.state.is_some());
    let mut header = vec!["ID", "Task", "Priority", "Due", "Section", "Category", "Added"];
    if with_state {
        header.push("Today");
    }

    let mut table = Table::new();
    table.set_header(header);

    for task in tasks {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(task.id)));

        let mut display_name = String::new();
        if task.recurring {
            display_name.push_str("↻ ");
        }
        display_name.push_str(&task.description);

        let mut name_cell = Cell::new(display_name);
        if task.state == Some(DoTodayState::Off) {
            name_cell = name_cell.fg(Color::DarkGrey).add_attribute(Attribute::Dim);
        } else {
            name_cell = match task.priority {
                TaskPriority::Urgent => name_cell.fg(Color::Red).add_attribute(Attribute::Bold),
                TaskPriority::High => name_cell.fg(Color::Red),
                TaskPriority::Medium => name_cell.fg(Color::Yellow),
                TaskPriority::Low => name_cell.fg(Color::Green),
                TaskPriority::None => name_cell,
            };
        }
        row.add_cell(name_cell);

        row.add_cell(Cell::new(task.priority.to_string()));

        let due_cell = match task.due_date {
            Some(due) if task.status == TaskStatus::ToDo && due < day => Cell::new(due).fg(Color::Red),
            Some(due) if due == day => Cell::new(due).fg(Color::Yellow),
            Some(due) => Cell::new(due),
            None => Cell::new("-"),
        };
        row.add_cell(due_cell);

        row.add_cell(Cell::new(task.section_name.as_deref().unwrap_or("-")));
        row.add_cell(Cell::new(task.category_name.as_deref().unwrap_or("-")));
        row.add_cell(Cell::new(task.created_at.humanize()));

        if with_state {
            row.add_cell(match task.state {
                Some(DoTodayState::Off) => Cell::new("off").fg(Color::DarkGrey),
                _ => Cell::new("on").fg(Color::Green),
            });
        }
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_sections(sections: &[Section]) {
    if sections.is_empty() {
        println!("No sections found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Focus"]);
    for section in sections {
        let focus = if section.include_in_focus_mode {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![Cell::new(short_id(section.id)), Cell::new(&section.name), focus]);
    }

    println!("{table}");
}

pub fn display_categories(categories: &[Category]) {
    if categories.is_empty() {
        println!("No categories found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Color"]);
    for category in categories {
        table.add_row(vec![
            Cell::new(short_id(category.id)),
            Cell::new(&category.name),
            Cell::new(&category.color),
        ]);
    }

    println!("{table}");
}

fn clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

pub fn display_appointments(appointments: &[Appointment]) {
    if appointments.is_empty() {
        println!("No appointments found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Time", "Title", "Task"]);
    for appointment in appointments {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(appointment.id)));
        row.add_cell(Cell::new(appointment.date));
        row.add_cell(Cell::new(format!(
            "{}-{}",
            clock(appointment.start_time),
            clock(appointment.end_time)
        )));
        row.add_cell(Cell::new(&appointment.title).add_attribute(Attribute::Bold));
        row.add_cell(Cell::new(appointment.task_id.map(short_id).unwrap_or_else(|| "-".to_string())));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_habits(habits: &[ViewHabit]) {
    if habits.is_empty() {
        println!("No habits tracked yet.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Habit", "Streak", "Today"]);
    for habit in habits {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(habit.id)));
        let name = match &habit.description {
            Some(description) => format!("{}\n{}", habit.name, description),
            None => habit.name.clone(),
        };
        row.add_cell(Cell::new(name));

        let streak = Cell::new(habit.streak);
        row.add_cell(if habit.streak > 0 { streak.fg(Color::Green) } else { streak });
        row.add_cell(if habit.done_today {
            Cell::new("✓").fg(Color::Green)
        } else {
            Cell::new("-")
        });
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_goals(goals: &[Goal]) {
    if goals.is_empty() {
        println!("No goals set.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Goal", "Target", "Status"]);
    for goal in goals {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(goal.id)));
        let title = match &goal.description {
            Some(description) => format!("{}\n{}", goal.title, description),
            None => goal.title.clone(),
        };
        row.add_cell(if goal.completed {
            Cell::new(title).add_attribute(Attribute::Dim)
        } else {
            Cell::new(title).add_attribute(Attribute::Bold)
        });
        row.add_cell(Cell::new(
            goal.target_date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string()),
        ));
        row.add_cell(if goal.completed {
            Cell::new("reached").fg(Color::Green)
        } else {
            Cell::new("open")
        });
        table.add_row(row);
    }

    println!("{table}");
}
