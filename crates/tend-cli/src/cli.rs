use clap::{Args, Parser, Subcommand};
use tend_core::models::{RecurringType, TaskPriority, TaskStatus};

/// Daily planner: today's tasks, recurring routines, appointments, habits and goals
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the tasks due today (or on another day)
    Today(TodayCommand),
    /// Print how many tasks are due in focus mode
    Count(DayArg),
    /// Add a new task
    Add(AddCommand),
    /// Edit a task
    Edit(EditCommand),
    /// Mark a task as completed
    Done(TaskIdArg),
    /// Skip a task for good
    Skip(TaskIdArg),
    /// Archive a task
    Archive(TaskIdArg),
    /// Delete a task and its sub-tasks
    Delete(DeleteCommand),
    /// Hide a task from a day's list
    Off(DoTodayCommand),
    /// Show a hidden task on a day's list again
    On(DoTodayCommand),
    /// Switch every non-recurring task of the day off, or all back on
    ToggleAll(DayArg),
    /// Set the order of tasks
    Reorder(ReorderCommand),
    /// Manage sections
    Section(SectionCommand),
    /// Manage categories
    Category(CategoryCommand),
    /// Manage appointments
    Appt(AppointmentCommand),
    /// Track habits
    Habit(HabitCommand),
    /// Manage longer-term goals
    Goal(GoalCommand),
    /// Ask the completion service for drafts
    Suggest(SuggestCommand),
}

#[derive(Args, Debug, Clone)]
pub struct DayArg {
    /// The day to use (defaults to today), e.g. "2024-03-10" or "tomorrow"
    #[arg(short, long)]
    pub date: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct TaskIdArg {
    /// The ID (or ID prefix) of the task
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct TodayCommand {
    #[command(flatten)]
    pub day: DayArg,
    /// Include tasks switched off for the day
    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AddCommand {
    /// What needs doing
    pub description: String,
    #[arg(short, long)]
    pub priority: Option<TaskPriority>,
    /// The due date of the task
    #[arg(long)]
    pub due: Option<String>,
    #[arg(short, long)]
    pub notes: Option<String>,
    #[arg(short, long)]
    pub link: Option<String>,
    /// When to be reminded, e.g. "tomorrow 9:00"
    #[arg(long)]
    pub remind: Option<String>,
    /// Section name
    #[arg(short, long)]
    pub section: Option<String>,
    /// Category name
    #[arg(short, long)]
    pub category: Option<String>,
    /// Repeat the task (daily, weekly, monthly)
    #[arg(long)]
    pub every: Option<RecurringType>,
    /// The parent task ID
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditCommand {
    /// The ID of the task to edit
    pub id: String,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub status: Option<TaskStatus>,

    #[arg(long)]
    pub priority: Option<TaskPriority>,

    #[arg(long)]
    pub due: Option<String>,
    #[arg(long, conflicts_with = "due")]
    pub due_clear: bool,

    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, conflicts_with = "notes")]
    pub notes_clear: bool,

    #[arg(long)]
    pub link: Option<String>,
    #[arg(long, conflicts_with = "link")]
    pub link_clear: bool,

    #[arg(long)]
    pub remind: Option<String>,
    #[arg(long, conflicts_with = "remind")]
    pub remind_clear: bool,

    #[arg(long)]
    pub section: Option<String>,
    #[arg(long, conflicts_with = "section")]
    pub section_clear: bool,

    #[arg(long)]
    pub category: Option<String>,
    #[arg(long, conflicts_with = "category")]
    pub category_clear: bool,

    #[arg(long)]
    pub every: Option<RecurringType>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteCommand {
    /// The ID of the task to delete
    pub id: String,
    /// Delete without asking
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DoTodayCommand {
    /// The ID of the task
    pub id: String,
    #[command(flatten)]
    pub day: DayArg,
}

#[derive(Args, Debug, Clone)]
pub struct ReorderCommand {
    /// Task IDs in their new order
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SectionCommand {
    #[command(subcommand)]
    pub action: SectionAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SectionAction {
    /// Create a section
    Add {
        name: String,
        /// Leave the section out of the focus count
        #[arg(long)]
        no_focus: bool,
    },
    /// List sections
    List,
    /// Rename a section
    Rename { name: String, new_name: String },
    /// Include a section in the focus count, or leave it out
    Focus {
        name: String,
        #[arg(action = clap::ArgAction::Set)]
        include: bool,
    },
    /// Delete a section; its tasks stay, unsectioned
    Delete {
        name: String,
        #[arg(short, long)]
        force: bool,
    },
    /// Set the order of sections
    Reorder {
        #[arg(required = true, num_args = 1..)]
        names: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CategoryCommand {
    #[command(subcommand)]
    pub action: CategoryAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryAction {
    /// Create a category
    Add {
        name: String,
        /// Display color, e.g. "#22c55e"
        #[arg(long, default_value = "#64748b")]
        color: String,
    },
    /// List categories
    List,
    /// Delete a category; its tasks become uncategorized
    Delete {
        name: String,
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AppointmentCommand {
    #[command(subcommand)]
    pub action: AppointmentAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AppointmentAction {
    /// Add an appointment
    Add {
        title: String,
        /// The day, e.g. "2024-03-10" or "friday"
        #[arg(short, long)]
        date: String,
        /// Start time, e.g. "09:30"
        #[arg(short, long)]
        start: String,
        /// End time, e.g. "10:15"
        #[arg(short, long)]
        end: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Link the appointment to a task
        #[arg(long)]
        task: Option<String>,
    },
    /// List appointments, optionally of one day
    List {
        #[arg(short, long)]
        date: Option<String>,
    },
    /// Change an appointment
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        date: Option<String>,
        #[arg(short, long)]
        start: Option<String>,
        #[arg(short, long)]
        end: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete an appointment
    Delete { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct HabitCommand {
    #[command(subcommand)]
    pub action: HabitAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum HabitAction {
    /// Start tracking a habit
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List habits with their current streak
    List,
    /// Record a day of a habit
    Log {
        name: String,
        #[arg(short, long)]
        date: Option<String>,
        /// Record the day as missed
        #[arg(long)]
        missed: bool,
    },
    /// Show a habit's history
    History { name: String },
    /// Stop tracking a habit
    Delete {
        name: String,
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct GoalCommand {
    #[command(subcommand)]
    pub action: GoalAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum GoalAction {
    /// Set a new goal
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// When to reach it, e.g. "2024-12-31" or "next month"
        #[arg(short, long)]
        target: Option<String>,
    },
    /// List goals, open ones first
    List,
    /// Mark a goal as reached
    Done {
        name: String,
        /// Reopen the goal instead
        #[arg(long)]
        undo: bool,
    },
    /// Drop a goal
    Delete {
        name: String,
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SuggestCommand {
    #[command(subcommand)]
    pub action: SuggestAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SuggestAction {
    /// Turn a rough description into a task
    Task {
        description: String,
        /// Save the suggestion without asking
        #[arg(long)]
        save: bool,
    },
    /// Read an appointment out of a sentence
    Appt {
        text: String,
        #[arg(long)]
        save: bool,
    },
    /// Break a goal into a concrete outcome
    Goal {
        goal: String,
        #[arg(long)]
        save: bool,
    },
    /// Propose a new habit
    Habit {
        #[arg(long)]
        save: bool,
    },
    /// Propose a challenge for a habit, or let the service pick one
    Challenge { habit: Option<String> },
}
