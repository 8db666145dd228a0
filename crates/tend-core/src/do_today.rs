//! Per-day opt-out of lineages from the daily list.
//!
//! A lineage is `On` (shown) unless the off-log holds an entry for it on the
//! day, in which case it is `Off`. Entries only affect presentation.

use std::collections::HashSet;
use uuid::Uuid;

use crate::models::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoTodayState {
    #[default]
    On,
    Off,
}

impl DoTodayState {
    pub fn of(lineage_id: Uuid, off_set: &HashSet<Uuid>) -> Self {
        if off_set.contains(&lineage_id) {
            DoTodayState::Off
        } else {
            DoTodayState::On
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            DoTodayState::On => DoTodayState::Off,
            DoTodayState::Off => DoTodayState::On,
        }
    }
}

/// Batch produced by toggle-all: every entry for the day is removed, then
/// `insert` lineages are switched off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleAllPlan {
    pub target: DoTodayState,
    pub insert: Vec<Uuid>,
}

/// Plans a toggle-all over the visible non-recurring tasks.
///
/// When more than half of them are on, all of them are switched off;
/// otherwise the day's log is cleared and all of them are on.
pub fn plan_toggle_all(visible: &[Task], off_set: &HashSet<Uuid>) -> ToggleAllPlan {
    let mut lineages: Vec<Uuid> = Vec::new();
    let mut seen = HashSet::new();
    for task in visible.iter().filter(|t| !t.is_recurring()) {
        let lineage_id = task.lineage_id();
        if seen.insert(lineage_id) {
            lineages.push(lineage_id);
        }
    }

    let on_count = lineages
        .iter()
        .filter(|id| DoTodayState::of(**id, off_set) == DoTodayState::On)
        .count();

    if on_count * 2 > lineages.len() {
        ToggleAllPlan {
            target: DoTodayState::Off,
            insert: lineages,
        }
    } else {
        ToggleAllPlan {
            target: DoTodayState::On,
            insert: Vec::new(),
        }
    }
}

impl ToggleAllPlan {
    /// Off-set after the plan has been applied to the day's log.
    pub fn resulting_off_set(&self) -> HashSet<Uuid> {
        self.insert.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTaskData, RecurringType};
    use chrono::Utc;

    fn one_off() -> Task {
        Task::draft(Uuid::now_v7(), Uuid::nil(), &NewTaskData::default(), Utc::now())
    }

    #[test]
    fn test_state_toggles() {
        assert_eq!(DoTodayState::default(), DoTodayState::On);
        assert_eq!(DoTodayState::On.toggled(), DoTodayState::Off);
        assert_eq!(DoTodayState::Off.toggled(), DoTodayState::On);
    }

    #[test]
    fn test_majority_on_turns_everything_off() {
        let tasks: Vec<Task> = (0..5).map(|_| one_off()).collect();
        let off: HashSet<Uuid> = [tasks[0].id, tasks[1].id].into_iter().collect();

        let plan = plan_toggle_all(&tasks, &off);

        assert_eq!(plan.target, DoTodayState::Off);
        assert_eq!(plan.insert.len(), 5);
        assert_eq!(plan.resulting_off_set().len(), 5);
    }

    #[test]
    fn test_half_on_clears_log() {
        let tasks: Vec<Task> = (0..4).map(|_| one_off()).collect();
        let off: HashSet<Uuid> = [tasks[0].id, tasks[1].id].into_iter().collect();

        let plan = plan_toggle_all(&tasks, &off);

        assert_eq!(plan.target, DoTodayState::On);
        assert!(plan.insert.is_empty());
    }

    #[test]
    fn test_recurring_tasks_are_not_counted() {
        let mut recurring = one_off();
        recurring.recurring_type = RecurringType::Daily;
        let plain = one_off();
        let off: HashSet<Uuid> = [plain.id].into_iter().collect();

        let plan = plan_toggle_all(&[recurring, plain], &off);

        assert_eq!(plan.target, DoTodayState::On);
    }

    #[test]
    fn test_empty_list_turns_on() {
        let plan = plan_toggle_all(&[], &HashSet::new());
        assert_eq!(plan.target, DoTodayState::On);
        assert!(plan.insert.is_empty());
    }
}
