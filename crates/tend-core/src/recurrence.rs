use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::{NewTaskData, RecurringType, Section, Task, TaskStatus};
use crate::timezone::{instant_on, last_day_of_month, local_date};

/// DailyResolver: decides which task rows are presented as "due" on a given day.
///
/// Responsibilities:
/// 1. Pick at most one occurrence per recurring lineage (today's, else the newest carry-over)
/// 2. Carry unfinished one-off tasks forward until they are completed or archived
/// 3. Hide lineages the user switched off for the day
/// 4. Decide which recurring lineages need a fresh occurrence materialized for the day
///
/// Creation days are evaluated in the user's timezone.
#[derive(Debug, Clone)]
pub struct DailyResolver {
    date: NaiveDate,
    timezone: Tz,
    off_set: HashSet<Uuid>,
}

impl DailyResolver {
    pub fn new(date: NaiveDate, timezone: Tz, off_set: HashSet<Uuid>) -> Self {
        Self {
            date,
            timezone,
            off_set,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    pub fn off_set(&self) -> &HashSet<Uuid> {
        &self.off_set
    }

    #[inline]
    fn created_on(&self, task: &Task) -> NaiveDate {
        local_date(task.created_at, &self.timezone)
    }

    /// Resolves the tasks due on the resolver's date.
    ///
    /// Output keeps the input order; a recurring lineage appears at the position
    /// of its first row in the input.
    pub fn resolve(&self, tasks: &[Task]) -> Vec<Task> {
        let top_level: Vec<&Task> = tasks.iter().filter(|t| t.is_top_level()).collect();

        let mut lineages: HashMap<Uuid, Vec<&Task>> = HashMap::new();
        for task in top_level.iter().filter(|t| t.is_recurring()) {
            lineages.entry(task.lineage_id()).or_default().push(task);
        }

        let mut processed: HashSet<Uuid> = HashSet::with_capacity(lineages.len());
        let mut resolved = Vec::new();

        for task in &top_level {
            let lineage_id = task.lineage_id();

            let candidate = if task.is_recurring() {
                if !processed.insert(lineage_id) {
                    continue;
                }
                lineages
                    .get(&lineage_id)
                    .and_then(|instances| self.pick_instance(instances))
            } else if self.is_one_off_due(task) {
                Some(*task)
            } else {
                None
            };

            if let Some(chosen) = candidate {
                if self.off_set.contains(&lineage_id) {
                    continue;
                }
                resolved.push(chosen.clone());
            }
        }

        resolved
    }

    /// Number of resolved tasks that belong in focus mode: unsectioned tasks and
    /// tasks whose section has `include_in_focus_mode` set.
    pub fn count_focus(&self, tasks: &[Task], sections: &[Section]) -> usize {
        let focus_sections: HashSet<Uuid> = sections
            .iter()
            .filter(|s| s.include_in_focus_mode)
            .map(|s| s.id)
            .collect();

        self.resolve(tasks)
            .iter()
            .filter(|t| match t.section_id {
                None => true,
                Some(section_id) => focus_sections.contains(&section_id),
            })
            .count()
    }

    /// Today's occurrence if one exists and is not archived, otherwise the most
    /// recently created still-open occurrence from an earlier day.
    fn pick_instance<'t>(&self, instances: &[&'t Task]) -> Option<&'t Task> {
        let todays = instances
            .iter()
            .filter(|t| self.created_on(t) == self.date && t.status != TaskStatus::Archived)
            .max_by_key(|t| (t.created_at, t.id));

        if let Some(task) = todays {
            return Some(*task);
        }

        instances
            .iter()
            .filter(|t| self.created_on(t) < self.date && t.status == TaskStatus::ToDo)
            .max_by_key(|t| (t.created_at, t.id))
            .copied()
    }

    fn is_one_off_due(&self, task: &Task) -> bool {
        let created = self.created_on(task);
        if created == self.date {
            task.status != TaskStatus::Archived
        } else {
            created < self.date && task.status == TaskStatus::ToDo
        }
    }

    /// Occurrences that should be created for the resolver's date.
    ///
    /// A lineage gets a new occurrence when its rule falls on the date, nothing
    /// was created for it that day, no earlier occurrence is still open, and its
    /// latest occurrence is not archived. `now` becomes the creation time when it
    /// falls on the date; otherwise local noon of the date is used.
    pub fn occurrences_to_materialize(&self, tasks: &[Task], now: DateTime<Utc>) -> Vec<NewTaskData> {
        let mut lineages: HashMap<Uuid, Vec<&Task>> = HashMap::new();
        let mut order: Vec<Uuid> = Vec::new();
        for task in tasks.iter().filter(|t| t.is_top_level() && t.is_recurring()) {
            let lineage_id = task.lineage_id();
            if !lineages.contains_key(&lineage_id) {
                order.push(lineage_id);
            }
            lineages.entry(lineage_id).or_default().push(task);
        }

        let created_at = if local_date(now, &self.timezone) == self.date {
            now
        } else {
            instant_on(self.date, NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(), &self.timezone)
        };

        order
            .into_iter()
            .filter_map(|lineage_id| {
                let instances = lineages.get(&lineage_id)?;
                let latest = self.next_occurrence_template(lineage_id, instances)?;
                Some(NewTaskData {
                    description: latest.description.clone(),
                    priority: Some(latest.priority),
                    due_date: None,
                    notes: latest.notes.clone(),
                    link: latest.link.clone(),
                    remind_at: None,
                    section_id: latest.section_id,
                    category: latest.category,
                    recurring_type: Some(latest.recurring_type),
                    original_task_id: Some(lineage_id),
                    parent_task_id: None,
                    order: Some(latest.order),
                    created_at: Some(created_at),
                })
            })
            .collect()
    }

    /// The occurrence to copy from when the lineage needs a new occurrence today.
    fn next_occurrence_template<'t>(&self, lineage_id: Uuid, instances: &[&'t Task]) -> Option<&'t Task> {
        let latest = instances.iter().max_by_key(|t| (t.created_at, t.id))?;
        if latest.status == TaskStatus::Archived {
            return None;
        }

        let has_today = instances.iter().any(|t| self.created_on(t) == self.date);
        let has_open_carry_over = instances
            .iter()
            .any(|t| self.created_on(t) < self.date && t.status == TaskStatus::ToDo);
        if has_today || has_open_carry_over {
            return None;
        }

        let anchor = instances
            .iter()
            .find(|t| t.id == lineage_id)
            .or_else(|| instances.iter().min_by_key(|t| (t.created_at, t.id)))?;
        let anchor_date = self.created_on(anchor);

        if anchor_date >= self.date || !rule_matches(latest.recurring_type, anchor_date, self.date) {
            return None;
        }

        Some(*latest)
    }
}

/// Whether a lineage anchored on `anchor` recurs on `date`.
///
/// Monthly rules anchored past the end of a shorter month fall on that month's
/// last day.
pub fn rule_matches(recurring_type: RecurringType, anchor: NaiveDate, date: NaiveDate) -> bool {
    match recurring_type {
        RecurringType::None => false,
        RecurringType::Daily => true,
        RecurringType::Weekly => anchor.weekday() == date.weekday(),
        RecurringType::Monthly => anchor.day().min(last_day_of_month(date)) == date.day(),
    }
}

/// Resolves tasks due on `date`; see [`DailyResolver::resolve`].
pub fn resolve_daily_tasks(tasks: &[Task], date: NaiveDate, timezone: Tz, off_set: HashSet<Uuid>) -> Vec<Task> {
    DailyResolver::new(date, timezone, off_set).resolve(tasks)
}
