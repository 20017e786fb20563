use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::task::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateGroup<'a> {
    pub date: NaiveDate,
    pub tasks: Vec<&'a Task>,
}

/// Partitions by due date. Groups ascend by date; inside a group the most
/// recently created task comes first, ties keeping collection order.
pub fn group_by_due_date(tasks: &[Task]) -> Vec<DateGroup<'_>> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        by_date.entry(task.due_date).or_default().push(task);
    }

    by_date
        .into_iter()
        .map(|(date, mut tasks)| {
            tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            DateGroup { date, tasks }
        })
        .collect()
}

/// "Today" for the current date, otherwise e.g. "Saturday, Jun 1".
/// Callers pass `datetime::today()` so the label agrees with every other
/// notion of today.
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else {
        date.format("%A, %b %-d").to_string()
    }
}

/// Pending tasks due today or later, soonest first.
pub fn upcoming(tasks: &[Task], today: NaiveDate, limit: usize) -> Vec<&Task> {
    let mut out: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.is_pending() && t.due_date >= today)
        .collect();
    out.sort_by_key(|t| t.due_date);
    out.truncate(limit);
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{date_label, group_by_due_date, upcoming};
    use crate::task::{Priority, Task};

    fn task(id: &str, due: &str, created_at: i64) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task {id}"),
            completed: false,
            priority: Priority::Medium,
            created_at,
            due_date: NaiveDate::parse_from_str(due, "%Y-%m-%d").expect("valid date"),
            is_synced: false,
            completed_at: None,
        }
    }

    fn date(raw: &str) -> NaiveDate {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn groups_ascend_and_members_descend_by_creation() {
        let tasks = vec![
            task("a", "2024-06-02", 10),
            task("b", "2024-06-01", 20),
            task("c", "2024-06-01", 30),
        ];

        let groups = group_by_due_date(&tasks);
        let dates: Vec<NaiveDate> = groups.iter().map(|g| g.date).collect();
        assert_eq!(dates, vec![date("2024-06-01"), date("2024-06-02")]);

        let first: Vec<i64> = groups[0].tasks.iter().map(|t| t.created_at).collect();
        assert_eq!(first, vec![30, 20]);
        assert_eq!(groups[1].tasks.len(), 1);
    }

    #[test]
    fn empty_input_has_no_groups() {
        assert!(group_by_due_date(&[]).is_empty());
    }

    #[test]
    fn groups_span_year_boundaries_chronologically() {
        let tasks = vec![task("a", "2025-01-01", 1), task("b", "2024-12-31", 2)];
        let groups = group_by_due_date(&tasks);
        assert_eq!(groups[0].date, date("2024-12-31"));
        assert_eq!(groups[1].date, date("2025-01-01"));
    }

    #[test]
    fn labels_today_and_other_days() {
        let today = date("2024-06-01");
        assert_eq!(date_label(today, today), "Today");
        assert_eq!(date_label(date("2024-06-03"), today), "Monday, Jun 3");
        assert_eq!(date_label(date("2024-05-31"), today), "Friday, May 31");
    }

    #[test]
    fn upcoming_skips_done_and_past_tasks() {
        let mut done = task("done", "2024-06-05", 1);
        done.completed = true;
        let tasks = vec![
            task("late", "2024-05-30", 1),
            task("soon", "2024-06-02", 2),
            done,
            task("today", "2024-06-01", 3),
            task("later", "2024-06-09", 4),
        ];

        let ids: Vec<&str> = upcoming(&tasks, date("2024-06-01"), 2)
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["today", "soon"]);
    }
}
