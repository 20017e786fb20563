use chrono::{Duration, NaiveDate};

use crate::datetime::millis_to_project_date;
use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    /// Whole percent, rounded half up; 0 for an empty collection.
    pub percent: u8,
}

impl Progress {
    pub fn pending(&self) -> usize {
        self.total - self.completed
    }
}

pub fn compute_progress(tasks: &[Task]) -> Progress {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    Progress {
        completed,
        total,
        percent: percent_half_up(completed, total),
    }
}

fn percent_half_up(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    // round(100 * part / whole) without floats: (200p + w) / 2w
    let rounded = (200 * part + whole) / (2 * whole);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCount {
    pub date: NaiveDate,
    pub completed: usize,
}

/// Completions per day for the seven days ending at `today`, oldest first.
pub fn weekly_completions(tasks: &[Task], today: NaiveDate) -> Vec<DayCount> {
    let mut days: Vec<DayCount> = (0..7)
        .rev()
        .filter_map(|back| today.checked_sub_signed(Duration::days(back)))
        .map(|date| DayCount { date, completed: 0 })
        .collect();

    for task in tasks.iter().filter(|t| t.completed) {
        let Some(done_on) = task.completed_at.and_then(millis_to_project_date) else {
            continue;
        };
        if let Some(day) = days.iter_mut().find(|d| d.date == done_on) {
            day.completed += 1;
        }
    }

    days
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{Progress, compute_progress, weekly_completions};
    use crate::datetime::to_project_date;
    use crate::task::{Priority, Task};

    fn tasks(total: usize, completed: usize) -> Vec<Task> {
        (0..total)
            .map(|n| Task {
                id: format!("t{n}"),
                text: format!("task {n}"),
                completed: n < completed,
                priority: Priority::Medium,
                created_at: n as i64,
                due_date: NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date"),
                is_synced: false,
                completed_at: None,
            })
            .collect()
    }

    #[test]
    fn empty_collection_is_zero_percent() {
        assert_eq!(
            compute_progress(&[]),
            Progress {
                completed: 0,
                total: 0,
                percent: 0
            }
        );
    }

    #[test]
    fn pins_rounding() {
        let cases = [(3, 1, 33), (3, 2, 67), (8, 1, 13), (2, 1, 50), (4, 4, 100), (7, 0, 0), (200, 1, 1)];
        for (total, completed, percent) in cases {
            let progress = compute_progress(&tasks(total, completed));
            assert_eq!(progress.completed, completed);
            assert_eq!(progress.total, total);
            assert_eq!(progress.percent, percent, "{completed}/{total}");
        }
    }

    #[test]
    fn pending_is_the_remainder() {
        assert_eq!(compute_progress(&tasks(5, 2)).pending(), 3);
    }

    #[test]
    fn weekly_history_counts_completion_days() {
        let noon = |d: u32| Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).single().expect("valid");
        let today = to_project_date(noon(8));

        let mut list = tasks(5, 4);
        list[0].completed_at = Some(noon(8).timestamp_millis());
        list[1].completed_at = Some(noon(8).timestamp_millis());
        list[2].completed_at = Some(noon(3).timestamp_millis());
        // Outside the window.
        list[3].completed_at = Some(noon(1).timestamp_millis());
        // Pending tasks never count, even with a stale timestamp.
        list[4].completed_at = Some(noon(8).timestamp_millis());

        let week = weekly_completions(&list, today);
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, to_project_date(noon(2)));
        assert_eq!(week[6].date, today);
        assert_eq!(week[6].completed, 2);
        let total: usize = week.iter().map(|d| d.completed).sum();
        assert_eq!(total, 3);
    }
}
