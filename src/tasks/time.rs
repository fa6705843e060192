//! Countdowns, ordering and recurring-task expansion for tasks.
//!
//! Everything in here is pure: callers pass `now` in and issue any store
//! mutations themselves.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

use std::cmp::Ordering;

use super::data::*;

pub const MAX_ESTIMATED_MINUTES: u32 = 24 * 60;

pub const ZERO_COUNTDOWN: &str = "00:00.00";

/// When a running task's estimate runs out.
pub fn countdown_end(task: &Task) -> Option<DateTime<Utc>> {
    if task.status != TaskStatus::InProgress {
        return None;
    }

    let start_time = task.start_time?;
    let minutes = task.estimated_minutes?;

    Some(start_time + Duration::minutes(minutes as i64))
}

pub fn millis_until(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (end - now).num_milliseconds().max(0)
}

/// Milliseconds left on a running task, `None` for anything that is not counting down.
pub fn remaining_millis(task: &Task, now: DateTime<Utc>) -> Option<i64> {
    countdown_end(task).map(|end| millis_until(end, now))
}

/// Remaining time as `MM:SS.CC`; the minutes field grows past two digits.
pub fn remaining_time(task: &Task, now: DateTime<Utc>) -> String {
    match remaining_millis(task, now) {
        Some(remaining) => format_countdown(remaining),
        None => ZERO_COUNTDOWN.to_string(),
    }
}

pub fn format_countdown(millis: i64) -> String {
    let millis = millis.max(0);
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) / 1000;
    let centis = (millis % 1000) / 10;

    format!("{:02}:{:02}.{:02}", minutes, seconds, centis)
}

/// Earlier starts first; tasks that never started go last.
pub fn compare_start_times(a: &Option<DateTime<Utc>>, b: &Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn in_progress_first(a: &Task, b: &Task) -> Ordering {
    let a_running = a.status == TaskStatus::InProgress;
    let b_running = b.status == TaskStatus::InProgress;
    b_running.cmp(&a_running)
}

/// Priority first, then running tasks, then earliest start.
pub fn compare_by_priority(a: &Task, b: &Task) -> Ordering {
    b.priority
        .weight()
        .cmp(&a.priority.weight())
        .then_with(|| in_progress_first(a, b))
        .then_with(|| compare_start_times(&a.start_time, &b.start_time))
}

/// Stable, so equal tasks keep their fetch order.
pub fn sort_by_priority(tasks: &mut [Task]) {
    tasks.sort_by(compare_by_priority);
}

pub fn filter_by_priority(tasks: Vec<Task>, filter: PriorityFilter) -> Vec<Task> {
    match filter {
        PriorityFilter::All => tasks,
        PriorityFilter::Only(priority) => tasks
            .into_iter()
            .filter(|task| task.priority == priority)
            .collect(),
    }
}

pub fn is_active(task: &Task) -> bool {
    task.status == TaskStatus::InProgress
        && task.start_time.is_some()
        && task.estimated_minutes.is_some()
}

pub fn active_tasks(tasks: &[Task]) -> Vec<&Task> {
    tasks.iter().filter(|task| is_active(task)).collect()
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// One todo draft per day of the month containing `anchor_date`.
pub fn expand_daily_template(
    title_base: &str,
    description: &str,
    priority: Priority,
    estimated_minutes: Option<u32>,
    anchor_date: NaiveDate,
) -> Vec<TaskDraft> {
    let year = anchor_date.year();
    let month = anchor_date.month();

    (1..=days_in_month(year, month))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .map(|due_date| TaskDraft {
            title: format!("{} (Daily)", title_base),
            description: description.to_string(),
            priority,
            due_date,
            status: TaskStatus::Todo,
            estimated_minutes,
        })
        .collect()
}
