//! Weekly, next-week, monthly and yearly views over the task list.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use std::cmp::Ordering;

use super::data::*;
use super::time::compare_start_times;

pub const QUICK_ADD_TITLE: &str = "New Task";
pub const QUICK_ADD_MINUTES: u32 = 60;

/// Six rows of seven days.
pub const MONTH_GRID_DAYS: usize = 42;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PriorityDistribution {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl PriorityDistribution {
    pub fn of<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> PriorityDistribution {
        let mut distribution = PriorityDistribution::default();
        for task in tasks {
            match task.priority {
                Priority::High => distribution.high += 1,
                Priority::Medium => distribution.medium += 1,
                Priority::Low => distribution.low += 1,
            }
        }
        distribution
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct WeeklySummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    pub total_estimated_minutes: u32,
    pub total_estimated_time: String,
    pub completion_rate: f64,
    pub priority_distribution: PriorityDistribution,
    pub overdue_tasks: Vec<Task>,
}

#[derive(Serialize, Debug, Clone)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
}

/// One cell of the month calendar. Leading and trailing cells belong to
/// the neighbouring months and have `in_month` unset.
#[derive(Serialize, Debug, Clone)]
pub struct MonthDay {
    pub date: NaiveDate,
    pub in_month: bool,
    pub tasks: Vec<Task>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct MonthStats {
    pub month: u32,
    pub total: usize,
    pub completed: usize,
    pub estimated_minutes: u32,
}

#[derive(Serialize, Debug, Clone)]
pub struct YearlyAnalytics {
    pub year: i32,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub total_estimated_minutes: u32,
    pub total_estimated_time: String,
    pub completion_rate: f64,
    pub average_minutes: f64,
    pub monthly: Vec<MonthStats>,
    pub priority_distribution: PriorityDistribution,
}

/// Monday and Sunday of the week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

pub fn week_days(today: NaiveDate) -> Vec<NaiveDate> {
    let (monday, _) = week_bounds(today);
    (0..7).map(|offset| monday + Duration::days(offset)).collect()
}

pub fn next_week_days(today: NaiveDate) -> Vec<NaiveDate> {
    week_days(today + Duration::days(7))
}

pub fn format_minutes(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn estimated_minutes<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> u32 {
    tasks
        .into_iter()
        .map(|task| task.estimated_minutes.unwrap_or(0))
        .sum()
}

fn count_status(tasks: &[&Task], status: TaskStatus) -> usize {
    tasks.iter().filter(|task| task.status == status).count()
}

pub fn weekly_summary(tasks: &[Task], today: NaiveDate) -> WeeklySummary {
    let (start, end) = week_bounds(today);
    let week: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.due_date >= start && task.due_date <= end)
        .collect();

    let completed_tasks = count_status(&week, TaskStatus::Completed);
    let total_estimated_minutes = estimated_minutes(week.iter().copied());

    WeeklySummary {
        start,
        end,
        total_tasks: week.len(),
        completed_tasks,
        in_progress_tasks: count_status(&week, TaskStatus::InProgress),
        total_estimated_minutes,
        total_estimated_time: format_minutes(total_estimated_minutes),
        completion_rate: percentage(completed_tasks, week.len()),
        priority_distribution: PriorityDistribution::of(week.iter().copied()),
        overdue_tasks: week
            .iter()
            .filter(|task| task.due_date < today && task.status != TaskStatus::Completed)
            .map(|task| (*task).clone())
            .collect(),
    }
}

/// Order inside a day column: running tasks on top, then priority, then start time.
pub fn compare_within_day(a: &Task, b: &Task) -> Ordering {
    let a_running = a.status == TaskStatus::InProgress;
    let b_running = b.status == TaskStatus::InProgress;

    b_running
        .cmp(&a_running)
        .then_with(|| b.priority.weight().cmp(&a.priority.weight()))
        .then_with(|| compare_start_times(&a.start_time, &b.start_time))
}

pub fn tasks_due_on(tasks: &[Task], date: NaiveDate) -> Vec<Task> {
    let mut due: Vec<Task> = tasks
        .iter()
        .filter(|task| task.due_date == date)
        .cloned()
        .collect();
    due.sort_by(compare_within_day);
    due
}

pub fn schedule_for(tasks: &[Task], days: Vec<NaiveDate>) -> Vec<DaySchedule> {
    days.into_iter()
        .map(|date| DaySchedule {
            date,
            tasks: tasks_due_on(tasks, date),
        })
        .collect()
}

pub fn week_schedule(tasks: &[Task], today: NaiveDate) -> Vec<DaySchedule> {
    schedule_for(tasks, week_days(today))
}

/// The calendar page for `month`: starts on the Sunday on or before the 1st
/// and always holds `MONTH_GRID_DAYS` cells. `None` for an invalid month.
pub fn month_grid(tasks: &[Task], year: i32, month: u32) -> Option<Vec<MonthDay>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let start = first - Duration::days(first.weekday().num_days_from_sunday() as i64);

    Some(
        (0..MONTH_GRID_DAYS as i64)
            .map(|offset| start + Duration::days(offset))
            .map(|date| MonthDay {
                date,
                in_month: date.year() == year && date.month() == month,
                tasks: tasks_due_on(tasks, date),
            })
            .collect(),
    )
}

pub fn yearly_analytics(tasks: &[Task], year: i32) -> YearlyAnalytics {
    let year_tasks: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.due_date.year() == year)
        .collect();

    let completed_tasks = count_status(&year_tasks, TaskStatus::Completed);
    let total_estimated_minutes = estimated_minutes(year_tasks.iter().copied());

    let monthly = (1..=12)
        .map(|month| {
            let month_tasks: Vec<&Task> = year_tasks
                .iter()
                .copied()
                .filter(|task| task.due_date.month() == month)
                .collect();
            MonthStats {
                month,
                total: month_tasks.len(),
                completed: count_status(&month_tasks, TaskStatus::Completed),
                estimated_minutes: estimated_minutes(month_tasks.iter().copied()),
            }
        })
        .collect();

    let average_minutes = if completed_tasks == 0 {
        0.0
    } else {
        total_estimated_minutes as f64 / completed_tasks as f64
    };

    YearlyAnalytics {
        year,
        total_tasks: year_tasks.len(),
        completed_tasks,
        total_estimated_minutes,
        total_estimated_time: format_minutes(total_estimated_minutes),
        completion_rate: percentage(completed_tasks, year_tasks.len()),
        average_minutes,
        monthly,
        priority_distribution: PriorityDistribution::of(year_tasks.iter().copied()),
    }
}

pub fn quick_add_draft(date: NaiveDate) -> TaskDraft {
    TaskDraft {
        title: QUICK_ADD_TITLE.to_string(),
        description: String::new(),
        priority: Priority::Medium,
        due_date: date,
        status: TaskStatus::Todo,
        estimated_minutes: Some(QUICK_ADD_MINUTES),
    }
}
