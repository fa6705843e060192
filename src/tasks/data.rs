use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::data::{sql_text_enum, ParseEnumError, UserID};

pub type TaskID = uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in-progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(ParseEnumError::new("task status", s)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

sql_text_enum!(TaskStatus);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn weight(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ParseEnumError::new("priority", s)),
        }
    }
}

sql_text_enum!(Priority);

/// Either every task, or only the tasks of one priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityFilter {
    All,
    Only(Priority),
}

impl FromStr for PriorityFilter {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(PriorityFilter::All),
            other => other
                .parse()
                .map(PriorityFilter::Only)
                .map_err(|_| ParseEnumError::new("priority filter", s)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskID,
    pub user_id: UserID,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub start_time: Option<DateTime<Utc>>,
    pub estimated_minutes: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Progress for the bar: fixed for todo and completed tasks.
    pub fn display_progress(&self) -> u8 {
        match self.status {
            TaskStatus::Completed => 100,
            TaskStatus::Todo => 0,
            TaskStatus::InProgress => match self.progress {
                Some(progress) if progress > 0 => progress.min(100),
                _ => 50,
            },
        }
    }
}

/// A task that has not been stored yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub status: TaskStatus,
    pub estimated_minutes: Option<u32>,
}

#[derive(Deserialize, Debug)]
pub struct AddTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub estimated_minutes: Option<u32>,
    /// Create one task for every day of `due_date`'s month.
    #[serde(default)]
    pub daily: bool,
}

#[derive(Serialize, Debug)]
pub struct AddTaskResult {
    pub task_ids: Vec<TaskID>,
}

#[derive(Deserialize, Debug)]
pub struct QuickAddTaskRequest {
    pub date: NaiveDate,
}

#[derive(Deserialize, Debug)]
pub struct SetTaskRequest {
    pub task_id: TaskID,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    pub due_date: NaiveDate,
    pub estimated_minutes: Option<u32>,
    pub progress: Option<u8>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
pub struct TaskIdRequest {
    pub task_id: TaskID,
}

#[derive(Serialize, Debug)]
pub struct ActiveTask {
    pub task: Task,
    pub remaining: String,
    pub remaining_ms: i64,
    pub display_progress: u8,
}

#[cfg(test)]
pub fn sample_task(priority: Priority, status: TaskStatus) -> Task {
    let epoch = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
    Task {
        id: uuid::Uuid::new_v4(),
        user_id: uuid::Uuid::nil(),
        title: format!("{} {}", priority.as_str(), status),
        description: String::new(),
        status,
        priority,
        due_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        start_time: None,
        estimated_minutes: None,
        completed_at: None,
        progress: None,
        created_at: epoch,
        updated_at: epoch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_use_the_wire_spelling() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
        assert_eq!("in-progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert!("doing".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn priority_filter_parses_all_and_single_priorities() {
        assert_eq!("all".parse::<PriorityFilter>().unwrap(), PriorityFilter::All);
        assert_eq!(
            "high".parse::<PriorityFilter>().unwrap(),
            PriorityFilter::Only(Priority::High)
        );
        assert!("urgent".parse::<PriorityFilter>().is_err());
    }

    #[test]
    fn display_progress_depends_on_status() {
        let mut task = sample_task(Priority::Low, TaskStatus::Todo);
        task.progress = Some(70);
        assert_eq!(task.display_progress(), 0);

        task.status = TaskStatus::Completed;
        assert_eq!(task.display_progress(), 100);

        task.status = TaskStatus::InProgress;
        assert_eq!(task.display_progress(), 70);

        task.progress = None;
        assert_eq!(task.display_progress(), 50);
    }
}
