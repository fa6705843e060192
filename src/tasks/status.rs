use chrono::{DateTime, Utc};

use crate::internal_error::{InternalError, InternalResult};

use super::data::*;
use super::time::MAX_ESTIMATED_MINUTES;

pub const MISSING_ESTIMATE: &str =
    "Please set the estimated completion time (in minutes) before starting the task";
pub const ESTIMATE_TOO_LONG: &str = "Estimated time cannot exceed 24 hours (1440 minutes)";

pub fn validate_estimated_minutes(minutes: Option<u32>) -> InternalResult<u32> {
    match minutes {
        None | Some(0) => Err(InternalError::validation(MISSING_ESTIMATE)),
        Some(minutes) if minutes > MAX_ESTIMATED_MINUTES => {
            Err(InternalError::validation(ESTIMATE_TOO_LONG))
        }
        Some(minutes) => Ok(minutes),
    }
}

pub fn validate_progress(progress: u8) -> InternalResult<u8> {
    if progress > 100 {
        return Err(InternalError::validation(
            "Progress must be between 0 and 100",
        ));
    }
    Ok(progress)
}

fn ensure_not_completed(task: &Task) -> InternalResult<()> {
    if task.status == TaskStatus::Completed {
        return Err(InternalError::validation("Completed tasks cannot be changed"));
    }
    Ok(())
}

/// todo -> in-progress. The task is left untouched when the estimate is missing or too long.
pub fn start(task: &mut Task, now: DateTime<Utc>) -> InternalResult<()> {
    ensure_not_completed(task)?;
    if task.status == TaskStatus::InProgress {
        return Err(InternalError::validation("Task is already in progress"));
    }
    validate_estimated_minutes(task.estimated_minutes)?;

    task.status = TaskStatus::InProgress;
    task.start_time = Some(now);
    task.updated_at = now;
    Ok(())
}

/// in-progress -> in-progress with the countdown starting over.
pub fn restart(task: &mut Task, now: DateTime<Utc>) -> InternalResult<()> {
    if task.status != TaskStatus::InProgress {
        return Err(InternalError::validation("Only running tasks can be restarted"));
    }
    validate_estimated_minutes(task.estimated_minutes)?;

    task.start_time = Some(now);
    task.updated_at = now;
    Ok(())
}

/// in-progress -> todo, forgetting the start time.
pub fn pause(task: &mut Task, now: DateTime<Utc>) -> InternalResult<()> {
    if task.status != TaskStatus::InProgress {
        return Err(InternalError::validation("Only running tasks can be paused"));
    }

    task.status = TaskStatus::Todo;
    task.start_time = None;
    task.updated_at = now;
    Ok(())
}

/// todo or in-progress -> completed. Completed is terminal.
pub fn complete(task: &mut Task, now: DateTime<Utc>) -> InternalResult<()> {
    ensure_not_completed(task)?;

    task.status = TaskStatus::Completed;
    task.completed_at = Some(now);
    task.updated_at = now;
    Ok(())
}

/// Copies the editable fields of a set request onto the stored task.
pub fn apply_edit(task: &mut Task, request: SetTaskRequest, now: DateTime<Utc>) -> InternalResult<()> {
    if request.title.trim().is_empty() {
        return Err(InternalError::validation("Title is required"));
    }
    if request.estimated_minutes.is_some() {
        validate_estimated_minutes(request.estimated_minutes)?;
    }
    let progress = request.progress.map(validate_progress).transpose()?;

    task.title = request.title;
    task.description = request.description;
    task.priority = request.priority;
    task.due_date = request.due_date;
    task.estimated_minutes = request.estimated_minutes;
    task.progress = progress;
    if task.status == TaskStatus::Completed {
        task.completed_at = request.completed_at.or(task.completed_at);
    }
    task.updated_at = now;
    Ok(())
}
