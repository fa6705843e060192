use chrono::{DateTime, Datelike, Local, Utc};
use rocket::response::stream::{Event, EventStream};
use rocket::serde::json::Json;
use rocket::tokio::select;
use rocket::{get, post, Shutdown, State};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::data::DBConnection;
use crate::internal_error::{InternalError, InternalResult};
use crate::session::UserId;

use super::countdown::Countdown;
use super::data::*;
use super::events::{ChangeKind, TaskChange, TaskEvents};
use super::schedule::*;
use super::status;
use super::time::*;
use super::util::*;

fn today() -> chrono::NaiveDate {
    Local::now().date_naive()
}

#[get("/get_tasks?<priority>")]
pub fn get_tasks(
    priority: Option<&str>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<Task>>> {
    let filter = match priority {
        Some(priority) => priority
            .parse::<PriorityFilter>()
            .map_err(|e| InternalError::validation(e.to_string()))?,
        None => PriorityFilter::All,
    };

    let db_connection = db_connection.lock()?;
    let mut tasks = filter_by_priority(get_tasks_from_db(user.0, &db_connection)?, filter);
    sort_by_priority(&mut tasks);

    debug!(user_id = %user.0, count = tasks.len(), "Loaded tasks");
    Ok(Json(tasks))
}

#[get("/get_active_tasks")]
pub fn get_active_tasks(
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<ActiveTask>>> {
    let db_connection = db_connection.lock()?;
    let tasks = get_tasks_from_db(user.0, &db_connection)?;
    let now = Utc::now();

    let active = active_tasks(&tasks)
        .into_iter()
        .map(|task| ActiveTask {
            remaining: remaining_time(task, now),
            remaining_ms: remaining_millis(task, now).unwrap_or(0),
            display_progress: task.display_progress(),
            task: task.clone(),
        })
        .collect();

    Ok(Json(active))
}

#[get("/get_weekly_summary")]
pub fn get_weekly_summary(
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<WeeklySummary>> {
    let db_connection = db_connection.lock()?;
    let tasks = get_tasks_from_db(user.0, &db_connection)?;

    Ok(Json(weekly_summary(&tasks, today())))
}

#[get("/get_week_schedule")]
pub fn get_week_schedule(
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<DaySchedule>>> {
    let db_connection = db_connection.lock()?;
    let tasks = get_tasks_from_db(user.0, &db_connection)?;

    Ok(Json(week_schedule(&tasks, today())))
}

#[get("/get_next_week_schedule")]
pub fn get_next_week_schedule(
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<DaySchedule>>> {
    let db_connection = db_connection.lock()?;
    let tasks = get_tasks_from_db(user.0, &db_connection)?;

    Ok(Json(schedule_for(&tasks, next_week_days(today()))))
}

#[get("/get_month_schedule?<year>&<month>")]
pub fn get_month_schedule(
    year: Option<i32>,
    month: Option<u32>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<MonthDay>>> {
    let today = today();
    let year = year.unwrap_or_else(|| today.year());
    let month = month.unwrap_or_else(|| today.month());

    let db_connection = db_connection.lock()?;
    let tasks = get_tasks_from_db(user.0, &db_connection)?;

    month_grid(&tasks, year, month)
        .map(Json)
        .ok_or_else(|| InternalError::validation("Month must be between 1 and 12"))
}

#[get("/get_yearly_analytics?<year>")]
pub fn get_yearly_analytics(
    year: Option<i32>,
    user: UserId,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<YearlyAnalytics>> {
    let db_connection = db_connection.lock()?;
    let tasks = get_tasks_from_db(user.0, &db_connection)?;

    let year = year.unwrap_or_else(|| today().year());
    Ok(Json(yearly_analytics(&tasks, year)))
}

#[post("/add_task", format = "json", data = "<add_task_request>")]
pub fn add_task(
    add_task_request: Json<AddTaskRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<Json<AddTaskResult>> {
    let request = add_task_request.into_inner();
    if request.title.trim().is_empty() {
        return Err(InternalError::validation("Title is required"));
    }
    if request.estimated_minutes.is_some() {
        status::validate_estimated_minutes(request.estimated_minutes)?;
    }

    let drafts = if request.daily {
        expand_daily_template(
            &request.title,
            &request.description,
            request.priority,
            request.estimated_minutes,
            request.due_date,
        )
    } else {
        vec![TaskDraft {
            title: request.title,
            description: request.description,
            priority: request.priority,
            due_date: request.due_date,
            status: TaskStatus::Todo,
            estimated_minutes: request.estimated_minutes,
        }]
    };

    let db_connection = db_connection.lock()?;
    let tasks = add_tasks_to_db(drafts, user.0, Utc::now(), &db_connection)?;

    info!(user_id = %user.0, count = tasks.len(), daily = request.daily, "Added tasks");
    for task in &tasks {
        events.publish(TaskChange::new(user.0, task.id, ChangeKind::Insert));
    }

    Ok(Json(AddTaskResult {
        task_ids: tasks.into_iter().map(|task| task.id).collect(),
    }))
}

#[post("/quick_add_task", format = "json", data = "<quick_add_task_request>")]
pub fn quick_add_task(
    quick_add_task_request: Json<QuickAddTaskRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<Json<Task>> {
    let db_connection = db_connection.lock()?;
    let draft = quick_add_draft(quick_add_task_request.date);
    let task = add_task_to_db(draft, user.0, Utc::now(), &db_connection)?;

    info!(user_id = %user.0, task_id = %task.id, due_date = %task.due_date, "Quick-added task");
    events.publish(TaskChange::new(user.0, task.id, ChangeKind::Insert));

    Ok(Json(task))
}

#[post("/set_task", format = "json", data = "<set_task_request>")]
pub fn set_task(
    set_task_request: Json<SetTaskRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<Json<Task>> {
    let db_connection = db_connection.lock()?;
    let request = set_task_request.into_inner();

    let mut task = get_task_from_db(request.task_id, user.0, &db_connection)?;
    status::apply_edit(&mut task, request, Utc::now())?;
    update_task_in_db(&task, &db_connection)?;

    info!(user_id = %user.0, task_id = %task.id, "Updated task");
    events.publish(TaskChange::new(user.0, task.id, ChangeKind::Update));

    Ok(Json(task))
}

type Transition = fn(&mut Task, DateTime<Utc>) -> InternalResult<()>;

fn transition_task(
    task_id: TaskID,
    user: UserId,
    name: &str,
    transition: Transition,
    db_connection: &DBConnection,
    events: &TaskEvents,
) -> InternalResult<Json<Task>> {
    let db_connection = db_connection.lock()?;
    let mut task = get_task_from_db(task_id, user.0, &db_connection)?;

    if let Err(e) = transition(&mut task, Utc::now()) {
        warn!(user_id = %user.0, task_id = %task_id, status = %task.status, "Cannot {} task: {}", name, e);
        return Err(e);
    }
    update_task_in_db(&task, &db_connection)?;

    info!(user_id = %user.0, task_id = %task_id, status = %task.status, "Task {}", name);
    events.publish(TaskChange::new(user.0, task_id, ChangeKind::Update));

    Ok(Json(task))
}

#[post("/start_task", format = "json", data = "<task_id_request>")]
pub fn start_task(
    task_id_request: Json<TaskIdRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<Json<Task>> {
    transition_task(task_id_request.task_id, user, "start", status::start, db_connection, events)
}

#[post("/pause_task", format = "json", data = "<task_id_request>")]
pub fn pause_task(
    task_id_request: Json<TaskIdRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<Json<Task>> {
    transition_task(task_id_request.task_id, user, "pause", status::pause, db_connection, events)
}

#[post("/restart_task", format = "json", data = "<task_id_request>")]
pub fn restart_task(
    task_id_request: Json<TaskIdRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<Json<Task>> {
    transition_task(task_id_request.task_id, user, "restart", status::restart, db_connection, events)
}

#[post("/complete_task", format = "json", data = "<task_id_request>")]
pub fn complete_task(
    task_id_request: Json<TaskIdRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<Json<Task>> {
    transition_task(task_id_request.task_id, user, "complete", status::complete, db_connection, events)
}

#[post("/delete_task", format = "json", data = "<task_id_request>")]
pub fn delete_task(
    task_id_request: Json<TaskIdRequest>,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
) -> InternalResult<()> {
    let db_connection = db_connection.lock()?;
    let task_id = task_id_request.task_id;
    delete_task_from_db(task_id, user.0, &db_connection)?;

    info!(user_id = %user.0, task_id = %task_id, "Deleted task");
    events.publish(TaskChange::new(user.0, task_id, ChangeKind::Delete));

    Ok(())
}

#[get("/task_events")]
pub fn task_events(user: UserId, events: &State<TaskEvents>, mut end: Shutdown) -> EventStream![] {
    let mut changes = events.subscribe(user.0);

    EventStream! {
        loop {
            let change = select! {
                change = changes.recv() => match change {
                    Some(change) => change,
                    None => break,
                },
                _ = &mut end => break,
            };

            yield Event::json(&change).event(change_name(change.kind));
        }
    }
}

fn change_name(kind: ChangeKind) -> &'static str {
    match kind {
        ChangeKind::Insert => "insert",
        ChangeKind::Update => "update",
        ChangeKind::Delete => "delete",
        ChangeKind::Resync => "resync",
    }
}

/// Streams `tick` events until the countdown finishes, the task changes
/// (a final `changed` event) or the server shuts down.
#[get("/task_countdown/<task_id>")]
pub fn task_countdown(
    task_id: uuid::Uuid,
    user: UserId,
    db_connection: &State<DBConnection>,
    events: &State<TaskEvents>,
    config: &State<AppConfig>,
    mut end: Shutdown,
) -> InternalResult<EventStream![]> {
    // Subscribe before reading so a transition committed in between is still seen.
    let mut changes = events.subscribe(user.0);
    let task = {
        let db_connection = db_connection.lock()?;
        get_task_from_db(task_id, user.0, &db_connection)?
    };
    if !is_active(&task) {
        return Err(InternalError::validation("Task is not running"));
    }

    let period = config.countdown_period();
    debug!(user_id = %user.0, task_id = %task_id, "Countdown subscribed");

    Ok(EventStream! {
        if let Some(mut countdown) = Countdown::for_task(&task, period) {
            yield Event::json(&countdown.current()).event("tick");

            loop {
                let (event, last) = select! {
                    tick = countdown.next() => match tick {
                        Some(tick) => (Event::json(&tick).event("tick"), tick.is_finished()),
                        None => break,
                    },
                    change = changes.recv() => match change {
                        Some(change) if change.affects(task_id) => {
                            (Event::json(&change).event("changed"), true)
                        }
                        Some(_) => continue,
                        None => break,
                    },
                    _ = &mut end => break,
                };

                yield event;
                if last {
                    break;
                }
            }
        }
    })
}
