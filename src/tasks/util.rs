use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::data::UserID;
use crate::internal_error::{InternalError, InternalResult};

use super::data::*;

const TASK_COLUMNS: &str = "id, user_id, title, description, status, priority, due_date, \
     start_time, estimated_minutes, completed_at, progress, created_at, updated_at";

pub fn get_task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        priority: row.get("priority")?,
        due_date: row.get("due_date")?,
        start_time: row.get("start_time")?,
        estimated_minutes: row.get("estimated_minutes")?,
        completed_at: row.get("completed_at")?,
        progress: row.get("progress")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// All of a user's tasks, earliest due date first.
pub fn get_tasks_from_db(user_id: UserID, db_connection: &Connection) -> InternalResult<Vec<Task>> {
    let mut statement = db_connection.prepare(&format!(
        "SELECT {} FROM tasks WHERE user_id = (?1) ORDER BY due_date ASC, rowid ASC",
        TASK_COLUMNS
    ))?;

    let tasks = statement
        .query_map(params![user_id], |row| get_task_from_row(row))?
        .collect::<rusqlite::Result<Vec<Task>>>()?;

    Ok(tasks)
}

pub fn get_task_from_db(
    task_id: TaskID,
    user_id: UserID,
    db_connection: &Connection,
) -> InternalResult<Task> {
    db_connection
        .query_row(
            &format!(
                "SELECT {} FROM tasks WHERE id = (?1) AND user_id = (?2)",
                TASK_COLUMNS
            ),
            params![task_id, user_id],
            |row| get_task_from_row(row),
        )
        .optional()?
        .ok_or_else(|| InternalError::not_found("Task"))
}

fn insert_task(
    draft: TaskDraft,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<Task> {
    let task = Task {
        id: uuid::Uuid::new_v4(),
        user_id,
        title: draft.title,
        description: draft.description,
        status: draft.status,
        priority: draft.priority,
        due_date: draft.due_date,
        start_time: None,
        estimated_minutes: draft.estimated_minutes,
        completed_at: None,
        progress: None,
        created_at: now,
        updated_at: now,
    };

    db_connection.execute(
        &format!(
            "INSERT INTO tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            TASK_COLUMNS
        ),
        params![
            task.id,
            task.user_id,
            task.title,
            task.description,
            task.status,
            task.priority,
            task.due_date,
            task.start_time,
            task.estimated_minutes,
            task.completed_at,
            task.progress,
            task.created_at,
            task.updated_at,
        ],
    )?;

    Ok(task)
}

pub fn add_task_to_db(
    draft: TaskDraft,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<Task> {
    insert_task(draft, user_id, now, db_connection)
}

/// Inserts every draft or none of them.
pub fn add_tasks_to_db(
    drafts: Vec<TaskDraft>,
    user_id: UserID,
    now: DateTime<Utc>,
    db_connection: &Connection,
) -> InternalResult<Vec<Task>> {
    let transaction = db_connection.unchecked_transaction()?;

    let mut tasks = Vec::with_capacity(drafts.len());
    for draft in drafts {
        tasks.push(insert_task(draft, user_id, now, &transaction)?);
    }

    transaction.commit()?;
    Ok(tasks)
}

/// Writes every mutable column back; the last writer wins.
pub fn update_task_in_db(task: &Task, db_connection: &Connection) -> InternalResult<()> {
    let updated = db_connection.execute(
        "UPDATE tasks SET title = (?1), description = (?2), status = (?3), priority = (?4),
            due_date = (?5), start_time = (?6), estimated_minutes = (?7), completed_at = (?8),
            progress = (?9), updated_at = (?10)
         WHERE id = (?11) AND user_id = (?12)",
        params![
            task.title,
            task.description,
            task.status,
            task.priority,
            task.due_date,
            task.start_time,
            task.estimated_minutes,
            task.completed_at,
            task.progress,
            task.updated_at,
            task.id,
            task.user_id,
        ],
    )?;

    if updated == 0 {
        return Err(InternalError::not_found("Task"));
    }
    Ok(())
}

pub fn delete_task_from_db(
    task_id: TaskID,
    user_id: UserID,
    db_connection: &Connection,
) -> InternalResult<()> {
    let deleted = db_connection.execute(
        "DELETE FROM tasks WHERE id = (?1) AND user_id = (?2)",
        params![task_id, user_id],
    )?;

    if deleted == 0 {
        return Err(InternalError::not_found("Task"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_connection;
    use crate::tasks::time::expand_daily_template;
    use chrono::{NaiveDate, TimeZone};

    fn draft(title: &str, due_date: NaiveDate) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            description: "details".to_string(),
            priority: Priority::High,
            due_date,
            status: TaskStatus::Todo,
            estimated_minutes: Some(45),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn tasks_round_trip_through_the_store() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();

        let added = add_task_to_db(draft("Plan trip", date(2024, 4, 3)), user, now(), &connection)
            .unwrap();
        let loaded = get_task_from_db(added.id, user, &connection).unwrap();
        assert_eq!(loaded, added);
    }

    #[test]
    fn tasks_come_back_in_due_date_order() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();

        add_task_to_db(draft("later", date(2024, 4, 20)), user, now(), &connection).unwrap();
        add_task_to_db(draft("sooner", date(2024, 4, 2)), user, now(), &connection).unwrap();

        let titles: Vec<String> = get_tasks_from_db(user, &connection)
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["sooner", "later"]);
    }

    #[test]
    fn other_users_cannot_see_or_touch_a_task() {
        let connection = test_connection();
        let owner = uuid::Uuid::new_v4();
        let stranger = uuid::Uuid::new_v4();

        let mut task =
            add_task_to_db(draft("mine", date(2024, 4, 2)), owner, now(), &connection).unwrap();

        assert!(get_tasks_from_db(stranger, &connection).unwrap().is_empty());
        assert!(matches!(
            get_task_from_db(task.id, stranger, &connection),
            Err(InternalError::NotFound { .. })
        ));
        assert!(delete_task_from_db(task.id, stranger, &connection).is_err());

        task.user_id = stranger;
        assert!(update_task_in_db(&task, &connection).is_err());
        assert_eq!(get_tasks_from_db(owner, &connection).unwrap().len(), 1);
    }

    #[test]
    fn updates_and_deletes_apply() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let mut task =
            add_task_to_db(draft("write", date(2024, 4, 2)), user, now(), &connection).unwrap();

        task.status = TaskStatus::InProgress;
        task.start_time = Some(now());
        update_task_in_db(&task, &connection).unwrap();
        assert_eq!(get_task_from_db(task.id, user, &connection).unwrap(), task);

        delete_task_from_db(task.id, user, &connection).unwrap();
        assert!(get_tasks_from_db(user, &connection).unwrap().is_empty());
    }

    #[test]
    fn daily_expansion_is_stored_in_one_go() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let drafts = expand_daily_template("Stretch", "", Priority::Low, Some(10), date(2024, 2, 10));

        let tasks = add_tasks_to_db(drafts, user, now(), &connection).unwrap();
        assert_eq!(tasks.len(), 29);
        assert_eq!(get_tasks_from_db(user, &connection).unwrap().len(), 29);
    }

    #[test]
    fn a_rejected_draft_rolls_back_the_batch() {
        let connection = test_connection();
        let user = uuid::Uuid::new_v4();
        let mut drafts = expand_daily_template("Stretch", "", Priority::Low, Some(10), date(2024, 4, 1));
        drafts[10].estimated_minutes = Some(5000);

        let err = add_tasks_to_db(drafts, user, now(), &connection).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Estimated time must be between 1 and 1440 minutes"
        );
        assert!(get_tasks_from_db(user, &connection).unwrap().is_empty());
    }
}
