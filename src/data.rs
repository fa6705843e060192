use rusqlite::{params, Connection};
use thiserror::Error;

use std::path::Path;
use std::sync::{Arc, Mutex};

pub type DBConnection = Arc<Mutex<Connection>>;

pub type UserID = uuid::Uuid;

#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> ParseEnumError {
        ParseEnumError {
            kind,
            value: value.to_string(),
        }
    }
}

/// Stores an enum with `as_str`/`FromStr` as a TEXT column.
macro_rules! sql_text_enum {
    ($name:ty) => {
        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

pub(crate) use sql_text_enum;

pub fn open_database(path: impl AsRef<Path>) -> rusqlite::Result<Connection> {
    let connection = Connection::open(path)?;
    create_tables(&connection)?;
    Ok(connection)
}

pub fn create_tables(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch("PRAGMA foreign_keys = ON")?;

    connection.execute(
        "CREATE TABLE IF NOT EXISTS goals (
            id          BLOB PRIMARY KEY,
            user_id     BLOB NOT NULL,
            title       TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            dimension   TEXT NOT NULL,
            period      TEXT NOT NULL,
            target_date TEXT,
            progress    INTEGER NOT NULL DEFAULT 0
                CONSTRAINT valid_goal_progress CHECK (progress BETWEEN 0 AND 100),
            status      TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        )",
        params![],
    )?;
    connection.execute(
        "CREATE TABLE IF NOT EXISTS goal_nodes (
            id                 BLOB PRIMARY KEY,
            user_id            BLOB NOT NULL,
            parent_id          BLOB REFERENCES goal_nodes (id),
            goal_id            BLOB REFERENCES goals (id),
            content            TEXT NOT NULL,
            implementation     TEXT,
            improvements       TEXT,
            summary            TEXT,
            goal_type          INTEGER NOT NULL DEFAULT 1
                CONSTRAINT valid_goal_type CHECK (goal_type BETWEEN 1 AND 3),
            planned_start_date TEXT,
            planned_end_date   TEXT,
            actual_start_date  TEXT,
            completed_at       TEXT,
            progress           INTEGER NOT NULL DEFAULT 0
                CONSTRAINT valid_progress CHECK (progress BETWEEN 0 AND 100),
            is_root            INTEGER NOT NULL DEFAULT 0,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        )",
        params![],
    )?;
    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS unique_root_per_goal
            ON goal_nodes (goal_id) WHERE is_root = 1",
        params![],
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS goal_nodes_by_parent ON goal_nodes (parent_id)",
        params![],
    )?;
    connection.execute(
        "CREATE TABLE IF NOT EXISTS tasks (
            id                BLOB PRIMARY KEY,
            user_id           BLOB NOT NULL,
            title             TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            status            TEXT NOT NULL,
            priority          TEXT NOT NULL,
            due_date          TEXT NOT NULL,
            start_time        TEXT,
            estimated_minutes INTEGER
                CONSTRAINT valid_estimated_minutes
                CHECK (estimated_minutes IS NULL OR estimated_minutes BETWEEN 1 AND 1440),
            completed_at      TEXT,
            progress          INTEGER
                CONSTRAINT valid_task_progress
                CHECK (progress IS NULL OR progress BETWEEN 0 AND 100),
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        )",
        params![],
    )?;
    connection.execute(
        "CREATE INDEX IF NOT EXISTS tasks_by_user_due ON tasks (user_id, due_date)",
        params![],
    )?;

    Ok(())
}

#[cfg(test)]
pub fn test_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    create_tables(&connection).unwrap();
    connection
}
