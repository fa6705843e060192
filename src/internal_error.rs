use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use std::sync::PoisonError;

/// Constraint names the store reports, paired with the message shown to the user.
const CONSTRAINT_MESSAGES: &[(&str, &str)] = &[
    ("valid_goal_progress", "Goal progress must be between 0 and 100"),
    ("valid_task_progress", "Task progress must be between 0 and 100"),
    ("valid_progress", "Progress must be between 0 and 100"),
    ("valid_goal_type", "Goal type must be short, medium or long term"),
    (
        "valid_estimated_minutes",
        "Estimated time must be between 1 and 1440 minutes",
    ),
    (
        "goal_nodes.goal_id",
        "This goal already has a root node",
    ),
    (
        "FOREIGN KEY constraint failed",
        "The referenced goal or goal node does not exist",
    ),
];

#[derive(Debug, Error)]
pub enum InternalError {
    /// A client-side precondition failed; nothing was changed.
    #[error("{0}")]
    Validation(String),
    #[error("{what} not found")]
    NotFound { what: String },
    /// The store rejected the operation.
    #[error("{0}")]
    Remote(String),
    #[error("Generic internal error: {0}")]
    Internal(String),
}

impl InternalError {
    pub fn validation(message: impl Into<String>) -> InternalError {
        InternalError::Validation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> InternalError {
        InternalError::NotFound { what: what.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InternalError::Validation(_) => "validation",
            InternalError::NotFound { .. } => "not_found",
            InternalError::Remote(_) => "remote",
            InternalError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            InternalError::Validation(_) => Status::BadRequest,
            InternalError::NotFound { .. } => Status::NotFound,
            InternalError::Remote(_) => Status::Conflict,
            InternalError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        is_retryable_kind(self.kind())
    }

    pub fn hints(&self) -> Vec<&'static str> {
        hints_for_kind(self.kind())
    }
}

fn is_retryable_kind(kind: &str) -> bool {
    matches!(kind, "not_found" | "internal")
}

fn hints_for_kind(kind: &str) -> Vec<&'static str> {
    match kind {
        "not_found" => vec!["Try again"],
        "internal" => vec!["Try again later"],
        _ => vec![],
    }
}

/// Maps a raw store message onto a readable one using the known constraint names.
pub fn describe_store_failure(raw: &str) -> String {
    CONSTRAINT_MESSAGES
        .iter()
        .find(|(needle, _)| raw.contains(needle))
        .map(|(_, message)| message.to_string())
        .unwrap_or_else(|| raw.to_string())
}

impl<T> From<PoisonError<T>> for InternalError {
    fn from(e: PoisonError<T>) -> InternalError {
        InternalError::Internal(e.to_string())
    }
}

impl From<rusqlite::Error> for InternalError {
    fn from(e: rusqlite::Error) -> InternalError {
        InternalError::Remote(describe_store_failure(&e.to_string()))
    }
}

impl From<&str> for InternalError {
    fn from(s: &str) -> InternalError {
        InternalError::Internal(s.to_string())
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
    pub hints: Vec<&'static str>,
}

impl ErrorBody {
    pub fn new(kind: &'static str, message: String) -> ErrorBody {
        ErrorBody {
            error: kind,
            message,
            retryable: is_retryable_kind(kind),
            hints: hints_for_kind(kind),
        }
    }
}

/// Message left behind by a failing request guard for the catcher to report.
#[derive(Debug, Default)]
pub struct GuardFailure(pub Option<String>);

fn kind_for_status(status: Status) -> &'static str {
    match status.code {
        400 | 415 | 422 => "validation",
        401 | 404 => "not_found",
        409 => "remote",
        _ => "internal",
    }
}

/// Renders failures that never reach a handler (guards, bad JSON, unknown routes).
#[rocket::catch(default)]
pub fn default_catcher(status: Status, request: &Request) -> (Status, Json<ErrorBody>) {
    let message = request
        .local_cache(GuardFailure::default)
        .0
        .clone()
        .unwrap_or_else(|| status.reason_lossy().to_string());

    warn!(uri = %request.uri(), status = status.code, "{}", message);
    (status, Json(ErrorBody::new(kind_for_status(status), message)))
}

impl<'r> Responder<'r, 'static> for InternalError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match &self {
            InternalError::Remote(_) | InternalError::Internal(_) => {
                error!(uri = %request.uri(), kind = self.kind(), "{}", self)
            }
            _ => warn!(uri = %request.uri(), kind = self.kind(), "{}", self),
        }

        let status = self.status();
        let body = ErrorBody::new(self.kind(), self.to_string());

        Response::build_from(Json(body).respond_to(request)?)
            .status(status)
            .ok()
    }
}

pub type InternalResult<T> = Result<T, InternalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_constraints_get_readable_messages() {
        assert_eq!(
            describe_store_failure("CHECK constraint failed: valid_estimated_minutes"),
            "Estimated time must be between 1 and 1440 minutes"
        );
        assert_eq!(
            describe_store_failure("UNIQUE constraint failed: goal_nodes.goal_id"),
            "This goal already has a root node"
        );
        assert_eq!(
            describe_store_failure("CHECK constraint failed: valid_task_progress"),
            "Task progress must be between 0 and 100"
        );
    }

    #[test]
    fn unknown_failures_keep_the_raw_message() {
        assert_eq!(describe_store_failure("disk I/O error"), "disk I/O error");
    }

    #[test]
    fn store_errors_become_remote_errors() {
        let connection = rusqlite::Connection::open_in_memory().unwrap();
        connection
            .execute(
                "CREATE TABLE t (p INTEGER CONSTRAINT valid_progress CHECK (p BETWEEN 0 AND 100))",
                [],
            )
            .unwrap();
        let err: InternalError = connection
            .execute("INSERT INTO t VALUES (101)", [])
            .unwrap_err()
            .into();

        assert_eq!(err.kind(), "remote");
        assert_eq!(err.status(), Status::Conflict);
        assert_eq!(err.to_string(), "Progress must be between 0 and 100");
    }

    #[test]
    fn not_found_is_retryable_and_offers_try_again() {
        let err = InternalError::not_found("Goal");
        assert_eq!(err.to_string(), "Goal not found");
        assert!(err.is_retryable());
        assert_eq!(err.hints(), vec!["Try again"]);
        assert_eq!(err.status(), Status::NotFound);

        let err = InternalError::validation("nope");
        assert!(!err.is_retryable());
        assert_eq!(err.status(), Status::BadRequest);
    }

    #[test]
    fn catcher_kinds_follow_the_status() {
        assert_eq!(kind_for_status(Status::Unauthorized), "not_found");
        assert_eq!(kind_for_status(Status::UnprocessableEntity), "validation");
        assert_eq!(kind_for_status(Status::ServiceUnavailable), "internal");

        let body = ErrorBody::new("internal", "boom".to_string());
        assert!(body.retryable);
        assert_eq!(body.hints, vec!["Try again later"]);
    }
}
