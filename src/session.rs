use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use uuid::Uuid;

use crate::data::UserID;
use crate::internal_error::{GuardFailure, InternalError};

/// Header carrying the signed-in user's id. Authentication happens upstream.
pub const USER_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub UserID);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserId {
    type Error = InternalError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let (status, error) = match request.headers().get_one(USER_HEADER) {
            Some(value) => match Uuid::parse_str(value.trim()) {
                Ok(id) => return Outcome::Success(UserId(id)),
                Err(_) => (
                    Status::BadRequest,
                    InternalError::validation("Malformed user id"),
                ),
            },
            None => (
                Status::Unauthorized,
                InternalError::not_found("Signed-in user"),
            ),
        };

        let message = error.to_string();
        request.local_cache(|| GuardFailure(Some(message)));
        Outcome::Error((status, error))
    }
}
