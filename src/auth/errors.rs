//! Authentication and authorization failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::jwt::JwtError;
use crate::password::PasswordError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// One or more required request fields were absent or empty
    #[error("{}", missing_fields_message(.0))]
    MissingFields(Vec<&'static str>),
    #[error("User {0} not found")]
    UserNotFound(String),
    #[error("Wrong password for user {0}")]
    InvalidCredentials(String),
    #[error("Unauthorized: Authorization token required")]
    MissingBearer,
    #[error("Forbidden: Authorization token not valid or expired")]
    InvalidBearer,
    #[error("Unauthorized: Token required")]
    MissingRefreshCookie,
    #[error("Forbidden: Token not valid or expired")]
    InvalidRefreshCookie,
    #[error("Forbidden: User is not an admin")]
    NotAdmin,
    #[error("Forbidden")]
    NotSelf,
    #[error("Forbidden: Only admins can change roles")]
    RoleChange,
    #[error("Token configuration error: {0}")]
    Configuration(#[from] JwtError),
    #[error("Password hashing failed: {0}")]
    Hashing(#[from] PasswordError),
    #[error("User store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

fn missing_fields_message(fields: &[&'static str]) -> String {
    match fields {
        [single] => format!("Field {} required", single),
        many => format!("Fields {} required", many.join(", ")),
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingFields(_) => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound(_) => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials(_)
            | AuthError::MissingBearer
            | AuthError::MissingRefreshCookie => StatusCode::UNAUTHORIZED,
            AuthError::InvalidBearer
            | AuthError::InvalidRefreshCookie
            | AuthError::NotAdmin
            | AuthError::NotSelf
            | AuthError::RoleChange => StatusCode::FORBIDDEN,
            AuthError::Configuration(_)
            | AuthError::Hashing(_)
            | AuthError::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client. Internal failures never expose details.
    pub fn message(&self) -> String {
        if self.status_code().is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    /// Log the failure server-side with a level matching its kind.
    pub fn log(&self) {
        if self.status_code().is_server_error() {
            error!(error = %self, "Authentication backend failure");
        } else {
            warn!(status = self.status_code().as_u16(), reason = %self, "Request denied");
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        self.log();
        (
            self.status_code(),
            Json(ErrorResponse {
                message: self.message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message() {
        assert_eq!(
            AuthError::MissingFields(vec!["password"]).to_string(),
            "Field password required"
        );
        assert_eq!(
            AuthError::MissingFields(vec!["username", "password"]).to_string(),
            "Fields username, password required"
        );
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::MissingFields(vec!["username"]), 400),
            (AuthError::UserNotFound("bob".into()), 404),
            (AuthError::InvalidCredentials("bob".into()), 401),
            (AuthError::MissingBearer, 401),
            (AuthError::InvalidBearer, 403),
            (AuthError::MissingRefreshCookie, 401),
            (AuthError::InvalidRefreshCookie, 403),
            (AuthError::NotAdmin, 403),
            (AuthError::NotSelf, 403),
            (AuthError::RoleChange, 403),
            (AuthError::StoreUnavailable(sqlx::Error::PoolClosed), 500),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err}");
        }
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AuthError::StoreUnavailable(sqlx::Error::PoolClosed);
        assert_eq!(err.message(), "Internal server error");

        let err = AuthError::InvalidCredentials("alice".into());
        assert_eq!(err.message(), "Wrong password for user alice");
    }
}
