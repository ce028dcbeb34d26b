//! Shared error handling for API endpoints.
//!
//! Every failure is rendered as `{ "message": ... }` with its status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::auth::AuthError;
use crate::db::{StoreError, is_foreign_key_violation, is_unique_violation};

/// Extension trait for concise error mapping on store Results.
pub trait ResultExt<T> {
    fn db_err(self, context: &str) -> Result<T, ApiError>;
}

impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn db_err(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| map_db_error(context, e))
    }
}

impl<T> ResultExt<T> for Result<T, StoreError> {
    fn db_err(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            StoreError::Database(e) => map_db_error(context, e),
            StoreError::DuplicateSequenceNumber { day } => {
                warn!(day = %day, "Invoice numbering gave up after repeated conflicts");
                ApiError::conflict(format!("Could not allocate an invoice number for {}", day))
            }
        })
    }
}

/// API error type with automatic response conversion.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn too_many_requests(msg: impl Into<String>) -> Self {
        Self::TooManyRequests(msg.into())
    }

    pub fn internal(context: &str) -> Self {
        error!("{}", context);
        Self::Internal("Internal server error".into())
    }

    pub fn db_error(context: &str, e: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, e);
        Self::Internal("Database error".into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_message(self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::TooManyRequests(msg)
            | ApiError::Internal(msg) => msg,
        }
    }
}

/// Translate a store error into a client-facing error.
///
/// Unique violations become 409 naming the column, foreign key violations
/// 400. Anything else is logged and reported as a generic 500.
pub fn map_db_error(context: &str, err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        let target = err
            .as_database_error()
            .and_then(|e| e.message().split_once(": ").map(|(_, t)| t.to_string()))
            .unwrap_or_else(|| "unknown".to_string());
        warn!(column = %target, "{}: duplicate value", context);
        return ApiError::conflict(format!("Duplicate field value: {}", target));
    }

    if is_foreign_key_violation(&err) {
        warn!("{}: foreign key violation", context);
        return ApiError::bad_request(
            "Invalid reference: a referenced record does not exist or is still in use",
        );
    }

    ApiError::db_error(context, err)
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        err.log();
        let message = err.message();
        match err.status_code() {
            StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::FORBIDDEN => ApiError::Forbidden(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            _ => ApiError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (
            status,
            Json(ErrorResponse {
                message: self.into_message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewCustomer};

    #[tokio::test]
    async fn test_unique_violation_is_conflict() {
        let db = Database::open(":memory:").await.unwrap();
        db.users().create("alice", "h", false).await.unwrap();
        let err = db.users().create("alice", "h", false).await.unwrap_err();

        let api = map_db_error("create user", err);
        assert_eq!(api.status_code(), StatusCode::CONFLICT);
        assert_eq!(api.into_message(), "Duplicate field value: users.username");
    }

    #[tokio::test]
    async fn test_foreign_key_violation_is_bad_request() {
        let db = Database::open(":memory:").await.unwrap();
        let err = db
            .orders()
            .create(41, &[], false, chrono::Utc::now())
            .await
            .unwrap_err();

        let api = Err::<(), _>(err).db_err("create order").unwrap_err();
        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_other_errors_are_generic() {
        let db = Database::open(":memory:").await.unwrap();
        db.pool().close().await;
        let err = db
            .customers()
            .create(&NewCustomer {
                first_name: "a".into(),
                last_name: "b".into(),
                address: None,
                email: None,
            })
            .await
            .unwrap_err();

        let api = map_db_error("create customer", err);
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.into_message(), "Database error");
    }

    #[test]
    fn test_sequence_exhaustion_is_conflict() {
        let err = StoreError::DuplicateSequenceNumber {
            day: "2024_01_01".into(),
        };
        let api = Err::<(), _>(err).db_err("create order").unwrap_err();
        assert_eq!(api.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_auth_errors_keep_status() {
        let api = ApiError::from(AuthError::MissingRefreshCookie);
        assert_eq!(api.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(api.into_message(), "Unauthorized: Token required");
    }
}
