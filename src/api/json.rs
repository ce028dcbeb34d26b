//! JSON extractor whose rejections render like every other API error.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ApiError;

/// Drop-in replacement for [`axum::Json`]. Malformed bodies, wrong field
/// types and a missing content type are all 400 `{message}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<T, S> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let axum::Json(value) = axum::Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "Rejected request body");
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                ApiError::bad_request("Expected request with Content-Type: application/json")
            }
            JsonRejection::JsonSyntaxError(_) => {
                ApiError::bad_request("Invalid JSON syntax in request body")
            }
            JsonRejection::JsonDataError(err) => {
                ApiError::bad_request(format!("Invalid request data: {}", err.body_text()))
            }
            other => ApiError::bad_request(other.body_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Login {
        #[allow(dead_code)]
        username: Option<String>,
    }

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<Json<Login>, ApiError> {
        let mut builder = Request::builder().method("POST").uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        Json::<Login>::from_request(builder.body(Body::from(body)).unwrap(), &()).await
    }

    #[tokio::test]
    async fn test_valid_body() {
        assert!(extract(Some("application/json"), r#"{"username":"alice"}"#).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_content_type_is_bad_request() {
        let err = extract(None, "").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_body_is_bad_request() {
        let err = extract(Some("application/json"), "").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_field_type_is_bad_request() {
        let err = extract(Some("application/json"), r#"{"username":5}"#).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
