//! Login, access token refresh and logout.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use super::json::Json;
use crate::auth::{self, AuthError, CookiePolicy};
use crate::db::{Database, User};
use crate::jwt::JwtConfig;
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct SessionState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookiePolicy,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

pub fn router(state: SessionState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/refresh", get(refresh).post(refresh))
        .route("/logout", get(logout).post(logout))
        .with_state(state)
        .merge(login_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    username: Option<String>,
    password: Option<String>,
}

/// Body returned whenever a session is started or an access token renewed.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionResponse {
    access_token: String,
    id: i64,
    username: String,
    is_admin: bool,
}

impl SessionResponse {
    fn new(access_token: String, user: &User) -> Self {
        Self {
            access_token,
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Mint both tokens for `user` and build a response carrying the access
/// token in the body and the refresh token in the cookie.
///
/// Both tokens are signed before anything is written, so a signing failure
/// never leaves a half-initialized session behind.
pub(crate) fn issue_session(
    jwt: &JwtConfig,
    cookies: &CookiePolicy,
    user: &User,
    status: StatusCode,
) -> Result<Response, ApiError> {
    let access = jwt
        .generate_access_token(user.id, &user.username, user.is_admin)
        .map_err(AuthError::from)?;
    let refresh = jwt
        .generate_refresh_token(user.id, &user.username, user.is_admin)
        .map_err(AuthError::from)?;
    let cookie = cookies
        .refresh_header(&refresh.token, refresh.duration)
        .ok_or_else(|| ApiError::internal("Refresh cookie is not a valid header value"))?;

    let mut response = (status, Json(SessionResponse::new(access.token, user))).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

async fn login(
    State(state): State<SessionState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let user = auth::verify(
        &state.db,
        payload.username.as_deref(),
        payload.password.as_deref(),
    )
    .await?;

    info!(username = %user.username, "User logged in");
    issue_session(&state.jwt, &state.cookies, &user, StatusCode::OK)
}

/// Issue a new access token from the refresh cookie. The refresh token
/// itself is not rotated and keeps its original expiry.
async fn refresh(
    State(state): State<SessionState>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = auth::verify_refresh_cookie(&headers, &state.jwt, &state.db).await?;
    let access = state
        .jwt
        .generate_access_token(user.id, &user.username, user.is_admin)
        .map_err(AuthError::from)?;

    Ok(Json(SessionResponse::new(access.token, &user)))
}

async fn logout(State(state): State<SessionState>, headers: HeaderMap) -> Response {
    if auth::refresh_cookie_token(&headers).is_none() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let mut response = (StatusCode::OK, "Cookie cleared").into_response();
    if let Some(clear) = state.cookies.clear_header() {
        response.headers_mut().insert(header::SET_COOKIE, clear);
    }
    response
}
