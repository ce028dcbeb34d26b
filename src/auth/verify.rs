//! Bearer token and refresh cookie verification.
//!
//! A missing credential is `Unauthorized`, a present but invalid or expired
//! one is `Forbidden`. Malformed tokens are treated like expired ones.

use axum::http::{HeaderMap, header};
use tracing::{debug, warn};

use super::cookie::{REFRESH_COOKIE_NAME, get_cookie};
use super::errors::AuthError;
use super::types::Identity;
use crate::db::{Database, User};
use crate::jwt::JwtConfig;

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// The refresh token from the session cookie. An empty value counts as absent.
pub fn refresh_cookie_token(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, REFRESH_COOKIE_NAME).filter(|t| !t.is_empty())
}

/// Verify the bearer access token. The identity comes from the claims alone.
pub fn verify_bearer(headers: &HeaderMap, jwt: &JwtConfig) -> Result<Identity, AuthError> {
    let token = bearer_token(headers).ok_or(AuthError::MissingBearer)?;
    let claims = jwt.validate_access_token(token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        AuthError::InvalidBearer
    })?;
    Ok(claims.into())
}

/// Verify the refresh cookie and re-read its user by id, so that deletions
/// and role changes since issuance are picked up. A token whose user has
/// since been renamed is rejected.
pub async fn verify_refresh_cookie(
    headers: &HeaderMap,
    jwt: &JwtConfig,
    db: &Database,
) -> Result<User, AuthError> {
    let token = refresh_cookie_token(headers).ok_or(AuthError::MissingRefreshCookie)?;

    let claims = jwt.validate_refresh_token(token).map_err(|e| {
        debug!(error = %e, "Rejected refresh token");
        AuthError::InvalidRefreshCookie
    })?;

    let user = db
        .users()
        .get_by_id(claims.sub)
        .await?
        .ok_or_else(|| AuthError::UserNotFound(claims.username.clone()))?;

    if user.username != claims.username {
        warn!(id = user.id, "Refresh token names a different user than the store");
        return Err(AuthError::InvalidRefreshCookie);
    }
    Ok(user)
}
