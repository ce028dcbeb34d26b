//! User registration and account management.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::json::Json;
use super::session::issue_session;
use crate::auth::{
    AdminOnly, Auth, AuthError, CookiePolicy, Identity, Rule, authorize, require_fields,
};
use crate::db::{Database, User, UserUpdate};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;
use crate::password;
use crate::rate_limit::{RateLimitConfig, rate_limit_signup};

const MIN_USERNAME_LENGTH: usize = 3;
const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub cookies: CookiePolicy,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let create = post(create_user).layer(middleware::from_fn_with_state(
        state.rate_limit_config.clone(),
        rate_limit_signup,
    ));

    Router::new()
        .route("/", get(list_users).merge(create))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/confirm-password", post(confirm_password))
        .with_state(state)
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    username: Option<String>,
    password: Option<String>,
    is_admin: Option<bool>,
}

#[derive(Deserialize)]
struct ConfirmPasswordRequest {
    password: Option<String>,
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.chars().count() < MIN_USERNAME_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Username must be at least {} characters long",
            MIN_USERNAME_LENGTH
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Load the target user or fail with 404.
async fn find_user(db: &Database, id: i64) -> Result<User, ApiError> {
    db.users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found(format!("User with id {} not found", id)))
}

/// Register a new non-admin user and log them in.
async fn create_user(
    State(state): State<UsersState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Response, ApiError> {
    let username = payload.username.as_deref();
    let password = payload.password.as_deref();
    require_fields(&[("username", username), ("password", password)])?;
    let (username, password) = (username.unwrap_or_default(), password.unwrap_or_default());

    validate_username(username)?;
    validate_password(password)?;

    let hash = password::hash(password).await.map_err(AuthError::from)?;
    let id = state
        .db
        .users()
        .create(username, &hash, false)
        .await
        .db_err("Failed to create user")?;
    let user = find_user(&state.db, id).await?;

    info!(username = %user.username, id, "User registered");
    issue_session(&state.jwt, &state.cookies, &user, StatusCode::CREATED)
}

async fn list_users(
    State(state): State<UsersState>,
    _auth: Auth<AdminOnly>,
) -> Result<Json<Vec<User>>, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<UsersState>,
    auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    authorize(&auth.identity, Rule::SelfOrAdmin { target: id })?;
    Ok(Json(find_user(&state.db, id).await?))
}

/// Change any of username, password and role. Only the fields present in
/// the body are touched; role changes need an admin caller.
async fn update_user(
    State(state): State<UsersState>,
    auth: Auth,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    authorize(&auth.identity, Rule::SelfOrAdmin { target: id })?;
    let target = find_user(&state.db, id).await?;
    check_role_change(&auth.identity, &target, payload.is_admin)?;

    if let Some(username) = payload.username.as_deref() {
        validate_username(username)?;
    }
    let password_hash = match payload.password.as_deref() {
        Some(password) => {
            validate_password(password)?;
            Some(password::hash(password).await.map_err(AuthError::from)?)
        }
        None => None,
    };

    let update = UserUpdate {
        username: payload.username.as_deref(),
        password_hash: password_hash.as_deref(),
        is_admin: payload.is_admin,
    };
    let updated = state
        .db
        .users()
        .update(id, &update)
        .await
        .db_err("Failed to update user")?;
    if !updated {
        return Err(ApiError::not_found(format!("User with id {} not found", id)));
    }

    if payload.is_admin.is_some_and(|r| r != target.is_admin) {
        info!(id, is_admin = ?payload.is_admin, by = %auth.identity.username, "User role changed");
    }
    Ok(Json(find_user(&state.db, id).await?))
}

fn check_role_change(
    caller: &Identity,
    target: &User,
    requested_role: Option<bool>,
) -> Result<(), AuthError> {
    authorize(
        caller,
        Rule::ChangeRole {
            current: target.is_admin,
            requested: requested_role,
        },
    )
}

async fn delete_user(
    State(state): State<UsersState>,
    auth: Auth,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    authorize(&auth.identity, Rule::SelfOrAdmin { target: id })?;
    let user = find_user(&state.db, id).await?;

    if !state.db.users().delete(id).await.db_err("Failed to delete user")? {
        return Err(ApiError::not_found(format!("User with id {} not found", id)));
    }

    info!(id, username = %user.username, by = %auth.identity.username, "User deleted");
    Ok(Json(user))
}

/// Re-check the caller's own password, e.g. before a sensitive change.
async fn confirm_password(
    State(state): State<UsersState>,
    auth: Auth,
    Path(id): Path<i64>,
    Json(payload): Json<ConfirmPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&auth.identity, Rule::SelfOnly { target: id })?;
    let user = find_user(&state.db, id).await?;

    crate::auth::verify(&state.db, Some(&user.username), payload.password.as_deref()).await?;
    Ok((StatusCode::OK, "Password OK"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: i64, name: &str, is_admin: bool) -> Identity {
        Identity {
            id,
            username: name.into(),
            is_admin,
        }
    }

    fn target(id: i64, name: &str, is_admin: bool) -> User {
        User {
            id,
            username: name.into(),
            is_admin,
            created_at: String::new(),
        }
    }

    #[test]
    fn test_validation_lengths() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn test_self_can_edit_but_not_promote() {
        let me = identity(1, "alice", false);
        let record = target(1, "alice", false);

        assert!(check_role_change(&me, &record, None).is_ok());
        assert!(check_role_change(&me, &record, Some(false)).is_ok());
        assert!(matches!(
            check_role_change(&me, &record, Some(true)),
            Err(AuthError::RoleChange)
        ));
    }

    #[test]
    fn test_admin_can_change_anyone() {
        let root = identity(1, "root", true);
        assert!(check_role_change(&root, &target(2, "bob", false), Some(true)).is_ok());
        assert!(check_role_change(&root, &target(2, "bob", true), Some(false)).is_ok());
    }

    #[test]
    fn test_others_are_rejected_before_lookup() {
        let bob = identity(2, "bob", false);
        assert!(matches!(
            authorize(&bob, Rule::SelfOrAdmin { target: 1 }),
            Err(AuthError::NotAdmin)
        ));
        assert!(matches!(
            authorize(&bob, Rule::SelfOnly { target: 999 }),
            Err(AuthError::NotSelf)
        ));
    }
}
