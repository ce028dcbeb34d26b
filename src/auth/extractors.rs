//! Axum extractors for bearer authentication.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::AuthError;
use super::policy::{Rule, authorize};
use super::state::HasAuthBackend;
use super::types::Identity;
use super::verify::verify_bearer;

/// A role requirement checked after the bearer token is verified.
pub trait RoleConstraint {
    fn check(identity: &Identity) -> Result<(), AuthError>;
}

/// Any authenticated caller.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn check(_identity: &Identity) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Admin callers only.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn check(identity: &Identity) -> Result<(), AuthError> {
        authorize(identity, Rule::AdminOnly)
    }
}

/// Extractor for routes behind `Authorization: Bearer <access token>`.
///
/// Rejects with 401 when the header is missing, 403 when the token is
/// invalid or expired or the role constraint fails.
pub struct Auth<R: RoleConstraint = AnyRole> {
    pub identity: Identity,
    _role: PhantomData<R>,
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = verify_bearer(&parts.headers, state.jwt())?;
        R::check(&identity)?;
        Ok(Auth {
            identity,
            _role: PhantomData,
        })
    }
}
