//! Username and password verification.

use super::errors::AuthError;
use crate::db::{Database, User};
use crate::password;

/// Fail with `MissingFields` naming every field that is absent or empty,
/// in the order given.
pub fn require_fields(fields: &[(&'static str, Option<&str>)]) -> Result<(), AuthError> {
    let missing: Vec<&'static str> = fields
        .iter()
        .filter(|(_, value)| value.is_none_or(str::is_empty))
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AuthError::MissingFields(missing))
    }
}

/// Check a username/password pair against the stored hash.
///
/// Unknown users and wrong passwords are reported separately (404 and 401).
/// The returned user never carries the hash.
pub async fn verify(
    db: &Database,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<User, AuthError> {
    require_fields(&[("username", username), ("password", password)])?;
    let (username, password) = (username.unwrap_or_default(), password.unwrap_or_default());

    let credentials = db
        .users()
        .get_credentials(username)
        .await?
        .ok_or_else(|| AuthError::UserNotFound(username.to_string()))?;

    if !password::compare(password, &credentials.password_hash).await? {
        return Err(AuthError::InvalidCredentials(username.to_string()));
    }

    Ok(credentials.user)
}
