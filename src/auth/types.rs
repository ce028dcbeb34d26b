//! Authenticated identity.

use crate::jwt::Claims;

/// Who a request acts as, taken from token claims or re-read from the store.
///
/// A snapshot: changing a user's role does not affect identities built from
/// tokens issued before the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// User id
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            is_admin: claims.is_admin,
        }
    }
}
