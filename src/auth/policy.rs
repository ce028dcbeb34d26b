//! Per-operation authorization rules.

use super::errors::AuthError;
use super::types::Identity;

/// A rule an operation requires the caller to satisfy.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    AdminOnly,
    /// The caller is the user with id `target` or an admin
    SelfOrAdmin { target: i64 },
    /// The caller is the user with id `target`; admins get no exemption
    SelfOnly { target: i64 },
    /// Changing the admin flag from `current` to `requested` needs an admin
    /// caller, even on the caller's own record
    ChangeRole { current: bool, requested: Option<bool> },
}

pub fn authorize(identity: &Identity, rule: Rule) -> Result<(), AuthError> {
    let allowed = match rule {
        Rule::AdminOnly => identity.is_admin,
        Rule::SelfOrAdmin { target } => identity.is_admin || identity.id == target,
        Rule::SelfOnly { target } => identity.id == target,
        Rule::ChangeRole { current, requested } => {
            identity.is_admin || requested.is_none_or(|r| r == current)
        }
    };

    if allowed {
        return Ok(());
    }

    Err(match rule {
        Rule::AdminOnly | Rule::SelfOrAdmin { .. } => AuthError::NotAdmin,
        Rule::SelfOnly { .. } => AuthError::NotSelf,
        Rule::ChangeRole { .. } => AuthError::RoleChange,
    })
}
