//! Request authentication gate.
//!
//! Resolves the `Authorization: Bearer` header into an authenticated
//! [`Principal`]: the token must parse and verify, its ledger row must still
//! be live, and the subject must resolve to a non-deleted identity. The
//! principal is passed explicitly into downstream handlers; there is no
//! ambient "current user".

use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{lookup_live_access, lookup_user_by_id};
use super::utils::{extract_bearer_token, hash_token};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "USER" => Some(Self::User),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Authenticated identity derived from a live bearer token.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Resolve the bearer header into a principal, or fail with `Unauthorized`.
///
/// # Errors
/// `Unauthorized` when the header is missing, the token is invalid or
/// expired, its ledger row is revoked, or the subject is gone or disabled.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Principal, AuthError> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| AuthError::Unauthorized("Missing bearer token".to_string()))?;
    authenticate_bearer(&token, pool, auth_state).await
}

/// Authenticate an already-extracted bearer token.
pub(super) async fn authenticate_bearer(
    token: &str,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Principal, AuthError> {
    let claims = auth_state
        .codec()
        .parse_access(token)
        .map_err(|_| AuthError::Unauthorized("Invalid or expired token".to_string()))?;

    // Signature checks alone are not enough: a login, logout, or reset may
    // have revoked this token before its natural expiry.
    lookup_live_access(pool, &hash_token(token))
        .await?
        .ok_or_else(|| AuthError::Unauthorized("Token has been revoked".to_string()))?;

    let user = lookup_user_by_id(pool, claims.sub)
        .await?
        .ok_or_else(|| AuthError::Unauthorized("Unknown subject".to_string()))?;
    if user.is_deleted {
        return Err(AuthError::Unauthorized("Account is disabled".to_string()));
    }

    let role = Role::parse(&user.role)
        .ok_or_else(|| AuthError::Internal(anyhow::anyhow!("unknown role: {}", user.role)))?;

    Ok(Principal {
        user_id: user.user_id,
        email: user.email,
        role,
    })
}

/// Role-gated routes call this after `require_auth`.
///
/// # Errors
/// `Forbidden` when the principal does not hold the required role.
pub fn require_role(principal: &Principal, role: Role) -> Result<(), AuthError> {
    if principal.role == role {
        Ok(())
    } else {
        Err(AuthError::Forbidden(
            "Insufficient role for this resource".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: Uuid::nil(),
            email: "a@x.com".to_string(),
            role,
        }
    }

    #[test]
    fn role_parse_round_trips() {
        assert_eq!(Role::parse("USER"), Some(Role::User));
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("user"), None);
        assert_eq!(Role::parse(""), None);
        assert_eq!(Role::parse(Role::Admin.as_str()), Some(Role::Admin));
    }

    #[test]
    fn require_role_matches() {
        assert!(require_role(&principal(Role::Admin), Role::Admin).is_ok());
        assert!(require_role(&principal(Role::User), Role::User).is_ok());
    }

    #[test]
    fn require_role_rejects_mismatch() {
        let result = require_role(&principal(Role::User), Role::Admin);
        assert!(matches!(result, Err(AuthError::Forbidden(_))));
    }
}
