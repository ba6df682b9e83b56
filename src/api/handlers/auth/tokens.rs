//! Token-pair issuance shared by login and refresh.

use sqlx::PgPool;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{store_issuance, UserRecord};
use super::utils::hash_token;

pub(super) struct TokenPair {
    pub(super) access_token: String,
    pub(super) refresh_token: String,
}

/// Mint a fresh access/refresh pair and rotate the ledger: every live row for
/// the identity is revoked before the new row is inserted, so exactly one
/// live row remains once the issuance commits.
pub(super) async fn issue_token_pair(
    pool: &PgPool,
    auth_state: &AuthState,
    user: &UserRecord,
) -> Result<TokenPair, AuthError> {
    let pair = mint_pair(auth_state, user)?;
    store_issuance(
        pool,
        user.user_id,
        &hash_token(&pair.access_token),
        &hash_token(&pair.refresh_token),
    )
    .await?;
    Ok(pair)
}

/// Mint both tokens without touching the ledger; used when the caller stores
/// the issuance inside a larger transaction.
pub(super) fn mint_pair(auth_state: &AuthState, user: &UserRecord) -> Result<TokenPair, AuthError> {
    let access_token = auth_state
        .codec()
        .mint_access(user.user_id, &user.email, &user.role)
        .map_err(|err| AuthError::Internal(err.into()))?;
    let refresh_token = auth_state
        .codec()
        .mint_refresh(user.user_id, &user.email, &user.role)
        .map_err(|err| AuthError::Internal(err.into()))?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}
