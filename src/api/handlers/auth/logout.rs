//! Logout endpoint.
//!
//! Logout revokes the ledger row of the presented access token, so the token
//! stops authenticating immediately instead of lingering until its natural
//! expiry. Revocation also covers the refresh token issued alongside it.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::error::AuthError;
use super::principal::authenticate_bearer;
use super::state::AuthState;
use super::storage::revoke_by_access_hash;
use super::types::envelope;
use super::utils::{extract_bearer_token, hash_token};

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Session revoked", body = String),
        (status = 401, description = "Missing or invalid bearer token", body = String)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    match end_session(&headers, &pool, &auth_state).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn end_session(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
) -> Result<Response, AuthError> {
    let token = extract_bearer_token(headers)
        .ok_or_else(|| AuthError::Unauthorized("Missing bearer token".to_string()))?;
    let principal = authenticate_bearer(&token, pool, auth_state).await?;

    revoke_by_access_hash(pool, &hash_token(&token)).await?;

    info!(email = %principal.email, "logout");

    Ok(envelope(
        StatusCode::OK,
        "Logout successful",
        None::<String>,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn logout_without_bearer_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = logout(HeaderMap::new(), Extension(pool), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_with_garbage_token_is_unauthorized() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer junk"),
        );
        let response = logout(headers, Extension(pool), Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
