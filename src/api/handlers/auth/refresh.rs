//! Refresh-token rotation endpoint.
//!
//! Refresh tokens are single-use: a refresh is accepted only while its
//! issuance row in the ledger is live, and a successful rotation revokes that
//! row, so replaying the same refresh token fails.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{lookup_live_refresh, lookup_user_by_id};
use super::tokens::issue_token_pair;
use super::types::{envelope, RefreshTokenRequest, TokenPairResponse};
use super::utils::hash_token;

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New token pair issued", body = TokenPairResponse),
        (status = 401, description = "Missing, malformed, expired, or rotated token", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshTokenRequest>>,
) -> impl IntoResponse {
    let request: RefreshTokenRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return AuthError::Unauthorized("Missing refresh token in request body".to_string())
                .into_response()
        }
    };

    match rotate(&pool, &auth_state, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn rotate(
    pool: &PgPool,
    auth_state: &AuthState,
    request: &RefreshTokenRequest,
) -> Result<Response, AuthError> {
    let token = request.refresh_token.trim();
    if token.is_empty() {
        return Err(AuthError::Unauthorized(
            "Missing refresh token in request body".to_string(),
        ));
    }

    let claims = auth_state.codec().parse_refresh(token).map_err(|_| {
        AuthError::Unauthorized("Invalid or expired refresh token".to_string())
    })?;

    let ledger_user = lookup_live_refresh(pool, &hash_token(token))
        .await?
        .ok_or_else(|| AuthError::Unauthorized("Refresh token has been revoked".to_string()))?;

    // The ledger row and the signed subject must agree; a token can never
    // rotate into a session for a different identity.
    if ledger_user != claims.sub {
        return Err(AuthError::Unauthorized("Invalid refresh token".to_string()));
    }

    let user = lookup_user_by_id(pool, claims.sub)
        .await?
        .ok_or_else(|| AuthError::Unauthorized("Invalid token: unknown subject".to_string()))?;
    if user.is_deleted {
        return Err(AuthError::Unauthorized("Account is disabled".to_string()));
    }

    let pair = issue_token_pair(pool, auth_state, &user).await?;

    info!(email = %user.email, "refresh token rotated");

    Ok(envelope(
        StatusCode::OK,
        "New access and refresh tokens generated successfully",
        Some(TokenPairResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn refresh_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = refresh_token(Extension(pool), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_empty_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = refresh_token(
            Extension(pool),
            Extension(state),
            Some(Json(RefreshTokenRequest {
                refresh_token: "  ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_garbage_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = refresh_token(
            Extension(pool),
            Extension(state),
            Some(Json(RefreshTokenRequest {
                refresh_token: "not-a-jwt".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_access_token_kind() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let access = state
            .codec()
            .mint_access(uuid::Uuid::new_v4(), "a@x.com", "USER")
            .expect("mint");
        let response = refresh_token(
            Extension(pool),
            Extension(state),
            Some(Json(RefreshTokenRequest {
                refresh_token: access,
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
