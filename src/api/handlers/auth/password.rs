//! Registration completion and password reset endpoints.

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
use super::login::authentication_response;
use super::state::AuthState;
use super::storage::{complete_registration, lookup_user_by_email, reset_credentials};
use super::tokens::mint_pair;
use super::types::{envelope, AuthenticationResponse, PasswordRequest};
use super::utils::{hash_password, hash_token, valid_email};

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = PasswordRequest,
    responses(
        (status = 200, description = "Password created; token pair issued", body = AuthenticationResponse),
        (status = 400, description = "Malformed input", body = String),
        (status = 404, description = "Email never verified", body = String),
        (status = 412, description = "Email not verified yet", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordRequest>>,
) -> impl IntoResponse {
    let request: PasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return AuthError::Validation("Missing payload".to_string()).into_response(),
    };

    match create_password(&pool, &auth_state, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn create_password(
    pool: &PgPool,
    auth_state: &AuthState,
    request: &PasswordRequest,
) -> Result<Response, AuthError> {
    let email = request.email.trim();
    validate_inputs(auth_state, email, &request.new_password)?;

    let mut user = lookup_user_by_email(pool, email).await?.ok_or_else(|| {
        AuthError::NotFound(
            "Email verification required: request and validate an OTP before registering"
                .to_string(),
        )
    })?;

    if !user.email_verified {
        return Err(AuthError::PreconditionFailed(
            "Email not verified. Please validate the OTP before registration.".to_string(),
        ));
    }

    let digest = hash_password(&request.new_password)?;
    let pair = mint_pair(auth_state, &user)?;
    complete_registration(
        pool,
        user.user_id,
        &digest,
        &hash_token(&pair.access_token),
        &hash_token(&pair.refresh_token),
    )
    .await?;
    user.password_hash = Some(digest);

    info!(email = %user.email, "registration completed");

    Ok(envelope(
        StatusCode::OK,
        "Password created successfully",
        Some(authentication_response(&user, &pair)),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/password/reset",
    request_body = PasswordRequest,
    responses(
        (status = 200, description = "Password reset; all sessions revoked", body = String),
        (status = 400, description = "Malformed input", body = String),
        (status = 404, description = "No account for this email", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<PasswordRequest>>,
) -> impl IntoResponse {
    let request: PasswordRequest = match payload {
        Some(Json(payload)) => payload,
        None => return AuthError::Validation("Missing payload".to_string()).into_response(),
    };

    match overwrite_password(&pool, &auth_state, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn overwrite_password(
    pool: &PgPool,
    auth_state: &AuthState,
    request: &PasswordRequest,
) -> Result<Response, AuthError> {
    let email = request.email.trim();
    validate_inputs(auth_state, email, &request.new_password)?;

    let user = lookup_user_by_email(pool, email)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

    let digest = hash_password(&request.new_password)?;
    // Resetting also revokes every live session for the identity.
    reset_credentials(pool, user.user_id, &digest).await?;

    info!(email = %user.email, "password reset");

    Ok(envelope(
        StatusCode::OK,
        "Password reset successfully",
        None::<String>,
    ))
}

fn validate_inputs(auth_state: &AuthState, email: &str, password: &str) -> Result<(), AuthError> {
    if !valid_email(email) {
        return Err(AuthError::Validation("Invalid email".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required".to_string()));
    }
    let min = auth_state.config().min_password_length();
    if password.len() < min {
        return Err(AuthError::Validation(format!(
            "Password must be at least {min} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn register_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = register(Extension(pool), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn register_rejects_empty_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = register(
            Extension(pool),
            Extension(state),
            Some(Json(PasswordRequest {
                email: "a@x.com".to_string(),
                new_password: String::new(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn reset_rejects_short_password() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = reset_password(
            Extension(pool),
            Extension(state),
            Some(Json(PasswordRequest {
                email: "a@x.com".to_string(),
                new_password: "short".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
