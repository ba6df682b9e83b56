//! Email check and password login endpoints.

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
use super::storage::{lookup_user_by_email, UserRecord};
use super::tokens::{issue_token_pair, TokenPair};
use super::types::{
    envelope, AuthenticationResponse, CheckEmailRequest, LoginRequest,
};
use super::utils::{valid_email, verify_password};

#[utoipa::path(
    post,
    path = "/auth/email/check",
    request_body = CheckEmailRequest,
    responses(
        (status = 200, description = "Account exists for this email", body = String),
        (status = 400, description = "Malformed email", body = String),
        (status = 404, description = "No account for this email", body = String)
    ),
    tag = "auth"
)]
pub async fn check_email(
    pool: Extension<PgPool>,
    payload: Option<Json<CheckEmailRequest>>,
) -> impl IntoResponse {
    let request: CheckEmailRequest = match payload {
        Some(Json(payload)) => payload,
        None => return AuthError::Validation("Missing payload".to_string()).into_response(),
    };

    match lookup_email(&pool, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn lookup_email(pool: &PgPool, request: &CheckEmailRequest) -> Result<Response, AuthError> {
    let email = request.email.trim();
    if !valid_email(email) {
        return Err(AuthError::Validation("Invalid email".to_string()));
    }

    let user = lookup_user_by_email(pool, email).await?.ok_or_else(|| {
        AuthError::NotFound(
            "No account associated with this email. Request and verify an OTP before registering."
                .to_string(),
        )
    })?;

    Ok(envelope(
        StatusCode::OK,
        "Email found. You can now proceed to enter your password.",
        Some(user.email),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; token pair issued", body = AuthenticationResponse),
        (status = 400, description = "Malformed email", body = String),
        (status = 401, description = "Incorrect password", body = String),
        (status = 403, description = "Account is disabled", body = String),
        (status = 404, description = "No account for this email", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return AuthError::Validation("Missing payload".to_string()).into_response(),
    };

    match authenticate(&pool, &auth_state, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn authenticate(
    pool: &PgPool,
    auth_state: &AuthState,
    request: &LoginRequest,
) -> Result<Response, AuthError> {
    let email = request.email.trim();
    if !valid_email(email) {
        return Err(AuthError::Validation("Invalid email".to_string()));
    }

    let user = lookup_user_by_email(pool, email)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

    // Soft-deleted identities keep their record but can never authenticate.
    if user.is_deleted {
        return Err(AuthError::Forbidden("Account is disabled".to_string()));
    }

    // A NULL hash means registration never completed; it matches nothing.
    let verified = user
        .password_hash
        .as_deref()
        .is_some_and(|digest| verify_password(&request.password, digest));
    if !verified {
        return Err(AuthError::InvalidCredential(
            "Incorrect password".to_string(),
        ));
    }

    let pair = issue_token_pair(pool, auth_state, &user).await?;

    info!(email = %user.email, "login successful");

    Ok(envelope(
        StatusCode::OK,
        "Login successful",
        Some(authentication_response(&user, &pair)),
    ))
}

pub(super) fn authentication_response(
    user: &UserRecord,
    pair: &TokenPair,
) -> AuthenticationResponse {
    AuthenticationResponse {
        email: user.email.clone(),
        full_name: user.full_name.clone(),
        role: user.role.clone(),
        is_deleted: user.is_deleted,
        created_date: user.created_at.to_rfc3339(),
        access_token: pair.access_token.clone(),
        refresh_token: pair.refresh_token.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn check_email_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = check_email(Extension(pool), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_malformed_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = login(
            Extension(pool),
            Extension(state),
            Some(Json(LoginRequest {
                email: "nope".to_string(),
                password: "Secret123".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn login_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = login(Extension(pool), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
