//! OTP issuance and verification endpoints.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};

use crate::api::email::OtpMessage;

use super::error::AuthError;
use super::state::AuthState;
use super::storage::{
    finish_verification, lookup_otp, upsert_otp, verification_conflict, VerifyOutcome,
};
use super::types::{
    envelope, OtpIssuedResponse, RequestOtpRequest, VerifiedResponse, VerifyOtpRequest,
};
use super::utils::{generate_otp_code, hash_otp_code, valid_email, valid_otp_code};

#[utoipa::path(
    post,
    path = "/auth/otp",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "OTP generated and handed to the mailer", body = OtpIssuedResponse),
        (status = 400, description = "Malformed email", body = String),
        (status = 502, description = "Mailer rejected the message", body = String)
    ),
    tag = "auth"
)]
pub async fn request_otp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RequestOtpRequest>>,
) -> impl IntoResponse {
    let request: RequestOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return AuthError::Validation("Missing payload".to_string()).into_response(),
    };

    match issue_otp(&pool, &auth_state, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn issue_otp(
    pool: &PgPool,
    auth_state: &AuthState,
    request: &RequestOtpRequest,
) -> Result<Response, AuthError> {
    let email = request.email.trim();
    if !valid_email(email) {
        return Err(AuthError::Validation("Invalid email".to_string()));
    }

    let code = generate_otp_code();
    let ttl_seconds = auth_state.config().otp_ttl_seconds();

    // Persist before handing off so a delivery failure stays retryable:
    // re-requesting simply overwrites this row.
    upsert_otp(pool, email, &hash_otp_code(&code), ttl_seconds).await?;

    let message = OtpMessage {
        to_email: email.to_string(),
        code,
    };
    auth_state.email_sender().send(&message).map_err(|err| {
        error!("Failed to deliver OTP email: {err:#}");
        AuthError::Delivery("Failed to send OTP. Please try again.".to_string())
    })?;

    info!(email = %email, "OTP issued");

    Ok(envelope(
        StatusCode::OK,
        format!("OTP sent. It will expire in {ttl_seconds} seconds."),
        Some(OtpIssuedResponse {
            email: email.to_string(),
            expires_in_seconds: ttl_seconds,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/otp/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP validated and email verified", body = VerifiedResponse),
        (status = 400, description = "Malformed or expired code", body = String),
        (status = 401, description = "Code mismatch", body = String),
        (status = 404, description = "No pending code for this email", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    pool: Extension<PgPool>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> impl IntoResponse {
    let request: VerifyOtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return AuthError::Validation("Missing payload".to_string()).into_response(),
    };

    match check_otp(&pool, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn check_otp(pool: &PgPool, request: &VerifyOtpRequest) -> Result<Response, AuthError> {
    let email = request.email.trim();
    if !valid_email(email) {
        return Err(AuthError::Validation("Invalid email".to_string()));
    }

    let code = request.code.trim();
    if !valid_otp_code(code) {
        return Err(AuthError::Validation(
            "Invalid OTP format [6 digits only]".to_string(),
        ));
    }

    let record = lookup_otp(pool, email).await?.ok_or_else(|| {
        AuthError::NotFound("OTP not found for the provided email".to_string())
    })?;

    // Expiry wins over mismatch: a stale code is reported expired no matter
    // what digits were sent. Both are wall-clock checks at validation time;
    // there is no background sweep.
    if Utc::now() > record.expires_at {
        return Err(AuthError::Expired("OTP has expired".to_string()));
    }
    if record.code_hash != hash_otp_code(code) {
        return Err(AuthError::InvalidCredential(
            "Invalid OTP provided".to_string(),
        ));
    }

    let outcome = finish_verification(pool, email).await.map_err(|err| {
        if verification_conflict(&err) {
            AuthError::Conflict("Account already exists for this email".to_string())
        } else {
            AuthError::Internal(err)
        }
    })?;

    info!(email = %email, outcome = ?outcome, "email verified");

    let created = matches!(outcome, VerifyOutcome::Created);
    let message = if created {
        "OTP validated, account created, and email verified successfully"
    } else {
        "OTP validated and email verified successfully"
    };

    Ok(envelope(
        StatusCode::OK,
        message,
        Some(VerifiedResponse {
            email: email.to_string(),
            is_email_verified: true,
            verified_at: Utc::now(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn request_otp_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = request_otp(Extension(pool), Extension(state), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn request_otp_rejects_malformed_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let state = super::super::tests::auth_state();
        let response = request_otp(
            Extension(pool),
            Extension(state),
            Some(Json(RequestOtpRequest {
                email: "not-an-email".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_bad_code_format() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_otp(
            Extension(pool),
            Some(Json(VerifyOtpRequest {
                email: "a@x.com".to_string(),
                code: "12ab56".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn verify_otp_rejects_short_code() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = verify_otp(
            Extension(pool),
            Some(Json(VerifyOtpRequest {
                email: "a@x.com".to_string(),
                code: "123".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
