use crate::{
    api,
    api::handlers::auth::{AuthConfig, AuthState},
    api::LogEmailSender,
    token::TokenCodec,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub token_secret: SecretString,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub frontend_base_url: String,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the token codec rejects the secret or the server
/// fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = AuthConfig::new(args.frontend_base_url)
        .with_otp_ttl_seconds(args.otp_ttl_seconds)
        .with_access_token_ttl_seconds(args.access_token_ttl_seconds)
        .with_refresh_token_ttl_seconds(args.refresh_token_ttl_seconds);

    let codec = TokenCodec::new(
        &args.token_secret,
        auth_config.access_token_ttl_seconds(),
        auth_config.refresh_token_ttl_seconds(),
    )
    .context("Invalid token secret")?;

    // The log sender stands in for the email-delivery service in local dev;
    // deployments swap in a real transport behind the same trait.
    let auth_state = Arc::new(AuthState::new(
        auth_config,
        codec,
        Arc::new(LogEmailSender),
    ));

    api::new(args.port, args.dsn, auth_state).await
}
