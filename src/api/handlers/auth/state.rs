//! Auth configuration and shared per-process state.

use std::sync::Arc;

use crate::api::email::EmailSender;
use crate::token::TokenCodec;

const DEFAULT_OTP_TTL_SECONDS: i64 = 3 * 60;
const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    otp_ttl_seconds: i64,
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    min_password_length: usize,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            access_token_ttl_seconds: DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_min_password_length(mut self, length: usize) -> Self {
        self.min_password_length = length;
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    #[must_use]
    pub fn access_token_ttl_seconds(&self) -> i64 {
        self.access_token_ttl_seconds
    }

    #[must_use]
    pub fn refresh_token_ttl_seconds(&self) -> i64 {
        self.refresh_token_ttl_seconds
    }

    pub(super) fn min_password_length(&self) -> usize {
        self.min_password_length
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    email_sender: Arc<dyn EmailSender>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, codec: TokenCodec, email_sender: Arc<dyn EmailSender>) -> Self {
        Self {
            config,
            codec,
            email_sender,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(super) fn email_sender(&self) -> &dyn EmailSender {
        self.email_sender.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;
    use secrecy::SecretString;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("http://localhost:3000".to_string());

        assert_eq!(config.frontend_base_url(), "http://localhost:3000");
        assert_eq!(config.otp_ttl_seconds(), DEFAULT_OTP_TTL_SECONDS);
        assert_eq!(
            config.access_token_ttl_seconds(),
            DEFAULT_ACCESS_TOKEN_TTL_SECONDS
        );
        assert_eq!(
            config.refresh_token_ttl_seconds(),
            DEFAULT_REFRESH_TOKEN_TTL_SECONDS
        );
        assert_eq!(config.min_password_length(), DEFAULT_MIN_PASSWORD_LENGTH);

        let config = config
            .with_otp_ttl_seconds(60)
            .with_access_token_ttl_seconds(900)
            .with_refresh_token_ttl_seconds(3600)
            .with_min_password_length(12);

        assert_eq!(config.otp_ttl_seconds(), 60);
        assert_eq!(config.access_token_ttl_seconds(), 900);
        assert_eq!(config.refresh_token_ttl_seconds(), 3600);
        assert_eq!(config.min_password_length(), 12);
    }

    #[test]
    fn auth_state_exposes_parts() {
        let config = AuthConfig::new("http://localhost:3000".to_string());
        let codec = TokenCodec::new(
            &SecretString::from("0123456789abcdef0123456789abcdef"),
            config.access_token_ttl_seconds(),
            config.refresh_token_ttl_seconds(),
        )
        .expect("codec");
        let state = AuthState::new(config, codec, Arc::new(LogEmailSender));
        assert_eq!(state.config().frontend_base_url(), "http://localhost:3000");
    }
}
