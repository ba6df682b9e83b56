//! Small helpers for input validation, OTP generation, and token digests.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng as HashOsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use rand::{rngs::OsRng, Rng};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Basic email format check; the email itself is kept verbatim (it is a
/// case-sensitive key in the credential store).
pub(super) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// OTP codes are exactly six ASCII digits.
pub(super) fn valid_otp_code(code: &str) -> bool {
    Regex::new(r"^[0-9]{6}$").is_ok_and(|regex| regex.is_match(code))
}

/// Uniformly random six-digit code, zero-padded.
pub(super) fn generate_otp_code() -> String {
    let mut rng = OsRng;
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

/// Digest an OTP code so raw codes never touch the database.
pub(super) fn hash_otp_code(code: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.finalize().to_vec()
}

/// Digest a signed token for ledger storage and lookup.
pub(super) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Hash a plaintext password with a fresh salt.
///
/// # Errors
/// Returns an error if the hasher rejects the input.
pub(super) fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut HashOsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|digest| digest.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

/// Constant-time password verification against a stored digest.
pub(super) fn verify_password(plain: &str, digest: &str) -> bool {
    PasswordHash::new(digest).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    })
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn otp_code_format_is_six_digits() {
        assert!(valid_otp_code("000000"));
        assert!(valid_otp_code("123456"));
        assert!(!valid_otp_code("12345"));
        assert!(!valid_otp_code("1234567"));
        assert!(!valid_otp_code("12a456"));
        assert!(!valid_otp_code(""));
    }

    #[test]
    fn generated_codes_validate() {
        for _ in 0..32 {
            let code = generate_otp_code();
            assert!(valid_otp_code(&code), "generated code: {code}");
        }
    }

    #[test]
    fn hash_otp_code_stable() {
        let first = hash_otp_code("123456");
        let second = hash_otp_code("123456");
        let different = hash_otp_code("654321");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn password_hash_round_trips() -> anyhow::Result<()> {
        let digest = hash_password("Secret123")?;
        assert!(verify_password("Secret123", &digest));
        assert!(!verify_password("secret123", &digest));
        Ok(())
    }

    #[test]
    fn verify_password_rejects_garbage_digest() {
        assert!(!verify_password("Secret123", "not-a-phc-string"));
    }

    #[test]
    fn extract_bearer_token_variants() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_bearer_token(&headers), Some("abc.def".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc"));
        assert_eq!(extract_bearer_token(&headers), Some("abc".to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer_token(&headers), None);

        assert_eq!(extract_bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn is_unique_violation_ignores_other_errors() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
