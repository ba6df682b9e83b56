//! Stateless signing and verification of access/refresh tokens.
//!
//! Tokens are compact HS256 JWTs carrying the identity's stable subject id,
//! email, role, and a `kind` claim so an access token can never be replayed
//! through the refresh endpoint (or vice versa). The signing secret is
//! process-wide configuration and is rejected when shorter than 32 bytes.

use jsonwebtoken::{
    decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
    errors::ErrorKind as JwtErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;
use uuid::Uuid;

const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum Error {
    #[error("token secret must be at least {MIN_SECRET_BYTES} bytes")]
    WeakSecret,
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("unexpected token kind")]
    WrongKind,
    #[error("failed to sign token")]
    Signing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims embedded in every issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenCodec {
    /// Build a codec from the process-wide secret and per-kind TTLs.
    ///
    /// # Errors
    /// Returns `Error::WeakSecret` if the secret is shorter than 32 bytes.
    pub fn new(
        secret: &SecretString,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Result<Self, Error> {
        let secret = secret.expose_secret();
        if secret.len() < MIN_SECRET_BYTES {
            return Err(Error::WeakSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_seconds,
            refresh_ttl_seconds,
        })
    }

    /// Mint a short-lived access token for the subject.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn mint_access(&self, sub: Uuid, email: &str, role: &str) -> Result<String, Error> {
        self.mint(sub, email, role, TokenKind::Access, self.access_ttl_seconds)
    }

    /// Mint a long-lived refresh token for the subject.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn mint_refresh(&self, sub: Uuid, email: &str, role: &str) -> Result<String, Error> {
        self.mint(sub, email, role, TokenKind::Refresh, self.refresh_ttl_seconds)
    }

    /// Verify signature and expiry, requiring the `access` kind.
    ///
    /// # Errors
    /// Returns a typed error on malformed input, bad signature, expiry, or
    /// a refresh token presented where an access token is required.
    pub fn parse_access(&self, token: &str) -> Result<Claims, Error> {
        self.parse(token, TokenKind::Access)
    }

    /// Verify signature and expiry, requiring the `refresh` kind.
    ///
    /// # Errors
    /// Returns a typed error on malformed input, bad signature, expiry, or
    /// an access token presented where a refresh token is required.
    pub fn parse_refresh(&self, token: &str) -> Result<Claims, Error> {
        self.parse(token, TokenKind::Refresh)
    }

    fn mint(
        &self,
        sub: Uuid,
        email: &str,
        role: &str,
        kind: TokenKind,
        ttl_seconds: i64,
    ) -> Result<String, Error> {
        let now = now_unix_seconds();
        let claims = Claims {
            sub,
            email: email.to_string(),
            role: role.to_string(),
            kind,
            iat: now,
            exp: now.saturating_add(ttl_seconds),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| Error::Signing)
    }

    fn parse(&self, token: &str, expected: TokenKind) -> Result<Claims, Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|err| {
            match err.kind() {
                JwtErrorKind::ExpiredSignature => Error::Expired,
                JwtErrorKind::InvalidSignature => Error::SignatureInvalid,
                _ => Error::Malformed,
            }
        })?;
        if data.claims.kind != expected {
            return Err(Error::WrongKind);
        }
        Ok(data.claims)
    }
}

fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        let secret = SecretString::from("0123456789abcdef0123456789abcdef");
        TokenCodec::new(&secret, 3600, 604_800).expect("codec")
    }

    #[test]
    fn rejects_short_secret() {
        let secret = SecretString::from("too-short");
        let result = TokenCodec::new(&secret, 3600, 604_800);
        assert!(matches!(result, Err(Error::WeakSecret)));
    }

    #[test]
    fn access_token_round_trips() -> Result<(), Error> {
        let codec = codec();
        let sub = Uuid::new_v4();
        let token = codec.mint_access(sub, "alice@example.com", "USER")?;
        let claims = codec.parse_access(&token)?;
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.role, "USER");
        assert_eq!(claims.kind, TokenKind::Access);
        assert!(claims.exp > claims.iat);
        Ok(())
    }

    #[test]
    fn refresh_token_keeps_subject() -> Result<(), Error> {
        let codec = codec();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let token = codec.mint_refresh(alice, "alice@example.com", "USER")?;
        let claims = codec.parse_refresh(&token)?;
        assert_eq!(claims.sub, alice);
        assert_ne!(claims.sub, bob);
        Ok(())
    }

    #[test]
    fn access_token_rejected_by_refresh_parser() -> Result<(), Error> {
        let codec = codec();
        let token = codec.mint_access(Uuid::new_v4(), "alice@example.com", "USER")?;
        let result = codec.parse_refresh(&token);
        assert!(matches!(result, Err(Error::WrongKind)));
        Ok(())
    }

    #[test]
    fn refresh_token_rejected_by_access_parser() -> Result<(), Error> {
        let codec = codec();
        let token = codec.mint_refresh(Uuid::new_v4(), "alice@example.com", "USER")?;
        let result = codec.parse_access(&token);
        assert!(matches!(result, Err(Error::WrongKind)));
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = codec();
        let now = now_unix_seconds();
        let claims = Claims {
            sub: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            role: "USER".to_string(),
            kind: TokenKind::Access,
            iat: now - 7200,
            exp: now - 3600,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::default(), &claims, &codec.encoding_key).expect("encode");
        let result = codec.parse_access(&token);
        assert!(matches!(result, Err(Error::Expired)));
    }

    #[test]
    fn tampered_token_is_rejected() -> Result<(), Error> {
        let codec = codec();
        let other = TokenCodec::new(
            &SecretString::from("ffffffffffffffffffffffffffffffff"),
            3600,
            604_800,
        )?;
        let token = other.mint_access(Uuid::new_v4(), "alice@example.com", "USER")?;
        let result = codec.parse_access(&token);
        assert!(matches!(result, Err(Error::SignatureInvalid)));
        Ok(())
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = codec();
        let result = codec.parse_access("not-a-token");
        assert!(matches!(result, Err(Error::Malformed)));
    }
}
