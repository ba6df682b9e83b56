//! # Savora (Credential & Session Service)
//!
//! `savora` is the credential authority of the Savora food-marketplace
//! backend. It owns email/OTP identity verification, password credential
//! issuance, JWT access/refresh token issuance, and server-side revocation
//! tracking. Domain CRUD, file storage, and real email transport live in
//! other services.
//!
//! ## Identity lifecycle
//!
//! An identity is created on the first successful OTP verification for an
//! unseen email (with no password yet), completes registration by setting a
//! password, and is soft-deleted rather than removed, which permanently
//! blocks authentication.
//!
//! ## Sessions
//!
//! Login, registration, and refresh each mint an access/refresh JWT pair and
//! rotate the token ledger: every prior live row for the identity is revoked
//! in the same transaction that records the new pair. The request gate
//! accepts a bearer token only while its ledger row is live, so a newer
//! login, a logout, or a password reset invalidates older tokens immediately.

pub mod api;
pub mod cli;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
