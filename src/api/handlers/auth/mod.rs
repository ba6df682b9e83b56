//! Credential and session lifecycle handlers.
//!
//! This module carries the only business rules in the service:
//!
//! - **OTP**: one pending six-digit code per email, overwritten on
//!   re-request, consumed on successful verification, checked against a
//!   wall-clock expiry at validation time.
//! - **Token ledger**: one row per access/refresh issuance, digests only.
//!   Issuance revokes all prior live rows inside the same transaction, so an
//!   identity never has more than one live row. The request gate, logout, and
//!   refresh all consult the ledger, which makes revocation immediate.
//! - **Passwords**: argon2 digests, set only after the email was verified via
//!   OTP; reset revokes every live session.

mod error;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod otp;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod profile;
pub(crate) mod refresh;
mod state;
mod storage;
mod tokens;
pub(crate) mod types;
mod utils;

pub use error::AuthError;
pub use principal::{require_auth, require_role, Principal, Role};
pub use state::{AuthConfig, AuthState};
