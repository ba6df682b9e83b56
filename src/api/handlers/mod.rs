//! Route handlers for the Savora credential service.
//!
//! `auth` carries the credential/session lifecycle; `health` and `root` are
//! operational endpoints.

pub mod auth;
pub mod health;
pub mod root;
