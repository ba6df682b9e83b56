//! Database helpers for identities, OTP codes, and the token ledger.
//!
//! Mutations that must not commit partial state (verification side effects,
//! registration completion, token-pair issuance, password reset) run inside a
//! single transaction. Token issuance always revokes every live row for the
//! identity before inserting the new one, so at most one live row survives a
//! committed issuance.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;

/// Identity record as stored in the credential store.
pub(super) struct UserRecord {
    pub(super) user_id: Uuid,
    pub(super) email: String,
    pub(super) password_hash: Option<String>,
    pub(super) full_name: String,
    pub(super) role: String,
    pub(super) email_verified: bool,
    pub(super) is_deleted: bool,
    pub(super) created_at: DateTime<Utc>,
}

/// Pending OTP code for an email, if any.
pub(super) struct OtpRecord {
    pub(super) code_hash: Vec<u8>,
    pub(super) expires_at: DateTime<Utc>,
}

/// Outcome of a successful OTP verification.
#[derive(Debug)]
pub(super) enum VerifyOutcome {
    /// An existing identity was marked verified (idempotent).
    Verified,
    /// A fresh identity was created with no password yet.
    Created,
}

/// Updated profile fields returned after a profile mutation.
pub(super) struct ProfileRecord {
    pub(super) email: String,
    pub(super) full_name: String,
    pub(super) phone_number: String,
}

const SELECT_USER_COLUMNS: &str = r"
    SELECT id, email, password_hash, full_name, role,
           email_verified, is_deleted, created_at
    FROM users
";

fn row_to_user(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        full_name: row.get("full_name"),
        role: row.get("role"),
        email_verified: row.get("email_verified"),
        is_deleted: row.get("is_deleted"),
        created_at: row.get("created_at"),
    }
}

pub(super) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = format!("{SELECT_USER_COLUMNS} WHERE email = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by email")?;
    Ok(row.as_ref().map(row_to_user))
}

pub(super) async fn lookup_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRecord>> {
    let query = format!("{SELECT_USER_COLUMNS} WHERE id = $1");
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user by id")?;
    Ok(row.as_ref().map(row_to_user))
}

/// Create or overwrite the pending OTP code for an email.
pub(super) async fn upsert_otp(
    pool: &PgPool,
    email: &str,
    code_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO otp_codes (email, code_hash, created_at, expires_at)
        VALUES ($1, $2, NOW(), NOW() + ($3 * INTERVAL '1 second'))
        ON CONFLICT (email) DO UPDATE
        SET code_hash = EXCLUDED.code_hash,
            created_at = EXCLUDED.created_at,
            expires_at = EXCLUDED.expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .bind(code_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to upsert otp code")?;
    Ok(())
}

pub(super) async fn lookup_otp(pool: &PgPool, email: &str) -> Result<Option<OtpRecord>> {
    let query = "SELECT code_hash, expires_at FROM otp_codes WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup otp code")?;
    Ok(row.map(|row| OtpRecord {
        code_hash: row.get("code_hash"),
        expires_at: row.get("expires_at"),
    }))
}

/// Apply the side effects of a successful OTP verification in one transaction:
/// consume the code, then mark the identity verified or create it.
pub(super) async fn finish_verification(pool: &PgPool, email: &str) -> Result<VerifyOutcome> {
    let mut tx = pool.begin().await.context("begin verification transaction")?;

    // Codes are single-use: delete before the identity side effect commits.
    let query = "DELETE FROM otp_codes WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to consume otp code")?;

    let query = r"
        UPDATE users
        SET email_verified = TRUE,
            email_verified_at = COALESCE(email_verified_at, NOW())
        WHERE email = $1
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let updated = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut *tx)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;

    if updated.is_some() {
        tx.commit().await.context("commit verification")?;
        return Ok(VerifyOutcome::Verified);
    }

    let query = r"
        INSERT INTO users (email, email_verified, email_verified_at)
        VALUES ($1, TRUE, NOW())
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(email)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to create verified identity")?;

    tx.commit().await.context("commit verification")?;
    Ok(VerifyOutcome::Created)
}

/// True when an insert raced with a concurrent verification for the same email.
pub(super) fn verification_conflict(err: &anyhow::Error) -> bool {
    err.downcast_ref::<sqlx::Error>().is_some_and(is_unique_violation)
}

/// Serialize concurrent issuances for one identity on its user row, so two
/// logins cannot both miss each other's insert and leave two live rows.
async fn lock_user_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<()> {
    let query = "SELECT id FROM users WHERE id = $1 FOR UPDATE";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .instrument(span)
        .await
        .context("failed to lock user row")?;
    Ok(())
}

async fn revoke_live_tokens(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> Result<()> {
    let query = r"
        UPDATE tokens
        SET revoked = TRUE, expired = TRUE
        WHERE user_id = $1 AND NOT revoked AND NOT expired
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to revoke live tokens")?;
    Ok(())
}

async fn insert_issuance(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    access_hash: &[u8],
    refresh_hash: &[u8],
) -> Result<()> {
    let query = r"
        INSERT INTO tokens (user_id, access_token_hash, refresh_token_hash, token_kind)
        VALUES ($1, $2, $3, 'bearer')
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(access_hash)
        .bind(refresh_hash)
        .execute(&mut **tx)
        .instrument(span)
        .await
        .context("failed to insert token issuance")?;
    Ok(())
}

/// Revoke every live ledger row for the identity, then record the new pair.
pub(super) async fn store_issuance(
    pool: &PgPool,
    user_id: Uuid,
    access_hash: &[u8],
    refresh_hash: &[u8],
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin issuance transaction")?;
    lock_user_row(&mut tx, user_id).await?;
    revoke_live_tokens(&mut tx, user_id).await?;
    insert_issuance(&mut tx, user_id, access_hash, refresh_hash).await?;
    tx.commit().await.context("commit issuance")?;
    Ok(())
}

/// Store the first password and issue the initial token pair atomically.
pub(super) async fn complete_registration(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
    access_hash: &[u8],
    refresh_hash: &[u8],
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin registration transaction")?;

    let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to store password")?;

    revoke_live_tokens(&mut tx, user_id).await?;
    insert_issuance(&mut tx, user_id, access_hash, refresh_hash).await?;
    tx.commit().await.context("commit registration")?;
    Ok(())
}

/// Overwrite the password and revoke every live session in one transaction.
pub(super) async fn reset_credentials(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin reset transaction")?;

    let query = "UPDATE users SET password_hash = $2 WHERE id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to reset password")?;

    revoke_live_tokens(&mut tx, user_id).await?;
    tx.commit().await.context("commit reset")?;
    Ok(())
}

/// Resolve a live ledger row by access-token digest.
pub(super) async fn lookup_live_access(pool: &PgPool, access_hash: &[u8]) -> Result<Option<Uuid>> {
    let query = r"
        SELECT user_id FROM tokens
        WHERE access_token_hash = $1 AND NOT revoked AND NOT expired
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(access_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup access token")?;
    Ok(row.map(|row| row.get("user_id")))
}

/// Resolve a live ledger row by refresh-token digest.
pub(super) async fn lookup_live_refresh(pool: &PgPool, refresh_hash: &[u8]) -> Result<Option<Uuid>> {
    let query = r"
        SELECT user_id FROM tokens
        WHERE refresh_token_hash = $1 AND NOT revoked AND NOT expired
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(refresh_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup refresh token")?;
    Ok(row.map(|row| row.get("user_id")))
}

/// Revoke the ledger row holding this access-token digest (logout).
/// Idempotent; revoking an already-revoked or unknown token is a no-op.
pub(super) async fn revoke_by_access_hash(pool: &PgPool, access_hash: &[u8]) -> Result<()> {
    let query = r"
        UPDATE tokens
        SET revoked = TRUE, expired = TRUE
        WHERE access_token_hash = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(access_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke access token")?;
    Ok(())
}

/// Update the optional profile fields and return the stored values.
pub(super) async fn update_profile(
    pool: &PgPool,
    user_id: Uuid,
    full_name: Option<&str>,
    phone_number: Option<&str>,
) -> Result<Option<ProfileRecord>> {
    let query = r"
        UPDATE users
        SET full_name = COALESCE($2, full_name),
            phone_number = COALESCE($3, phone_number)
        WHERE id = $1
        RETURNING email, full_name, phone_number
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(full_name)
        .bind(phone_number)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to update profile")?;
    Ok(row.map(|row| ProfileRecord {
        email: row.get("email"),
        full_name: row.get("full_name"),
        phone_number: row.get("phone_number"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_outcome_debug_names() {
        assert_eq!(format!("{:?}", VerifyOutcome::Verified), "Verified");
        assert_eq!(format!("{:?}", VerifyOutcome::Created), "Created");
    }

    #[test]
    fn user_record_holds_values() {
        let record = UserRecord {
            user_id: Uuid::nil(),
            email: "a@x.com".to_string(),
            password_hash: None,
            full_name: String::new(),
            role: "USER".to_string(),
            email_verified: true,
            is_deleted: false,
            created_at: Utc::now(),
        };
        assert_eq!(record.user_id, Uuid::nil());
        assert!(record.password_hash.is_none());
        assert!(record.email_verified);
        assert!(!record.is_deleted);
    }

    #[test]
    fn verification_conflict_ignores_other_errors() {
        let err = anyhow::anyhow!("unrelated");
        assert!(!verification_conflict(&err));

        let err = anyhow::Error::new(sqlx::Error::RowNotFound);
        assert!(!verification_conflict(&err));
    }
}
