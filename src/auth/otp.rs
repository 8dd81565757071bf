//! Persistence for one-time verification codes.
//!
//! Codes are single-use rows scoped to a user and a purpose. Issuing a new
//! code invalidates every earlier live code for the same scope, so at most
//! one code can ever verify.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};

use super::models::{OtpPurpose, OtpRecord, UserId};

#[derive(Clone)]
pub struct OtpStore {
    pool: PgPool,
}

impl OtpStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a freshly issued code. Callers invalidate the previous ones
    /// first; see [`Self::invalidate_previous`].
    pub async fn create(
        &self,
        user_id: UserId,
        code: &str,
        purpose: OtpPurpose,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let query = r"
            INSERT INTO otp_verifications (user_id, code, purpose, expires_at)
            VALUES ($1, $2, $3, $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(code)
            .bind(purpose.as_str())
            .bind(expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to store verification code")?;
        Ok(())
    }

    /// Live row matching the submitted code exactly. Expired or used rows
    /// never match; the newest row wins when several somehow qualify.
    pub async fn find_valid(
        &self,
        user_id: UserId,
        code: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> Result<Option<OtpRecord>> {
        let query = r"
            SELECT id, user_id, code, purpose, expires_at, used, created_at
            FROM otp_verifications
            WHERE user_id = $1 AND code = $2 AND purpose = $3
              AND used = FALSE AND expires_at > $4
            ORDER BY created_at DESC
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .bind(code)
            .bind(purpose.as_str())
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up verification code")?;
        row.map(|row| record_from_row(&row)).transpose()
    }

    /// Burn a code after a successful match.
    pub async fn mark_used(&self, id: i64) -> Result<()> {
        let query = "UPDATE otp_verifications SET used = TRUE WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to mark verification code used")?;
        Ok(())
    }

    /// Retire every live code for the scope before a resend, so the code
    /// most recently delivered is the only one that verifies.
    pub async fn invalidate_previous(&self, user_id: UserId, purpose: OtpPurpose) -> Result<u64> {
        let query = r"
            UPDATE otp_verifications
            SET used = TRUE
            WHERE user_id = $1 AND purpose = $2 AND used = FALSE
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let done = sqlx::query(query)
            .bind(user_id)
            .bind(purpose.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to invalidate verification codes")?;
        Ok(done.rows_affected())
    }
}

fn record_from_row(row: &PgRow) -> Result<OtpRecord> {
    Ok(OtpRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        code: row.try_get("code")?,
        purpose: row.try_get("purpose")?,
        expires_at: row.try_get("expires_at")?,
        used: row.try_get("used")?,
        created_at: row.try_get("created_at")?,
    })
}
