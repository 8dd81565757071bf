//! Persistence gateway for user records.
//!
//! Every method surfaces persistence errors untransformed via `anyhow`;
//! "not found" is `Ok(None)`, never an error. Duplicate email/phone on
//! insert is re-validated by the partial unique indexes and reported as a
//! typed outcome so the orchestrator can map it to a conflict instead of
//! treating it as fatal.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, QueryBuilder, Row};
use tracing::{info_span, Instrument};

use super::models::{PasswordState, PublicUser, Role, User, UserId, UserStatus};

const USER_COLUMNS: &str = "id, name, email, phone, department, password_hash, role, status, \
     is_verified, is_password_changed, is_temp_password, temp_password_expires_at, \
     created_by_admin, created_at";

const PUBLIC_COLUMNS: &str = "id, name, email, phone, department, role, status, \
     is_verified, is_password_changed, is_temp_password, temp_password_expires_at, \
     created_by_admin, created_at";

/// Outcome of an insert that may trip the live-row unique indexes.
#[derive(Debug)]
pub enum CreateOutcome {
    Created(UserId),
    DuplicateEmail,
    DuplicatePhone,
}

/// Outcome of a profile update; `Missing` covers soft-deleted rows too.
#[derive(Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    Missing,
    DuplicateEmail,
    DuplicatePhone,
}

/// Fields for a self-service signup row.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password_hash: &'a str,
}

/// Fields for an admin-provisioned row. Pre-verified by construction.
#[derive(Debug)]
pub struct NewAdminUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub department: Option<&'a str>,
    pub role: Role,
    pub status: UserStatus,
    pub password_hash: &'a str,
    pub password_state: PasswordState,
    pub is_temp_password: bool,
    pub temp_password_expires_at: Option<DateTime<Utc>>,
    pub created_by_admin: UserId,
}

/// Profile fields an admin may edit. Never touches the password hash or
/// any security flag.
#[derive(Debug)]
pub struct ProfileUpdate<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub department: Option<&'a str>,
    pub role: Role,
    pub status: UserStatus,
}

/// Pagination and filters for the admin user list.
#[derive(Debug, Default)]
pub struct ListFilter {
    pub page: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

#[derive(Clone)]
pub struct AccountStore {
    pool: PgPool,
}

impl AccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up the full record by normalized email; soft-deleted rows are
    /// invisible.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL LIMIT 1"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by email")?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    /// Look up the public projection by id. The password hash never leaves
    /// the store on this path.
    pub async fn find_by_id(&self, id: UserId) -> Result<Option<PublicUser>> {
        let query = format!(
            "SELECT {PUBLIC_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL LIMIT 1"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by id")?;
        row.map(|row| public_from_row(&row)).transpose()
    }

    /// Duplicate check at signup; matches the stored national number form.
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = $1 AND deleted_at IS NULL LIMIT 1"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(phone)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to look up user by phone")?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    /// Self-registration: the user picked their own password, so the row
    /// starts unverified with no forced change pending.
    pub async fn create_self_registered(&self, user: &NewUser<'_>) -> Result<CreateOutcome> {
        let query = r"
            INSERT INTO users
                (name, email, phone, password_hash,
                 is_verified, is_password_changed, is_temp_password)
            VALUES ($1, $2, $3, $4, FALSE, TRUE, FALSE)
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.phone)
            .bind(user.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;
        match row {
            Ok(row) => Ok(CreateOutcome::Created(row.try_get("id")?)),
            Err(err) => match unique_constraint(&err) {
                Some("users_phone_live") => Ok(CreateOutcome::DuplicatePhone),
                Some(_) => Ok(CreateOutcome::DuplicateEmail),
                None => Err(err).context("failed to insert user"),
            },
        }
    }

    /// Admin-provisioned account: verified from the start, flags chosen by
    /// the caller depending on the temp-password path.
    pub async fn create_by_admin(&self, user: &NewAdminUser<'_>) -> Result<CreateOutcome> {
        let query = r"
            INSERT INTO users
                (name, email, phone, department, status, password_hash, role,
                 is_verified, is_password_changed, is_temp_password,
                 temp_password_expires_at, created_by_admin)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9, $10, $11)
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user.name)
            .bind(user.email)
            .bind(user.phone)
            .bind(user.department)
            .bind(user.status.as_str())
            .bind(user.password_hash)
            .bind(user.role.as_str())
            .bind(user.password_state.to_column())
            .bind(user.is_temp_password)
            .bind(user.temp_password_expires_at)
            .bind(user.created_by_admin)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;
        match row {
            Ok(row) => Ok(CreateOutcome::Created(row.try_get("id")?)),
            Err(err) => match unique_constraint(&err) {
                Some("users_phone_live") => Ok(CreateOutcome::DuplicatePhone),
                Some(_) => Ok(CreateOutcome::DuplicateEmail),
                None => Err(err).context("failed to insert admin-created user"),
            },
        }
    }

    /// Atomically install a new hash and clear every temporary-password
    /// flag; the expiry goes with them.
    pub async fn update_password(&self, id: UserId, new_hash: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET password_hash = $2,
                is_password_changed = TRUE,
                is_temp_password = FALSE,
                temp_password_expires_at = NULL
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(new_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password")?;
        Ok(())
    }

    pub async fn mark_verified(&self, id: UserId) -> Result<()> {
        let query = "UPDATE users SET is_verified = TRUE WHERE id = $1";
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
            .context("failed to mark user verified")?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        id: UserId,
        fields: &ProfileUpdate<'_>,
    ) -> Result<UpdateOutcome> {
        let query = r"
            UPDATE users
            SET name = $2, email = $3, phone = $4, department = $5,
                role = $6, status = $7
            WHERE id = $1 AND deleted_at IS NULL
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(id)
            .bind(fields.name)
            .bind(fields.email)
            .bind(fields.phone)
            .bind(fields.department)
            .bind(fields.role.as_str())
            .bind(fields.status.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await;
        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(UpdateOutcome::Missing),
            Ok(_) => Ok(UpdateOutcome::Applied),
            Err(err) => match unique_constraint(&err) {
                Some("users_phone_live") => Ok(UpdateOutcome::DuplicatePhone),
                Some(_) => Ok(UpdateOutcome::DuplicateEmail),
                None => Err(err).context("failed to update profile"),
            },
        }
    }

    /// Soft delete. Deleting an already-deleted row affects zero rows and
    /// is not an error.
    pub async fn soft_delete(&self, id: UserId) -> Result<u64> {
        let query = "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let done = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to soft-delete user")?;
        Ok(done.rows_affected())
    }

    pub async fn soft_delete_many(&self, ids: &[UserId]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let query =
            "UPDATE users SET deleted_at = NOW() WHERE id = ANY($1) AND deleted_at IS NULL";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let done = sqlx::query(query)
            .bind(ids)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to soft-delete users")?;
        Ok(done.rows_affected())
    }

    /// Paginated, filtered public listing for the admin panel. Returns the
    /// page of rows plus the total match count.
    pub async fn list(&self, filter: &ListFilter) -> Result<(Vec<PublicUser>, i64)> {
        let page = filter.page.max(1);
        let limit = filter.limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut builder = QueryBuilder::new(format!(
            "SELECT {PUBLIC_COLUMNS}, COUNT(*) OVER () AS total \
             FROM users WHERE deleted_at IS NULL"
        ));
        if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR email ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }
        if let Some(role) = filter.role {
            builder.push(" AND role = ");
            builder.push_bind(role.as_str());
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC LIMIT ");
        builder.push_bind(limit);
        builder.push(" OFFSET ");
        builder.push_bind(offset);

        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = builder.sql()
        );
        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to list users")?;

        let total = rows
            .first()
            .map(|row| row.try_get("total"))
            .transpose()?
            .unwrap_or(0);
        let users = rows
            .iter()
            .map(public_from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok((users, total))
    }
}

/// On a unique violation, return the offending constraint name so the
/// caller can map it to a typed duplicate; `None` for anything else.
fn unique_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err)
            if db_err.code().is_some_and(|code| code.as_ref() == "23505") =>
        {
            db_err.constraint().or(Some("unknown"))
        }
        _ => None,
    }
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        department: row.try_get("department")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse().map_err(|e: String| anyhow!(e))?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        is_verified: row.try_get("is_verified")?,
        password_state: PasswordState::from_column(row.try_get("is_password_changed")?),
        is_temp_password: row
            .try_get::<Option<bool>, _>("is_temp_password")?
            .unwrap_or(false),
        temp_password_expires_at: row.try_get("temp_password_expires_at")?,
        created_by_admin: row.try_get("created_by_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

fn public_from_row(row: &PgRow) -> Result<PublicUser> {
    let role: String = row.try_get("role")?;
    let status: String = row.try_get("status")?;
    Ok(PublicUser {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        department: row.try_get("department")?,
        role: role.parse().map_err(|e: String| anyhow!(e))?,
        status: status.parse().map_err(|e: String| anyhow!(e))?,
        is_verified: row.try_get("is_verified")?,
        password_state: PasswordState::from_column(row.try_get("is_password_changed")?),
        is_temp_password: row
            .try_get::<Option<bool>, _>("is_temp_password")?
            .unwrap_or(false),
        temp_password_expires_at: row.try_get("temp_password_expires_at")?,
        created_by_admin: row.try_get("created_by_admin")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_filter_defaults_are_first_page() {
        let filter = ListFilter::default();
        assert_eq!(filter.page.max(1), 1);
        assert_eq!(filter.limit.clamp(1, 100), 1);
        assert!(filter.search.is_none());
    }

    #[test]
    fn create_outcome_debug_names() {
        assert_eq!(format!("{:?}", CreateOutcome::DuplicateEmail), "DuplicateEmail");
        assert_eq!(format!("{:?}", CreateOutcome::DuplicatePhone), "DuplicatePhone");
    }

    #[test]
    fn update_outcome_distinguishes_missing() {
        assert_ne!(UpdateOutcome::Missing, UpdateOutcome::Applied);
    }
}
