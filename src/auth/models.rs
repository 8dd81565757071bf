//! Account and OTP domain types shared by the stores and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

pub type UserId = i64;

/// Role attached to an account; drives the admin gates.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Manager,
    Developer,
    Designer,
    Analyst,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Manager => "manager",
            Self::Developer => "developer",
            Self::Designer => "designer",
            Self::Analyst => "analyst",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "developer" => Ok(Self::Developer),
            "designer" => Ok(Self::Designer),
            "analyst" => Ok(Self::Analyst),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tri-state for the `is_password_changed` column.
///
/// `NeverSet` corresponds to NULL on rows that predate the forced-change
/// flow; those accounts must never be forced to change their password.
/// Only an explicit `Pending` (stored FALSE) participates in the
/// must-change rule.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PasswordState {
    NeverSet,
    Pending,
    Done,
}

impl PasswordState {
    #[must_use]
    pub const fn from_column(value: Option<bool>) -> Self {
        match value {
            None => Self::NeverSet,
            Some(false) => Self::Pending,
            Some(true) => Self::Done,
        }
    }

    #[must_use]
    pub const fn to_column(self) -> Option<bool> {
        match self {
            Self::NeverSet => None,
            Self::Pending => Some(false),
            Self::Done => Some(true),
        }
    }
}

/// Full account row, password hash included. Only the stores and the
/// orchestrator ever see this; everything outbound gets [`PublicUser`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub status: UserStatus,
    pub is_verified: bool,
    pub password_state: PasswordState,
    pub is_temp_password: bool,
    pub temp_password_expires_at: Option<DateTime<Utc>>,
    pub created_by_admin: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Forced-change rule: both an explicit pending flag and a temporary
    /// password are required. A lone `Pending`, or a legacy `NeverSet` row,
    /// never forces a change.
    #[must_use]
    pub fn must_change_password(&self) -> bool {
        self.password_state == PasswordState::Pending && self.is_temp_password
    }

    #[must_use]
    pub fn temp_password_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_temp_password
            && self
                .temp_password_expires_at
                .is_some_and(|expires_at| expires_at < now)
    }

    #[must_use]
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            department: self.department.clone(),
            role: self.role,
            status: self.status,
            is_verified: self.is_verified,
            password_state: self.password_state,
            is_temp_password: self.is_temp_password,
            temp_password_expires_at: self.temp_password_expires_at,
            created_by_admin: self.created_by_admin,
            created_at: self.created_at,
        }
    }
}

/// Account projection with the password hash stripped; safe to serialize.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct PublicUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub is_verified: bool,
    pub password_state: PasswordState,
    pub is_temp_password: bool,
    pub temp_password_expires_at: Option<DateTime<Utc>>,
    pub created_by_admin: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl PublicUser {
    #[must_use]
    pub fn must_change_password(&self) -> bool {
        self.password_state == PasswordState::Pending && self.is_temp_password
    }
}

/// OTP flows the codes are scoped to. Signup is the only purpose today;
/// verification matches on the exact purpose so new flows cannot consume
/// each other's codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Signup,
}

impl OtpPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "signup",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: i64,
    pub user_id: UserId,
    pub code: String,
    pub purpose: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

/// Strip the `+91`/`91` country prefix and all whitespace, leaving the bare
/// 10-digit national number used for storage and duplicate checks.
#[must_use]
pub fn normalize_phone(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let trimmed = compact
        .strip_prefix("+91")
        .or_else(|| compact.strip_prefix("91"))
        .unwrap_or(&compact);
    trimmed.to_string()
}

/// External-facing rendering of a stored national number.
#[must_use]
pub fn display_phone(national: &str) -> String {
    format!("+91{national}")
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(password_state: PasswordState, is_temp_password: bool) -> User {
        User {
            id: 1,
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: Some("9876543210".to_string()),
            department: None,
            password_hash: "$2b$12$hash".to_string(),
            role: Role::User,
            status: UserStatus::Active,
            is_verified: true,
            password_state,
            is_temp_password,
            temp_password_expires_at: None,
            created_by_admin: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn must_change_requires_both_flags() {
        assert!(user(PasswordState::Pending, true).must_change_password());
        assert!(!user(PasswordState::Pending, false).must_change_password());
        assert!(!user(PasswordState::Done, true).must_change_password());
    }

    #[test]
    fn legacy_never_set_rows_are_not_forced() {
        // Rows seeded before the column existed decode as NeverSet.
        let legacy = user(PasswordState::from_column(None), false);
        assert!(!legacy.must_change_password());
    }

    #[test]
    fn password_state_round_trips_through_column() {
        for state in [
            PasswordState::NeverSet,
            PasswordState::Pending,
            PasswordState::Done,
        ] {
            assert_eq!(PasswordState::from_column(state.to_column()), state);
        }
    }

    #[test]
    fn temp_password_expiry_needs_temp_flag_and_past_timestamp() {
        let now = Utc::now();
        let mut account = user(PasswordState::Pending, true);
        assert!(!account.temp_password_expired(now));

        account.temp_password_expires_at = Some(now - Duration::hours(1));
        assert!(account.temp_password_expired(now));

        account.is_temp_password = false;
        assert!(!account.temp_password_expired(now));

        account.is_temp_password = true;
        account.temp_password_expires_at = Some(now + Duration::hours(1));
        assert!(!account.temp_password_expired(now));
    }

    #[test]
    fn normalize_phone_strips_prefix_and_whitespace() {
        assert_eq!(normalize_phone("+91 98765 43210"), "9876543210");
        assert_eq!(normalize_phone("919876543210"), "9876543210");
        assert_eq!(normalize_phone("9876543210"), "9876543210");
    }

    #[test]
    fn display_phone_adds_country_prefix() {
        assert_eq!(display_phone("9876543210"), "+919876543210");
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn role_round_trips_as_str() {
        for role in [
            Role::Admin,
            Role::User,
            Role::Manager,
            Role::Developer,
            Role::Designer,
            Role::Analyst,
        ] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn public_projection_has_no_hash() {
        let account = user(PasswordState::Done, false);
        let public = account.public();
        let json = serde_json::to_value(&public).expect("serialize");
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "alice@example.com");
    }
}
