//! Account-lifecycle orchestrator.
//!
//! Owns every business invariant of the signup, verification, login,
//! password-change and admin-provisioning flows. Stores, hasher, token
//! issuer and notifier are collaborators; HTTP concerns stay outside.
//!
//! Notification dispatch is spawn-and-log: once a flow has persisted its
//! state, delivery failures are logged and never surfaced to the caller.

use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, Utc};
use tracing::{error, info};

use super::accounts::{AccountStore, CreateOutcome, NewAdminUser, NewUser};
use super::error::AuthError;
use super::models::{
    normalize_email, normalize_phone, OtpPurpose, PasswordState, PublicUser, Role, User, UserId,
    UserStatus,
};
use super::notify::{Notifier, Recipient};
use super::otp::OtpStore;
use super::token::{TokenError, TokenIssuer};
use super::{hasher, secrets};

pub const DEFAULT_OTP_TTL_MINUTES: i64 = 10;
pub const DEFAULT_TEMP_PASSWORD_TTL_HOURS: i64 = 24;
const NOTIFY_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Explicit deployment mode. Never inferred: secrets are echoed in
/// responses only under `Development`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Production,
    Development,
}

impl RunMode {
    #[must_use]
    pub const fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Tunables for the orchestrator, env-driven through the CLI.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    run_mode: RunMode,
    otp_ttl_minutes: i64,
    temp_password_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Production,
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
            temp_password_ttl_hours: DEFAULT_TEMP_PASSWORD_TTL_HOURS,
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_run_mode(mut self, run_mode: RunMode) -> Self {
        self.run_mode = run_mode;
        self
    }

    #[must_use]
    pub const fn with_otp_ttl_minutes(mut self, minutes: i64) -> Self {
        self.otp_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub const fn with_temp_password_ttl_hours(mut self, hours: i64) -> Self {
        self.temp_password_ttl_hours = hours;
        self
    }

    #[must_use]
    pub const fn run_mode(&self) -> RunMode {
        self.run_mode
    }
}

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AdminCreateInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    /// When absent a temporary password is generated and a forced change
    /// is pending.
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct SignupOutcome {
    pub user_id: UserId,
    /// National number the code was sent to.
    pub phone: String,
    /// Raw code, development mode only.
    pub debug_code: Option<String>,
}

#[derive(Debug)]
pub struct OtpIssued {
    pub debug_code: Option<String>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub must_change_password: bool,
    pub user: PublicUser,
}

#[derive(Debug)]
pub struct AdminCreateOutcome {
    pub user: PublicUser,
    /// Raw temporary password, development mode only.
    pub debug_password: Option<String>,
}

pub struct AuthService {
    accounts: AccountStore,
    otps: OtpStore,
    tokens: TokenIssuer,
    notifier: Arc<dyn Notifier>,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        accounts: AccountStore,
        otps: OtpStore,
        tokens: TokenIssuer,
        notifier: Arc<dyn Notifier>,
        config: AuthConfig,
    ) -> Self {
        Self {
            accounts,
            otps,
            tokens,
            notifier,
            config,
        }
    }

    /// Self-service registration. The account starts unverified; the
    /// verification code goes out over SMS and the signup succeeds even if
    /// delivery fails, since the code can be resent.
    pub async fn signup(&self, input: SignupInput) -> Result<SignupOutcome, AuthError> {
        let email = normalize_email(&input.email);
        let phone = normalize_phone(&input.phone);

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }
        if self.accounts.find_by_phone(&phone).await?.is_some() {
            return Err(AuthError::PhoneTaken);
        }

        let password_hash = hash_blocking(input.password).await?;
        let user_id = match self
            .accounts
            .create_self_registered(&NewUser {
                name: &input.name,
                email: &email,
                phone: &phone,
                password_hash: &password_hash,
            })
            .await?
        {
            CreateOutcome::Created(id) => id,
            // The pre-checks race; the unique indexes have the last word.
            CreateOutcome::DuplicateEmail => return Err(AuthError::EmailTaken),
            CreateOutcome::DuplicatePhone => return Err(AuthError::PhoneTaken),
        };
        info!(user_id, "user signed up");

        let recipient = Recipient {
            name: input.name,
            email,
            phone: Some(phone.clone()),
        };
        let code = self.issue_otp(user_id, recipient).await?;
        Ok(SignupOutcome {
            user_id,
            phone,
            debug_code: self.debug_secret(code),
        })
    }

    /// Re-deliver a signup code over SMS.
    pub async fn resend_otp(&self, email: &str) -> Result<OtpIssued, AuthError> {
        let user = self.lookup_unverified(email).await?;
        let Some(phone) = user.phone.clone() else {
            return Err(AuthError::NoPhoneOnFile);
        };
        let recipient = Recipient {
            name: user.name,
            email: user.email,
            phone: Some(phone),
        };
        let code = self.issue_otp(user.id, recipient).await?;
        Ok(OtpIssued {
            debug_code: self.debug_secret(code),
        })
    }

    /// Same as resend, over the email channel instead of SMS.
    pub async fn send_otp(&self, email: &str) -> Result<OtpIssued, AuthError> {
        let user = self.lookup_unverified(email).await?;
        let recipient = Recipient {
            name: user.name,
            email: user.email,
            phone: None,
        };
        let code = self.issue_otp(user.id, recipient).await?;
        Ok(OtpIssued {
            debug_code: self.debug_secret(code),
        })
    }

    /// Burn the code, flip the account to verified, hand out a session.
    /// Wrong and expired codes are indistinguishable by design.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let Some(mut user) = self.accounts.find_by_email(&email).await? else {
            return Err(AuthError::AccountNotFound);
        };
        let Some(record) = self
            .otps
            .find_valid(user.id, code, OtpPurpose::Signup, Utc::now())
            .await?
        else {
            return Err(AuthError::OtpInvalidOrExpired);
        };
        self.otps.mark_used(record.id).await?;
        self.accounts.mark_verified(user.id).await?;
        user.is_verified = true;
        info!(user_id = user.id, "user verified");

        let token = self.tokens.issue(user.id, &user.email, user.role)?;
        Ok(LoginOutcome {
            token,
            must_change_password: user.must_change_password(),
            user: user.public(),
        })
    }

    /// Login gate sequence. Credential failures are reported with one
    /// shared message whether the account exists or not.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.accounts.find_by_email(&email).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_blocking(password.to_string(), user.password_hash.clone()).await? {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_verified {
            return Err(AuthError::NotVerified);
        }
        if user.status == UserStatus::Inactive {
            return Err(AuthError::AccountDeactivated);
        }
        if user.temp_password_expired(Utc::now()) {
            return Err(AuthError::TempPasswordExpired);
        }

        let token = self.tokens.issue(user.id, &user.email, user.role)?;
        info!(user_id = user.id, "user logged in");
        Ok(LoginOutcome {
            token,
            must_change_password: user.must_change_password(),
            user: user.public(),
        })
    }

    /// Authenticated password change. Clears the temporary-password state
    /// and returns a fresh session reflecting it.
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.accounts.find_by_email(&email).await? else {
            return Err(AuthError::AccountGone);
        };
        if !verify_blocking(current_password.to_string(), user.password_hash.clone()).await? {
            return Err(AuthError::WrongCurrentPassword);
        }
        self.check_and_store(&user, new_password).await?;
        self.notify_password_changed(&user);

        // Fresh session reflecting the cleared temp-password state.
        let token = self.tokens.issue(user.id, &user.email, user.role)?;
        let mut user = user;
        user.password_state = PasswordState::Done;
        user.is_temp_password = false;
        user.temp_password_expires_at = None;
        Ok(LoginOutcome {
            token,
            must_change_password: false,
            user: user.public(),
        })
    }

    /// Unauthenticated email-only reset. This flow proves possession of
    /// nothing but the email string itself; it is kept as-is deliberately
    /// rather than silently upgraded.
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.accounts.find_by_email(&email).await? else {
            return Err(AuthError::AccountNotFound);
        };
        self.check_and_store(&user, new_password).await?;
        self.notify_password_changed(&user);
        Ok(())
    }

    /// Admin provisioning. Both sub-paths produce a pre-verified account;
    /// the generated-password path additionally arms the forced-change
    /// state with a 24h (configurable) expiry.
    pub async fn admin_create_user(
        &self,
        admin_id: UserId,
        input: AdminCreateInput,
    ) -> Result<AdminCreateOutcome, AuthError> {
        let email = normalize_email(&input.email);
        let phone = input.phone.as_deref().map(normalize_phone);

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }
        if let Some(phone) = phone.as_deref() {
            if self.accounts.find_by_phone(phone).await?.is_some() {
                return Err(AuthError::PhoneTaken);
            }
        }

        let generated = if input.password.is_none() {
            Some(secrets::generate_temp_password())
        } else {
            None
        };
        let plaintext = match (&input.password, &generated) {
            (Some(p), _) => p.clone(),
            (None, Some(p)) => p.clone(),
            (None, None) => return Err(anyhow!("no password available").into()),
        };
        let password_hash = hash_blocking(plaintext).await?;

        let (password_state, is_temp_password, expires_at) = if generated.is_some() {
            (
                PasswordState::Pending,
                true,
                Some(Utc::now() + Duration::hours(self.config.temp_password_ttl_hours)),
            )
        } else {
            (PasswordState::Done, false, None)
        };

        let user_id = match self
            .accounts
            .create_by_admin(&NewAdminUser {
                name: &input.name,
                email: &email,
                phone: phone.as_deref(),
                department: input.department.as_deref(),
                role: input.role,
                status: input.status,
                password_hash: &password_hash,
                password_state,
                is_temp_password,
                temp_password_expires_at: expires_at,
                created_by_admin: admin_id,
            })
            .await?
        {
            CreateOutcome::Created(id) => id,
            CreateOutcome::DuplicateEmail => return Err(AuthError::EmailTaken),
            CreateOutcome::DuplicatePhone => return Err(AuthError::PhoneTaken),
        };
        info!(user_id, admin_id, "admin created user");

        if let Some(temp_password) = &generated {
            let notifier = Arc::clone(&self.notifier);
            let recipient = Recipient {
                name: input.name.clone(),
                email: email.clone(),
                phone: phone.clone(),
            };
            let temp_password = temp_password.clone();
            let expires_hours = self.config.temp_password_ttl_hours;
            dispatch("temp-password", async move {
                notifier
                    .send_temp_password(&recipient, &temp_password, expires_hours)
                    .await
            });
        }

        let user = self
            .accounts
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| anyhow!("user {user_id} missing right after insert"))?;
        Ok(AdminCreateOutcome {
            user,
            debug_password: generated.and_then(|p| self.debug_secret(p)),
        })
    }

    /// Per-request token gate. Claims prove identity only; authorization
    /// state is re-read live so deactivation and deletion bite immediately.
    pub async fn authenticate(&self, token: &str) -> Result<PublicUser, AuthError> {
        let claims = self.tokens.verify(token).map_err(|err| match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid => AuthError::TokenInvalid,
        })?;
        let Some(user) = self.accounts.find_by_id(claims.sub).await? else {
            return Err(AuthError::AccountGone);
        };
        if user.status == UserStatus::Inactive {
            return Err(AuthError::AccountDeactivated);
        }
        Ok(user)
    }

    #[must_use]
    pub const fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub const fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    /// Invalidate-then-create, strictly sequenced so only the newest code
    /// can verify, then dispatch without blocking the caller.
    async fn issue_otp(&self, user_id: UserId, recipient: Recipient) -> Result<String, AuthError> {
        self.otps
            .invalidate_previous(user_id, OtpPurpose::Signup)
            .await?;
        let code = secrets::generate_otp();
        let expires_at = Utc::now() + Duration::minutes(self.config.otp_ttl_minutes);
        self.otps
            .create(user_id, &code, OtpPurpose::Signup, expires_at)
            .await?;

        let notifier = Arc::clone(&self.notifier);
        let expires_minutes = self.config.otp_ttl_minutes;
        let outbound = code.clone();
        dispatch("otp", async move {
            notifier
                .send_otp(&recipient, &outbound, expires_minutes)
                .await
        });
        Ok(code)
    }

    /// Shared resend/send-otp precondition checks.
    async fn lookup_unverified(&self, email: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.accounts.find_by_email(&email).await? else {
            return Err(AuthError::AccountNotFound);
        };
        if user.is_verified {
            return Err(AuthError::AlreadyVerified);
        }
        Ok(user)
    }

    /// Same-password check plus the atomic hash-and-clear-flags write.
    async fn check_and_store(&self, user: &User, new_password: &str) -> Result<(), AuthError> {
        if verify_blocking(new_password.to_string(), user.password_hash.clone()).await? {
            return Err(AuthError::SamePassword);
        }
        let new_hash = hash_blocking(new_password.to_string()).await?;
        self.accounts.update_password(user.id, &new_hash).await?;
        info!(user_id = user.id, "password updated");
        Ok(())
    }

    fn notify_password_changed(&self, user: &User) {
        let notifier = Arc::clone(&self.notifier);
        let recipient = Recipient {
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        };
        dispatch("password-changed", async move {
            notifier.send_password_changed(&recipient).await
        });
    }

    /// Secrets are echoed to the caller only in development mode.
    fn debug_secret(&self, secret: String) -> Option<String> {
        self.config.run_mode.is_development().then_some(secret)
    }
}

/// bcrypt keeps its deliberate CPU cost; both directions run off the async
/// runtime threads.
async fn hash_blocking(password: String) -> Result<String, AuthError> {
    let hash = tokio::task::spawn_blocking(move || hasher::hash(&password))
        .await
        .context("password hashing task failed")??;
    Ok(hash)
}

async fn verify_blocking(password: String, stored_hash: String) -> Result<bool, AuthError> {
    let ok = tokio::task::spawn_blocking(move || hasher::verify(&password, &stored_hash))
        .await
        .context("password verification task failed")?;
    Ok(ok)
}

/// Spawn-and-log delivery with a hard timeout. The flow that queued the
/// message has already persisted; failures are observability, not errors.
fn dispatch<F>(what: &'static str, send: F)
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(NOTIFY_TIMEOUT, send).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(what, error = %err, "notification dispatch failed"),
            Err(_) => error!(what, "notification dispatch timed out"),
        }
    });
}
