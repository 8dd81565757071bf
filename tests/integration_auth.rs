//! Flow tests against a live Postgres.
//!
//! Skipped unless `PANNELLO_TEST_DSN` points at a disposable database; the
//! schema is migrated on first connect. Every test works with its own
//! unique email/phone so the suite can run concurrently and repeatedly
//! against the same database. Expiry scenarios rewrite timestamps directly
//! instead of sleeping.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use pannello::auth::accounts::AccountStore;
use pannello::auth::error::AuthError;
use pannello::auth::notify::{Notifier, Recipient};
use pannello::auth::otp::OtpStore;
use pannello::auth::service::{AdminCreateInput, SignupInput};
use pannello::auth::token::TokenIssuer;
use pannello::auth::{AuthConfig, AuthService, RunMode};
use pannello::auth::models::{Role, UserStatus};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use ulid::Ulid;

/// Captures outbound messages instead of delivering them.
#[derive(Default)]
struct RecordingNotifier {
    otps: Mutex<Vec<(String, String)>>,
    temp_passwords: Mutex<Vec<(String, String)>>,
    confirmations: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_otp(&self, to: &Recipient, code: &str, _expires_minutes: i64) -> Result<()> {
        self.otps
            .lock()
            .expect("lock")
            .push((to.email.clone(), code.to_string()));
        Ok(())
    }

    async fn send_temp_password(
        &self,
        to: &Recipient,
        temp_password: &str,
        _expires_hours: i64,
    ) -> Result<()> {
        self.temp_passwords
            .lock()
            .expect("lock")
            .push((to.email.clone(), temp_password.to_string()));
        Ok(())
    }

    async fn send_password_changed(&self, to: &Recipient) -> Result<()> {
        self.confirmations.lock().expect("lock").push(to.email.clone());
        Ok(())
    }
}

struct TestContext {
    pool: PgPool,
    service: AuthService,
    notifier: Arc<RecordingNotifier>,
}

async fn setup() -> Result<Option<TestContext>> {
    let Ok(dsn) = std::env::var("PANNELLO_TEST_DSN") else {
        eprintln!("PANNELLO_TEST_DSN not set, skipping");
        return Ok(None);
    };
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&dsn)
        .await
        .context("Failed to connect to test database")?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let notifier = Arc::new(RecordingNotifier::default());
    let service = AuthService::new(
        AccountStore::new(pool.clone()),
        OtpStore::new(pool.clone()),
        TokenIssuer::new("integration-test-secret".to_string().into(), 1),
        notifier.clone(),
        AuthConfig::new().with_run_mode(RunMode::Development),
    );
    Ok(Some(TestContext {
        pool,
        service,
        notifier,
    }))
}

fn unique_email(tag: &str) -> String {
    format!("{tag}-{}@example.com", Ulid::new().to_string().to_lowercase())
}

/// Distinct 10-digit phone per call.
fn unique_phone() -> String {
    let suffix = Ulid::new().0 % 1_000_000_000;
    format!("9{suffix:09}")
}

fn signup_input(email: &str, phone: &str) -> SignupInput {
    SignupInput {
        name: "Alice".to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        password: "Passw0rd1".to_string(),
    }
}

/// Seed an admin account outside the orchestrator; `created_by_admin`
/// stays NULL for the bootstrap row.
async fn seed_admin(pool: &PgPool) -> Result<i64> {
    let email = unique_email("admin");
    let hash = pannello::auth::hasher::hash("AdminPass1")?;
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO users
            (name, email, password_hash, role, is_verified, is_password_changed)
         VALUES ($1, $2, $3, 'admin', TRUE, TRUE)
         RETURNING id",
    )
    .bind("Root Admin")
    .bind(&email)
    .bind(&hash)
    .fetch_one(pool)
    .await?;
    Ok(row.0)
}

#[tokio::test]
async fn signup_then_duplicates_conflict() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("dup");
    let phone = unique_phone();

    let outcome = ctx.service.signup(signup_input(&email, &phone)).await?;
    assert!(outcome.user_id > 0);
    assert_eq!(outcome.phone, phone);
    // Development mode echoes the code.
    assert!(outcome.debug_code.is_some());

    let same_email = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await;
    assert!(matches!(same_email, Err(AuthError::EmailTaken)));

    let same_phone = ctx
        .service
        .signup(signup_input(&unique_email("dup2"), &phone))
        .await;
    assert!(matches!(same_phone, Err(AuthError::PhoneTaken)));
    Ok(())
}

#[tokio::test]
async fn issue_keeps_at_most_one_valid_code() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("otp");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    let first_code = outcome.debug_code.context("debug code")?;

    let reissued = ctx.service.resend_otp(&email).await?;
    let second_code = reissued.debug_code.context("debug code")?;

    let (live,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM otp_verifications
         WHERE user_id = $1 AND used = FALSE AND expires_at > NOW()",
    )
    .bind(outcome.user_id)
    .fetch_one(&ctx.pool)
    .await?;
    assert_eq!(live, 1);

    // The superseded code is dead even when it differs from the new one.
    if first_code != second_code {
        let stale = ctx.service.verify_otp(&email, &first_code).await;
        assert!(matches!(stale, Err(AuthError::OtpInvalidOrExpired)));
    }
    let verified = ctx.service.verify_otp(&email, &second_code).await?;
    assert!(verified.user.is_verified);
    Ok(())
}

#[tokio::test]
async fn wrong_code_then_right_code() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("verify");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    let code = outcome.debug_code.context("debug code")?;
    let wrong = if code == "000000" { "000001" } else { "000000" };

    let rejected = ctx.service.verify_otp(&email, wrong).await;
    assert!(matches!(rejected, Err(AuthError::OtpInvalidOrExpired)));

    let verified = ctx.service.verify_otp(&email, &code).await?;
    assert!(!verified.token.is_empty());
    assert!(verified.user.is_verified);

    // Burned codes cannot verify twice.
    let replay = ctx.service.verify_otp(&email, &code).await;
    assert!(matches!(replay, Err(AuthError::OtpInvalidOrExpired)));

    // And the notifier saw the signup plus nothing unexpected.
    let sent = ctx.notifier.otps.lock().expect("lock").clone();
    assert!(sent.iter().any(|(to, c)| to == &email && c == &code));
    Ok(())
}

#[tokio::test]
async fn login_gates_fire_in_order() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("login");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    let code = outcome.debug_code.context("debug code")?;

    // Unverified accounts with correct credentials are told to verify.
    let unverified = ctx.service.login(&email, "Passw0rd1").await;
    assert!(matches!(unverified, Err(AuthError::NotVerified)));

    ctx.service.verify_otp(&email, &code).await?;
    let session = ctx.service.login(&email, "Passw0rd1").await?;
    assert!(!session.must_change_password);

    // Deactivation bites at the next login and the next token check.
    sqlx::query("UPDATE users SET status = 'inactive' WHERE id = $1")
        .bind(outcome.user_id)
        .execute(&ctx.pool)
        .await?;
    let inactive = ctx.service.login(&email, "Passw0rd1").await;
    assert!(matches!(inactive, Err(AuthError::AccountDeactivated)));
    let gated = ctx.service.authenticate(&session.token).await;
    assert!(matches!(gated, Err(AuthError::AccountDeactivated)));
    Ok(())
}

#[tokio::test]
async fn invalid_credentials_are_indistinguishable() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("creds");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    let code = outcome.debug_code.context("debug code")?;
    ctx.service.verify_otp(&email, &code).await?;

    let wrong_password = ctx
        .service
        .login(&email, "NotThePassword1")
        .await
        .expect_err("wrong password must fail");
    let unknown_email = ctx
        .service
        .login(&unique_email("ghost"), "Passw0rd1")
        .await
        .expect_err("unknown email must fail");
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    Ok(())
}

#[tokio::test]
async fn admin_temp_password_lifecycle() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let admin_id = seed_admin(&ctx.pool).await?;
    let email = unique_email("provisioned");

    let created = ctx
        .service
        .admin_create_user(
            admin_id,
            AdminCreateInput {
                name: "Bob".to_string(),
                email: email.clone(),
                phone: None,
                department: Some("Engineering".to_string()),
                role: Role::Developer,
                status: UserStatus::Active,
                password: None,
            },
        )
        .await?;
    assert!(created.user.is_verified);
    assert!(created.user.is_temp_password);
    let temp_password = created.debug_password.context("debug password")?;

    // The welcome notice carried the same password.
    let notices = ctx.notifier.temp_passwords.lock().expect("lock").clone();
    assert!(notices
        .iter()
        .any(|(to, p)| to == &email && p == &temp_password));

    // Login works before expiry and demands a change.
    let session = ctx.service.login(&email, &temp_password).await?;
    assert!(session.must_change_password);

    // Past the expiry, login is blocked entirely.
    sqlx::query("UPDATE users SET temp_password_expires_at = $2 WHERE id = $1")
        .bind(created.user.id)
        .bind(Utc::now() - Duration::hours(1))
        .execute(&ctx.pool)
        .await?;
    let expired = ctx.service.login(&email, &temp_password).await;
    assert!(matches!(expired, Err(AuthError::TempPasswordExpired)));

    // An admin reset of the expiry lets the change-password flow clear
    // the forced state.
    sqlx::query("UPDATE users SET temp_password_expires_at = $2 WHERE id = $1")
        .bind(created.user.id)
        .bind(Utc::now() + Duration::hours(1))
        .execute(&ctx.pool)
        .await?;
    let changed = ctx
        .service
        .change_password(&email, &temp_password, "BrandNewPass1")
        .await?;
    assert!(!changed.must_change_password);
    let fresh = ctx.service.login(&email, "BrandNewPass1").await?;
    assert!(!fresh.must_change_password);
    Ok(())
}

#[tokio::test]
async fn admin_explicit_password_logs_in_directly() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let admin_id = seed_admin(&ctx.pool).await?;
    let email = unique_email("explicit");

    let created = ctx
        .service
        .admin_create_user(
            admin_id,
            AdminCreateInput {
                name: "Carol".to_string(),
                email: email.clone(),
                phone: Some(unique_phone()),
                department: None,
                role: Role::User,
                status: UserStatus::Active,
                password: Some("ChosenPass1".to_string()),
            },
        )
        .await?;
    assert!(created.user.is_verified);
    assert!(!created.user.is_temp_password);
    assert!(created.debug_password.is_none());

    let session = ctx.service.login(&email, "ChosenPass1").await?;
    assert!(!session.must_change_password);
    Ok(())
}

#[tokio::test]
async fn same_password_change_leaves_hash_untouched() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("same");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    let code = outcome.debug_code.context("debug code")?;
    ctx.service.verify_otp(&email, &code).await?;

    let (before,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
        .bind(outcome.user_id)
        .fetch_one(&ctx.pool)
        .await?;

    let rejected = ctx
        .service
        .change_password(&email, "Passw0rd1", "Passw0rd1")
        .await;
    assert!(matches!(rejected, Err(AuthError::SamePassword)));

    let (after,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
        .bind(outcome.user_id)
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn reset_password_trusts_the_email_alone() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("reset");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    let code = outcome.debug_code.context("debug code")?;
    ctx.service.verify_otp(&email, &code).await?;

    ctx.service.reset_password(&email, "AfterReset1").await?;
    let session = ctx.service.login(&email, "AfterReset1").await?;
    assert!(!session.must_change_password);

    let ghost = ctx
        .service
        .reset_password(&unique_email("nobody"), "AfterReset1")
        .await;
    assert!(matches!(ghost, Err(AuthError::AccountNotFound)));
    Ok(())
}

#[tokio::test]
async fn soft_delete_is_idempotent_and_frees_nothing_twice() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("delete");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;

    let accounts = ctx.service.accounts();
    assert_eq!(accounts.soft_delete(outcome.user_id).await?, 1);
    assert_eq!(accounts.soft_delete(outcome.user_id).await?, 0);

    // Deleted rows are invisible to lookups and token checks.
    assert!(accounts.find_by_email(&email).await?.is_none());
    assert!(accounts.find_by_id(outcome.user_id).await?.is_none());

    // The freed email can sign up again.
    let again = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    assert_ne!(again.user_id, outcome.user_id);
    Ok(())
}

#[tokio::test]
async fn deleted_account_token_is_rejected() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };
    let email = unique_email("gone");
    let outcome = ctx
        .service
        .signup(signup_input(&email, &unique_phone()))
        .await?;
    let code = outcome.debug_code.context("debug code")?;
    let session = ctx.service.verify_otp(&email, &code).await?;

    assert!(ctx.service.authenticate(&session.token).await.is_ok());
    ctx.service.accounts().soft_delete(outcome.user_id).await?;
    let gated = ctx.service.authenticate(&session.token).await;
    assert!(matches!(gated, Err(AuthError::AccountGone)));
    Ok(())
}
