//! Route handlers and shared request validation.
//!
//! Body shape is validated here so the orchestrator only ever sees
//! well-formed input; validation failures carry field-specific messages.

pub mod admin;
pub mod auth;
pub mod health;

use axum::response::IntoResponse;
use regex::Regex;

use crate::auth::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Lightweight email sanity check before the orchestrator normalizes it.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// Ten-digit national number after normalization.
#[must_use]
pub fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^[0-9]{10}$").is_ok_and(|re| re.is_match(phone))
}

pub fn require_email(email: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::Validation("Email address is required.".into()));
    }
    if !valid_email(email.trim()) {
        return Err(AuthError::Validation(
            "Please provide a valid email address.".into(),
        ));
    }
    Ok(())
}

pub fn require_password(password: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::Validation("Password is required.".into()));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long."
        )));
    }
    Ok(())
}

pub fn require_name(name: &str) -> Result<(), AuthError> {
    if name.trim().is_empty() {
        return Err(AuthError::Validation("Name is required.".into()));
    }
    Ok(())
}

/// Service banner on `/`.
pub async fn root() -> impl IntoResponse {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
