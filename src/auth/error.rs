//! Typed failure taxonomy returned by the orchestrator.
//!
//! Business failures carry the exact user-facing message; the HTTP layer
//! translates variants to statuses 1:1 and never rewrites the text. The
//! `InvalidCredentials` message is deliberately shared between "no such
//! account" and "wrong password" so callers cannot probe for accounts.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("An account with this email already exists.")]
    EmailTaken,

    #[error("An account with this phone number already exists.")]
    PhoneTaken,

    #[error("No account found with that email.")]
    AccountNotFound,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Please verify your mobile number before logging in.")]
    NotVerified,

    #[error("Your account has been deactivated. Please contact an administrator.")]
    AccountDeactivated,

    #[error("Your temporary password has expired. Please contact an administrator to reset it.")]
    TempPasswordExpired,

    #[error("OTP is invalid or has expired. Please request a new one.")]
    OtpInvalidOrExpired,

    #[error("This account is already verified.")]
    AlreadyVerified,

    #[error("No phone number registered for this account.")]
    NoPhoneOnFile,

    #[error("Current password is incorrect.")]
    WrongCurrentPassword,

    #[error("New password must be different from your current password.")]
    SamePassword,

    #[error("{0}")]
    Validation(String),

    #[error("No token provided. Access denied.")]
    MissingToken,

    #[error("Token has expired. Please log in again.")]
    TokenExpired,

    #[error("Invalid token.")]
    TokenInvalid,

    #[error("User no longer exists.")]
    AccountGone,

    #[error("Access denied. Required role: {0}.")]
    RoleDenied(String),

    #[error("You must change your temporary password before accessing this resource.")]
    PasswordChangeRequired,

    /// Unexpected store/signing failure. Logged in full server-side,
    /// rendered as an opaque generic message.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// True for the opaque internal category, false for every business rule.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
