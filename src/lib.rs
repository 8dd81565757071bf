//! # Pannello
//!
//! Admin-dashboard auth backend: self-service signup with SMS/email OTP
//! verification, JWT sessions, forced password change for admin-provisioned
//! accounts with expiring temporary passwords, and soft-deleting user
//! management endpoints.
//!
//! The crate splits into:
//!
//! - [`auth`]: the account-lifecycle core (hasher, secret generator, token
//!   issuer, stores, notifier contract and the orchestrator).
//! - [`api`]: the axum HTTP surface translating orchestrator results into
//!   `{success, message, data}` JSON.
//! - [`cli`]: clap command line with `PANNELLO_*` env fallbacks, logging
//!   and optional OTLP trace export.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_carries_name_and_version() {
        assert!(APP_USER_AGENT.starts_with("pannello/"));
    }

    #[test]
    fn commit_hash_is_never_empty() {
        assert!(!GIT_COMMIT_HASH.is_empty());
    }
}
