//! Authentication and account-lifecycle core.
//!
//! The orchestrator in [`service`] is the only entry point the HTTP layer
//! talks to; everything else here is a collaborator it coordinates.

pub mod accounts;
pub mod error;
pub mod hasher;
pub mod models;
pub mod notify;
pub mod otp;
pub mod secrets;
pub mod service;
pub mod token;

pub use error::AuthError;
pub use service::{AuthConfig, AuthService, RunMode};
