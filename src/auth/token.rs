//! Compact session tokens (JWT, HS256).
//!
//! Tokens are self-contained: signature plus `exp` are the only state, and
//! there is no server-side revocation list. Authorization therefore always
//! re-fetches the live account (see `AuthService::authenticate`) instead of
//! trusting claims beyond identity.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::models::{Role, UserId};

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 7 * 24;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

pub struct TokenIssuer {
    secret: SecretString,
    ttl: Duration,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: SecretString, ttl_hours: i64) -> Self {
        Self {
            secret,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Sign a token carrying the user's id, email, and role.
    pub fn issue(&self, user_id: UserId, email: &str, role: Role) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )
        .context("failed to sign session token")
    }

    /// Check signature and expiry together. Tampering and expiry both yield
    /// a typed failure; claims are never returned partially.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })
    }
}
