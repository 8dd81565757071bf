//! Request gates.
//!
//! `require_auth` validates the bearer token and attaches the live account
//! to the request; the role and password gates read that extension and run
//! after it in the layer stack.

use std::sync::Arc;

use axum::extract::{Extension, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::models::{PublicUser, Role};
use crate::auth::{AuthError, AuthService};

/// Live account of the authenticated caller, re-read from the store on
/// every request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub PublicUser);

pub async fn require_auth(
    Extension(service): Extension<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return AuthError::MissingToken.into_response();
    };
    match service.authenticate(&token).await {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

pub async fn require_admin(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Response {
    if user.role != Role::Admin {
        return AuthError::RoleDenied(Role::Admin.to_string()).into_response();
    }
    next.run(request).await
}

/// Blocks everything except the change-password endpoint while a forced
/// change is pending.
pub async fn require_password_changed(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    request: Request,
    next: Next,
) -> Response {
    if user.must_change_password() {
        return AuthError::PasswordChangeRequired.into_response();
    }
    next.run(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_strips_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn bare_token_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn missing_or_empty_header_yields_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
