use std::sync::Arc;

use axum::extract::Extension;
use axum::response::{Json, Response};

use super::types::{LoginRequest, SessionData};
use crate::api::handlers::require_email;
use crate::api::response;
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionData),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Unverified, deactivated, or expired temporary password"),
    ),
    tag = "auth",
)]
pub async fn login(
    Extension(service): Extension<Arc<AuthService>>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    require_email(&body.email)?;
    if body.password.is_empty() {
        return Err(AuthError::Validation("Password is required.".into()));
    }

    let outcome = service.login(&body.email, &body.password).await?;
    Ok(response::ok(
        "Login successful.",
        Some(SessionData {
            token: outcome.token,
            must_change_password: outcome.must_change_password,
            user: outcome.user,
        }),
    ))
}
