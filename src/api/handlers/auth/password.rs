use std::sync::Arc;

use axum::extract::Extension;
use axum::response::{Json, Response};

use super::types::{ChangePasswordRequest, ResetPasswordRequest, SessionData};
use crate::api::handlers::{require_email, require_password};
use crate::api::middleware::CurrentUser;
use crate::api::response;
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, fresh session issued", body = SessionData),
        (status = 400, description = "New password equals the current one"),
        (status = 401, description = "Current password is wrong or token missing"),
    ),
    security(("bearer" = [])),
    tag = "auth",
)]
pub async fn change_password(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Response, AuthError> {
    if body.current_password.is_empty() {
        return Err(AuthError::Validation(
            "Current password is required.".into(),
        ));
    }
    require_password(&body.new_password)?;

    let outcome = service
        .change_password(&user.email, &body.current_password, &body.new_password)
        .await?;
    Ok(response::ok(
        "Password changed successfully.",
        Some(SessionData {
            token: outcome.token,
            must_change_password: outcome.must_change_password,
            user: outcome.user,
        }),
    ))
}

/// Accepts a bare email with no possession proof; kept that way on
/// purpose, see the flow documentation.
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "New password equals the current one"),
        (status = 404, description = "No account for that email"),
    ),
    tag = "auth",
)]
pub async fn reset_password(
    Extension(service): Extension<Arc<AuthService>>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Response, AuthError> {
    require_email(&body.email)?;
    require_password(&body.new_password)?;

    service
        .reset_password(&body.email, &body.new_password)
        .await?;
    Ok(response::ok::<()>("Password reset successfully.", None))
}
