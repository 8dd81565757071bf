use std::sync::Arc;

use axum::extract::Extension;
use axum::response::{Json, Response};

use super::types::{EmailRequest, OtpData, SessionData, VerifyOtpRequest};
use crate::api::handlers::require_email;
use crate::api::response;
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    post,
    path = "/api/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account verified, session issued", body = SessionData),
        (status = 400, description = "Code is wrong or expired"),
        (status = 404, description = "No account for that email"),
    ),
    tag = "auth",
)]
pub async fn verify_otp(
    Extension(service): Extension<Arc<AuthService>>,
    Json(body): Json<VerifyOtpRequest>,
) -> Result<Response, AuthError> {
    require_email(&body.email)?;
    if body.otp.trim().is_empty() {
        return Err(AuthError::Validation("OTP is required.".into()));
    }

    let outcome = service.verify_otp(&body.email, body.otp.trim()).await?;
    Ok(response::ok(
        "Account verified successfully.",
        Some(SessionData {
            token: outcome.token,
            must_change_password: outcome.must_change_password,
            user: outcome.user,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New code sent over SMS"),
        (status = 400, description = "Already verified or no phone on file"),
        (status = 404, description = "No account for that email"),
    ),
    tag = "auth",
)]
pub async fn resend_otp(
    Extension(service): Extension<Arc<AuthService>>,
    Json(body): Json<EmailRequest>,
) -> Result<Response, AuthError> {
    require_email(&body.email)?;
    let issued = service.resend_otp(&body.email).await?;
    Ok(response::ok(
        "OTP sent to your registered mobile number.",
        Some(OtpData {
            otp: issued.debug_code,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/send-otp",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New code sent over email"),
        (status = 400, description = "Already verified"),
        (status = 404, description = "No account for that email"),
    ),
    tag = "auth",
)]
pub async fn send_otp(
    Extension(service): Extension<Arc<AuthService>>,
    Json(body): Json<EmailRequest>,
) -> Result<Response, AuthError> {
    require_email(&body.email)?;
    let issued = service.send_otp(&body.email).await?;
    Ok(response::ok(
        "OTP sent to your email address.",
        Some(OtpData {
            otp: issued.debug_code,
        }),
    ))
}
