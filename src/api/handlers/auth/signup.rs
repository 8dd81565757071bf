use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{Json, Response};

use super::types::{SignupData, SignupRequest};
use crate::api::handlers::{require_email, require_name, require_password, valid_phone};
use crate::api::response;
use crate::auth::models::{display_phone, normalize_phone};
use crate::auth::service::SignupInput;
use crate::auth::{AuthError, AuthService};

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, verification code sent"),
        (status = 400, description = "Malformed input"),
        (status = 409, description = "Email or phone already registered"),
    ),
    tag = "auth",
)]
pub async fn signup(
    Extension(service): Extension<Arc<AuthService>>,
    Json(body): Json<SignupRequest>,
) -> Result<Response, AuthError> {
    require_name(&body.name)?;
    require_email(&body.email)?;
    if !valid_phone(&normalize_phone(&body.phone)) {
        return Err(AuthError::Validation(
            "Please provide a valid 10-digit phone number.".into(),
        ));
    }
    require_password(&body.password)?;

    let outcome = service
        .signup(SignupInput {
            name: body.name.trim().to_string(),
            email: body.email,
            phone: body.phone,
            password: body.password,
        })
        .await?;

    let message = format!(
        "OTP sent to {}. Please verify to activate your account.",
        display_phone(&outcome.phone)
    );
    Ok(response::success(
        StatusCode::CREATED,
        message,
        Some(SignupData {
            user_id: outcome.user_id,
            otp: outcome.debug_code,
        }),
    ))
}
