//! JSON envelope and error rendering.
//!
//! Every response is `{success, message, data}`. Business failures map 1:1
//! to a status and carry their own message; internal failures are logged in
//! full and rendered opaque.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::auth::AuthError;

pub const INTERNAL_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub fn success<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: Option<T>,
) -> Response {
    (
        status,
        Json(Envelope {
            success: true,
            message: message.into(),
            data,
        }),
    )
        .into_response()
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: Option<T>) -> Response {
    success(StatusCode::OK, message, data)
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::EmailTaken | AuthError::PhoneTaken => StatusCode::CONFLICT,
            AuthError::AccountNotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials
            | AuthError::WrongCurrentPassword
            | AuthError::MissingToken
            | AuthError::TokenExpired
            | AuthError::TokenInvalid
            | AuthError::AccountGone => StatusCode::UNAUTHORIZED,
            AuthError::NotVerified
            | AuthError::AccountDeactivated
            | AuthError::TempPasswordExpired
            | AuthError::RoleDenied(_)
            | AuthError::PasswordChangeRequired => StatusCode::FORBIDDEN,
            AuthError::OtpInvalidOrExpired
            | AuthError::AlreadyVerified
            | AuthError::NoPhoneOnFile
            | AuthError::SamePassword
            | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if let AuthError::Internal(err) = &self {
            error!(error = ?err, "request failed");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let mut body = json!({ "success": false, "message": message });
        // The front end keys its forced-change redirect off this field.
        if matches!(self, AuthError::PasswordChangeRequired) {
            body["must_change_password"] = Value::Bool(true);
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_omits_absent_data() {
        let envelope: Envelope<Value> = Envelope {
            success: true,
            message: "ok".to_string(),
            data: None,
        };
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert!(json.get("data").is_none());
        assert_eq!(json["success"], true);
    }

    #[test]
    fn conflict_maps_to_409() {
        let response = AuthError::EmailTaken.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn internal_is_opaque_500() {
        let response = AuthError::from(anyhow::anyhow!("pool timeout")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
