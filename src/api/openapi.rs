//! OpenAPI document assembled from the `#[utoipa::path]` annotations.

use axum::response::{IntoResponse, Json};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{admin, auth, health};
use crate::auth::models::{PasswordState, PublicUser, Role, UserStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pannello",
        description = "Admin dashboard backend: authentication and account lifecycle",
    ),
    paths(
        health::health,
        auth::signup::signup,
        auth::login::login,
        auth::otp::verify_otp,
        auth::otp::resend_otp,
        auth::otp::send_otp,
        auth::password::change_password,
        auth::password::reset_password,
        admin::create_user,
        admin::list_users,
        admin::update_user,
        admin::delete_user,
        admin::delete_users,
    ),
    components(schemas(
        health::Health,
        auth::types::SignupRequest,
        auth::types::LoginRequest,
        auth::types::VerifyOtpRequest,
        auth::types::EmailRequest,
        auth::types::ChangePasswordRequest,
        auth::types::ResetPasswordRequest,
        auth::types::SignupData,
        auth::types::OtpData,
        auth::types::SessionData,
        admin::AdminCreateRequest,
        admin::UpdateUserRequest,
        admin::BulkDeleteRequest,
        admin::AdminUserData,
        admin::UserListData,
        admin::BulkDeleteData,
        PublicUser,
        Role,
        UserStatus,
        PasswordState,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Signup, verification, login and password flows"),
        (name = "admin", description = "User management, admin role required"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Serve the generated document on `/openapi.json`.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/auth/signup",
            "/api/auth/login",
            "/api/auth/verify-otp",
            "/api/auth/resend-otp",
            "/api/auth/send-otp",
            "/api/auth/change-password",
            "/api/auth/reset-password",
            "/api/admin/users",
            "/api/admin/users/{id}",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
