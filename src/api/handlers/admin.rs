//! Admin user-management endpoints. Everything here sits behind the auth,
//! password-changed and admin-role gates.

use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::http::StatusCode;
use axum::response::{Json, Response};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{require_email, require_name, require_password, valid_phone};
use crate::api::middleware::CurrentUser;
use crate::api::response;
use crate::auth::accounts::{ListFilter, ProfileUpdate, UpdateOutcome};
use crate::auth::models::{normalize_email, normalize_phone, PublicUser, Role, UserId, UserStatus};
use crate::auth::service::AdminCreateInput;
use crate::auth::{AuthError, AuthService};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdminCreateRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// Omit to have a temporary password generated and delivered.
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub status: UserStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BulkDeleteRequest {
    pub ids: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminUserData {
    pub user: PublicUser,
    /// Present in development mode only, when a password was generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListData {
    pub users: Vec<PublicUser>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkDeleteData {
    pub deleted: u64,
}

#[utoipa::path(
    post,
    path = "/api/admin/users",
    request_body = AdminCreateRequest,
    responses(
        (status = 201, description = "User created", body = AdminUserData),
        (status = 409, description = "Email or phone already registered"),
    ),
    security(("bearer" = [])),
    tag = "admin",
)]
pub async fn create_user(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<AdminCreateRequest>,
) -> Result<Response, AuthError> {
    require_name(&body.name)?;
    require_email(&body.email)?;
    if let Some(phone) = body.phone.as_deref() {
        if !valid_phone(&normalize_phone(phone)) {
            return Err(AuthError::Validation(
                "Please provide a valid 10-digit phone number.".into(),
            ));
        }
    }
    if let Some(password) = body.password.as_deref() {
        require_password(password)?;
    }

    let outcome = service
        .admin_create_user(
            admin.id,
            AdminCreateInput {
                name: body.name.trim().to_string(),
                email: body.email,
                phone: body.phone,
                department: body.department,
                role: body.role.unwrap_or(Role::User),
                status: body.status.unwrap_or(UserStatus::Active),
                password: body.password,
            },
        )
        .await?;

    Ok(response::success(
        StatusCode::CREATED,
        "User created successfully.",
        Some(AdminUserData {
            user: outcome.user,
            temp_password: outcome.debug_password,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
        (status = 200, description = "Paginated user list", body = UserListData),
    ),
    security(("bearer" = [])),
    tag = "admin",
)]
pub async fn list_users(
    Extension(service): Extension<Arc<AuthService>>,
    Query(query): Query<ListQuery>,
) -> Result<Response, AuthError> {
    let filter = ListFilter {
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(20),
        search: query.search,
        role: query.role,
        status: query.status,
    };
    let (users, total) = service.accounts().list(&filter).await?;
    Ok(response::ok(
        "Users fetched successfully.",
        Some(UserListData {
            users,
            total,
            page: filter.page.max(1),
            limit: filter.limit.clamp(1, 100),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/users/{id}",
    request_body = UpdateUserRequest,
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Profile updated"),
        (status = 404, description = "No such user"),
        (status = 409, description = "Email or phone already registered"),
    ),
    security(("bearer" = [])),
    tag = "admin",
)]
pub async fn update_user(
    Extension(service): Extension<Arc<AuthService>>,
    Path(id): Path<UserId>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Response, AuthError> {
    require_name(&body.name)?;
    require_email(&body.email)?;
    let email = normalize_email(&body.email);
    let phone = body.phone.as_deref().map(normalize_phone);
    if let Some(phone) = phone.as_deref() {
        if !valid_phone(phone) {
            return Err(AuthError::Validation(
                "Please provide a valid 10-digit phone number.".into(),
            ));
        }
    }

    let outcome = service
        .accounts()
        .update_profile(
            id,
            &ProfileUpdate {
                name: body.name.trim(),
                email: &email,
                phone: phone.as_deref(),
                department: body.department.as_deref(),
                role: body.role,
                status: body.status,
            },
        )
        .await?;
    match outcome {
        UpdateOutcome::Applied => Ok(response::ok::<()>("User updated successfully.", None)),
        UpdateOutcome::Missing => Err(AuthError::AccountNotFound),
        UpdateOutcome::DuplicateEmail => Err(AuthError::EmailTaken),
        UpdateOutcome::DuplicatePhone => Err(AuthError::PhoneTaken),
    }
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User soft-deleted"),
        (status = 400, description = "Attempted self-deletion"),
        (status = 404, description = "No such user"),
    ),
    security(("bearer" = [])),
    tag = "admin",
)]
pub async fn delete_user(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Path(id): Path<UserId>,
) -> Result<Response, AuthError> {
    if id == admin.id {
        return Err(AuthError::Validation(
            "You cannot delete your own account.".into(),
        ));
    }
    let deleted = service.accounts().soft_delete(id).await?;
    if deleted == 0 {
        return Err(AuthError::AccountNotFound);
    }
    Ok(response::ok::<()>("User deleted successfully.", None))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users",
    request_body = BulkDeleteRequest,
    responses(
        (status = 200, description = "Users soft-deleted", body = BulkDeleteData),
        (status = 400, description = "Empty id list or self-deletion"),
    ),
    security(("bearer" = [])),
    tag = "admin",
)]
pub async fn delete_users(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Response, AuthError> {
    if body.ids.is_empty() {
        return Err(AuthError::Validation(
            "Provide at least one user id.".into(),
        ));
    }
    if body.ids.contains(&admin.id) {
        return Err(AuthError::Validation(
            "You cannot delete your own account.".into(),
        ));
    }
    let deleted = service.accounts().soft_delete_many(&body.ids).await?;
    Ok(response::ok(
        format!("{deleted} user(s) deleted."),
        Some(BulkDeleteData { deleted }),
    ))
}
