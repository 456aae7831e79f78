//! Super-admin account management.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    Json,
};
use sqlx::PgPool;
use tracing::info;

use super::applications::parse_department;
use super::auth::{AuthContext, Role};
use super::error::{parse_body, parse_id, ApiError, ErrorBody};
use super::users::{
    storage::{mark_verified, update_role},
    types::{UpdateRoleRequest, UserEnvelope},
};

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/role",
    params(("id" = String, Path, description = "User id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserEnvelope),
        (status = 400, description = "Invalid role, department or user id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires super admin", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn update_user_role(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user_id = parse_id(&id, "Invalid user ID format")?;
    let request = parse_body(payload)?;
    let role = request
        .role
        .parse::<Role>()
        .map_err(|_| ApiError::BadRequest("Invalid role specified"))?;
    let department = request
        .department
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(parse_department)
        .transpose()?;

    let user = update_role(&pool, user_id, role, department)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    info!(
        user_id = %user_id,
        role = %role,
        updated_by = %context.user_id,
        "user role updated"
    );

    Ok(Json(UserEnvelope::new("User role updated successfully", user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{id}/verify",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User marked verified", body = UserEnvelope),
        (status = 400, description = "Invalid user id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires super admin", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn verify_user(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user_id = parse_id(&id, "Invalid user ID format")?;
    let user = mark_verified(&pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    info!(user_id = %user_id, verified_by = %context.user_id, "user verified");

    Ok(Json(UserEnvelope::new("User verified successfully", user)))
}
