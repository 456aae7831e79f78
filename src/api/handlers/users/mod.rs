//! User directory for staff.
//!
//! The whole group requires an evaluator or above; creating and deleting accounts
//! narrows that to admins. Accounts created here skip email verification.

pub(crate) mod storage;
pub(crate) mod types;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use self::types::{UserEnvelope, UserListResponse};
use super::auth::{
    password::hash_password,
    policy::{required_remover, ADMIN_OR_ABOVE},
    register::{ensure_creator, validate_registration},
    storage::{fetch_user_by_email, fetch_user_by_id, insert_user, NewUser},
    types::{MessageResponse, RegisterRequest},
    utils::normalize_email,
    AuthContext, AuthState,
};
use super::error::{is_unique_violation, parse_body, parse_id, ApiError, ErrorBody};

#[utoipa::path(
    get,
    path = "/api/v1/users",
    responses(
        (status = 200, description = "All users", body = UserListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires evaluator or above", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn list_users(pool: Extension<PgPool>) -> Result<Json<UserListResponse>, ApiError> {
    let users = storage::list_users(&pool).await?;
    Ok(Json(UserListResponse {
        message: "Users fetched successfully".to_string(),
        count: users.len(),
        users,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserEnvelope),
        (status = 400, description = "Invalid user id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires evaluator or above", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user_id = parse_id(&id, "Invalid user ID")?;
    let user = fetch_user_by_id(&pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(UserEnvelope::new("User fetched successfully", user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/email/{email}",
    params(("email" = String, Path, description = "Email address")),
    responses(
        (status = 200, description = "User", body = UserEnvelope),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires evaluator or above", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn get_user_by_email(
    Path(email): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Json<UserEnvelope>, ApiError> {
    let user = fetch_user_by_email(&pool, &normalize_email(&email))
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    Ok(Json(UserEnvelope::new("User fetched successfully", user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Verified user created", body = UserEnvelope),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller may not create this role", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn create_user(
    context: AuthContext,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    context.authorize(ADMIN_OR_ABOVE)?;
    let registration = validate_registration(parse_body(payload)?, &auth_state)?;
    ensure_creator(registration.role, &headers, &auth_state)?;

    let hashed_password = hash_password(registration.password)
        .await
        .map_err(|err| {
            warn!("Failed to hash password: {err:#}");
            ApiError::Internal("Failed to process password")
        })?;

    let new_user = NewUser {
        full_name: &registration.full_name,
        email: &registration.email,
        reg_num: &registration.reg_num,
        role: registration.role,
        hashed_password: &hashed_password,
        verified: true,
        otp_hash: None,
        otp_ttl_seconds: 0,
    };
    let user = match insert_user(&pool, &new_user).await {
        Ok(user) => user,
        Err(err) if is_unique_violation(&err) => {
            return Err(ApiError::Conflict("User with this email already exists"));
        }
        Err(err) => return Err(err.into()),
    };
    info!(
        user_id = %user.id,
        role = %user.role,
        created_by = %context.user_id,
        "user created"
    );

    Ok((
        StatusCode::CREATED,
        Json(UserEnvelope::new("User created successfully", user)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted with everything they own", body = MessageResponse),
        (status = 400, description = "Invalid user id or own account", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller may not delete this role", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Role changed concurrently", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    context.authorize(ADMIN_OR_ABOVE)?;
    let user_id = parse_id(&id, "Invalid user ID")?;
    if user_id == context.user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account"));
    }
    let target = fetch_user_by_id(&pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    context.authorize(required_remover(target.role))?;
    if !storage::delete_user(&pool, user_id, target.role).await? {
        return Err(ApiError::Conflict("User changed while being deleted, try again"));
    }
    info!(user_id = %user_id, deleted_by = %context.user_id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
