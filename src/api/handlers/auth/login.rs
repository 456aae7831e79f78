//! Password login, token refresh and the caller's own profile.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};

use super::password::verify_password;
use super::principal::AuthContext;
use super::state::AuthState;
use super::storage::{fetch_credentials, fetch_user_by_id};
use super::token::{bearer_token, TokenError};
use super::types::{AuthResponse, LoginRequest, TokenResponse, UserResponse};
use super::utils::normalize_email;
use crate::api::handlers::error::{parse_body, ApiError, ErrorBody};

const INVALID_CREDENTIALS: ApiError = ApiError::Unauthorized("Invalid email or password");

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Invalid email or password", body = ErrorBody),
        (status = 403, description = "Email not verified", body = ErrorBody),
        (status = 429, description = "Rate limited"),
    ),
    tag = "auth"
)]
pub async fn login(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = parse_body(payload)?;
    let email = normalize_email(&request.email);
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::BadRequest("Email and password are required"));
    }

    let Some(credentials) = fetch_credentials(&pool, &email).await? else {
        return Err(INVALID_CREDENTIALS);
    };

    let verified = verify_password(request.password, credentials.hashed_password)
        .await
        .map_err(|err| {
            warn!("Password verification failed to run: {err:#}");
            ApiError::Internal("Failed to verify password")
        })?;
    if !verified {
        return Err(INVALID_CREDENTIALS);
    }

    let user = credentials.user;
    if !user.verified {
        return Err(ApiError::Forbidden("User email is not verified"));
    }

    let issued = auth_state
        .tokens()
        .issue(user.id, &user.email, user.role)
        .map_err(|err| {
            warn!("Failed to issue token: {err}");
            ApiError::Internal("Failed to generate authentication token")
        })?;
    info!(user_id = %user.id, "user logged in");

    Ok(Json(AuthResponse {
        message: "Login successful".to_string(),
        user,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Token re-issued with a fresh expiry", body = TokenResponse),
        (status = 401, description = "Missing, invalid or expired token", body = ErrorBody),
        (status = 429, description = "Rate limited"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<impl IntoResponse, ApiError> {
    let token = headers
        .get(AUTHORIZATION)
        .ok_or(ApiError::Unauthorized("Authorization header required"))?
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or(ApiError::Unauthorized("Invalid authorization header format"))?;

    let issued = auth_state.tokens().refresh(token).map_err(|err| match err {
        TokenError::InvalidOrExpired => ApiError::Unauthorized("Invalid or expired token"),
        TokenError::Signing(err) => {
            warn!("Failed to sign refreshed token: {err}");
            ApiError::Internal("Failed to generate authentication token")
        }
    })?;

    Ok(Json(TokenResponse {
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/profile",
    responses(
        (status = 200, description = "Caller profile", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User no longer exists", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn profile(
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<UserResponse>, ApiError> {
    fetch_user_by_id(&pool, context.user_id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("User not found"))
}
