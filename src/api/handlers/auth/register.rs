//! Self-registration and privileged account creation.
//!
//! Applicants register without a token. Any other role needs a caller token whose
//! role is in that role's creator allow-set. New accounts start unverified with a
//! verification code mailed to them.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use super::otp::{generate_otp, hash_otp};
use super::password::{hash_password, valid_password};
use super::policy::{required_creator, Role};
use super::principal::resolve;
use super::state::AuthState;
use super::storage::{insert_user, NewUser};
use super::types::{RegisterRequest, RegisterResponse};
use super::utils::{normalize_email, required_text, seconds_i64, valid_email};
use crate::api::email::{templates, Mailer};
use crate::api::handlers::error::{is_unique_violation, parse_body, ApiError, ErrorBody};

/// Validated registration input.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Registration {
    pub(crate) full_name: String,
    pub(crate) email: String,
    pub(crate) reg_num: String,
    pub(crate) password: String,
    pub(crate) role: Role,
}

/// Check the shape of a registration request.
///
/// # Errors
/// `400` for blank fields, malformed email, short password or unknown role, and
/// `403` when the email domain is outside the configured allow list.
pub(crate) fn validate_registration(
    request: RegisterRequest,
    state: &AuthState,
) -> Result<Registration, ApiError> {
    let full_name =
        required_text(&request.full_name).ok_or(ApiError::BadRequest("Full name is required"))?;
    let reg_num = required_text(&request.reg_num)
        .ok_or(ApiError::BadRequest("Registration number is required"))?;

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email format"));
    }
    if !state.config().email_domain_allowed(&email) {
        return Err(ApiError::Forbidden("Email domain is not allowed"));
    }

    if !valid_password(&request.password) {
        return Err(ApiError::BadRequest("Password must be at least 6 characters"));
    }

    let role = match request.role.as_deref().map(str::trim) {
        None | Some("") => Role::Applicant,
        Some(value) => value
            .parse::<Role>()
            .map_err(|_| ApiError::BadRequest("Invalid role specified"))?,
    };

    Ok(Registration {
        full_name,
        email,
        reg_num,
        password: request.password,
        role,
    })
}

/// Enforce the creator policy for `role` against the optional caller token.
pub(crate) fn ensure_creator(
    role: Role,
    headers: &HeaderMap,
    state: &AuthState,
) -> Result<(), ApiError> {
    let Some(allowed) = required_creator(role) else {
        return Ok(());
    };
    let message = if role == Role::Evaluator {
        "Only administrators can create evaluator accounts"
    } else {
        "Only super administrators can create admin accounts"
    };
    let caller = resolve(headers, state).map_err(|_| ApiError::Forbidden(message))?;
    caller
        .authorize(allowed)
        .map_err(|_| ApiError::Forbidden(message))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created, verification code sent", body = RegisterResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Role or email domain not allowed", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Verification email could not be queued", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    mailer: Extension<Mailer>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = validate_registration(parse_body(payload)?, &auth_state)?;
    ensure_creator(registration.role, &headers, &auth_state)?;

    let hashed_password = hash_password(registration.password)
        .await
        .map_err(|err| {
            warn!("Failed to hash password: {err:#}");
            ApiError::Internal("Failed to process password")
        })?;

    let code = generate_otp();
    let otp_hash = hash_otp(&code);
    let ttl_seconds = auth_state.config().verification_ttl_seconds();
    let new_user = NewUser {
        full_name: &registration.full_name,
        email: &registration.email,
        reg_num: &registration.reg_num,
        role: registration.role,
        hashed_password: &hashed_password,
        verified: false,
        otp_hash: Some(&otp_hash),
        otp_ttl_seconds: seconds_i64(ttl_seconds),
    };

    let user = match insert_user(&pool, &new_user).await {
        Ok(user) => user,
        Err(err) if is_unique_violation(&err) => {
            return Err(ApiError::Conflict("User with this email already exists"));
        }
        Err(err) => return Err(err.into()),
    };
    info!(user_id = %user.id, role = %user.role, "user registered");

    mailer
        .enqueue(templates::verification(
            &user.email,
            &code,
            Duration::from_secs(ttl_seconds),
        ))
        .map_err(|err| {
            warn!(user_id = %user.id, "Verification email not queued: {err}");
            ApiError::Unavailable("Verification email could not be queued, request a new code")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User created successfully. Please check your email for the verification code."
                .to_string(),
            user,
        }),
    ))
}
