//! Password reset by one-time code.
//!
//! Neither endpoint reveals whether an account exists: `forgot-password` always
//! gives the same answer and `reset-password` rejects unknown emails exactly like
//! a wrong code.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use super::otp::{generate_otp, hash_otp, well_formed, OtpPurpose};
use super::password::{hash_password, valid_password};
use super::state::AuthState;
use super::storage::{consume_reset_otp, fetch_otp_state, store_otp};
use super::types::{EmailRequest, MessageResponse, ResetPasswordRequest};
use super::utils::{normalize_email, seconds_i64, valid_email};
use super::verification::{reserve_guess, wrong_guess, INVALID_OTP};
use crate::api::email::{templates, Mailer};
use crate::api::handlers::error::{parse_body, ApiError, ErrorBody};

const RESET_REQUESTED: &str =
    "If an account with that email exists, a password reset code has been sent";

#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset requested", body = MessageResponse),
        (status = 400, description = "Invalid email", body = ErrorBody),
        (status = 429, description = "Rate limited"),
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    mailer: Extension<Mailer>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = parse_body(payload)?;
    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(ApiError::BadRequest("Invalid email format"));
    }

    if let Some(state) = fetch_otp_state(&pool, &email).await? {
        let code = generate_otp();
        let ttl_seconds = auth_state.config().reset_ttl_seconds();
        store_otp(
            &pool,
            state.user_id,
            OtpPurpose::Reset,
            &hash_otp(&code),
            seconds_i64(ttl_seconds),
        )
        .await?;
        info!(user_id = %state.user_id, "password reset requested");
        // The response must not depend on whether the account exists.
        if let Err(err) = mailer.enqueue(templates::password_reset(
            &email,
            &code,
            Duration::from_secs(ttl_seconds),
        )) {
            warn!(user_id = %state.user_id, "Reset email not queued: {err}");
        }
    }

    Ok(Json(MessageResponse::new(RESET_REQUESTED)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Invalid, expired or exhausted code", body = ErrorBody),
        (status = 429, description = "Rate limited"),
    ),
    tag = "auth"
)]
pub async fn reset_password(
    pool: Extension<PgPool>,
    mailer: Extension<Mailer>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = parse_body(payload)?;
    let email = normalize_email(&request.email);
    let code = request.code.trim().to_string();
    if !well_formed(&code) {
        return Err(ApiError::BadRequest("Invalid OTP format"));
    }
    if !valid_password(&request.new_password) {
        return Err(ApiError::BadRequest("Password must be at least 6 characters"));
    }

    let state = fetch_otp_state(&pool, &email)
        .await?
        .ok_or(ApiError::Unauthorized(INVALID_OTP))?;
    // No pending reset code must look the same as a wrong one.
    let attempt = reserve_guess(&pool, &state, OtpPurpose::Reset)
        .await
        .map_err(|err| match err {
            ApiError::BadRequest(_) => ApiError::Unauthorized(INVALID_OTP),
            other => other,
        })?;

    let hashed_password = hash_password(request.new_password).await.map_err(|err| {
        warn!("Failed to hash password: {err:#}");
        ApiError::Internal("Failed to process password")
    })?;

    if !consume_reset_otp(&pool, state.user_id, &hash_otp(&code), &hashed_password).await? {
        return Err(wrong_guess(&pool, state.user_id, attempt).await?);
    }
    info!(user_id = %state.user_id, "password reset");

    // The password is already changed; a lost notification is not an error for the caller.
    if let Err(err) = mailer.enqueue(templates::password_reset_success(&email)) {
        warn!(user_id = %state.user_id, "Reset confirmation not queued: {err}");
    }

    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}
