//! Email verification by one-time code.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};
use uuid::Uuid;

use super::otp::{
    check_otp, generate_otp, hash_otp, well_formed, OtpCheck, OtpPurpose, MAX_OTP_ATTEMPTS,
};
use super::state::AuthState;
use super::storage::{
    clear_otp, consume_verification_otp, fetch_otp_state, reserve_otp_attempt, store_otp,
    OtpState,
};
use super::types::{AuthResponse, EmailRequest, MessageResponse, VerifyOtpRequest};
use super::utils::{normalize_email, seconds_i64};
use crate::api::email::{templates, Mailer};
use crate::api::handlers::error::{parse_body, ApiError, ErrorBody};

pub(super) const INVALID_OTP: &str = "Invalid OTP";
const OTP_EXHAUSTED: &str = "Too many invalid codes, request a new one";

/// Map a failed code check to the response the caller sees.
pub(super) fn otp_rejection(check: OtpCheck) -> Option<ApiError> {
    match check {
        OtpCheck::Pending => None,
        OtpCheck::Expired => Some(ApiError::Unauthorized("OTP has expired")),
        OtpCheck::Exhausted => Some(ApiError::Unauthorized(OTP_EXHAUSTED)),
        OtpCheck::Missing => Some(ApiError::BadRequest(
            "No code is pending for this account, request a new one",
        )),
    }
}

/// Count a guess against the code pending for `purpose`, or refuse it.
pub(super) async fn reserve_guess(
    pool: &PgPool,
    state: &OtpState,
    purpose: OtpPurpose,
) -> Result<i32, ApiError> {
    let check = check_otp(state.purpose, purpose, state.expired, state.attempts);
    if let Some(rejection) = otp_rejection(check) {
        return Err(rejection);
    }
    // Another request may have used the last guess since the state was read.
    reserve_otp_attempt(pool, state.user_id, purpose, MAX_OTP_ATTEMPTS)
        .await?
        .ok_or(ApiError::Unauthorized(OTP_EXHAUSTED))
}

/// Rejection for a wrong guess. The last allowed guess clears the code.
pub(super) async fn wrong_guess(
    pool: &PgPool,
    user_id: Uuid,
    attempt: i32,
) -> Result<ApiError, ApiError> {
    if attempt < MAX_OTP_ATTEMPTS {
        return Ok(ApiError::Unauthorized(INVALID_OTP));
    }
    clear_otp(pool, user_id).await?;
    warn!(user_id = %user_id, "OTP guesses exhausted, code cleared");
    Ok(ApiError::Unauthorized(OTP_EXHAUSTED))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Account verified, token issued", body = AuthResponse),
        (status = 400, description = "Invalid input or already verified", body = ErrorBody),
        (status = 401, description = "Wrong, expired or exhausted code", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 429, description = "Rate limited"),
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = parse_body(payload)?;
    let email = normalize_email(&request.email);
    let code = request.code.trim();
    if !well_formed(code) {
        return Err(ApiError::BadRequest("Invalid OTP format"));
    }

    let state = fetch_otp_state(&pool, &email)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    if state.verified {
        return Err(ApiError::BadRequest("User is already verified"));
    }
    let attempt = reserve_guess(&pool, &state, OtpPurpose::Verification).await?;

    let Some(user) = consume_verification_otp(&pool, state.user_id, &hash_otp(code)).await?
    else {
        return Err(wrong_guess(&pool, state.user_id, attempt).await?);
    };
    info!(user_id = %user.id, "user verified");

    let issued = auth_state
        .tokens()
        .issue(user.id, &user.email, user.role)
        .map_err(|err| {
            warn!("Failed to issue token: {err}");
            ApiError::Internal("Failed to generate authentication token")
        })?;

    Ok(Json(AuthResponse {
        message: "User verified successfully".to_string(),
        user,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-otp",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "New code sent", body = MessageResponse),
        (status = 400, description = "Invalid input or already verified", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 429, description = "Rate limited"),
        (status = 503, description = "Email could not be queued", body = ErrorBody),
    ),
    tag = "auth"
)]
pub async fn resend_otp(
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    mailer: Extension<Mailer>,
    payload: Result<Json<EmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = parse_body(payload)?;
    let email = normalize_email(&request.email);

    let state = fetch_otp_state(&pool, &email)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    if state.verified {
        return Err(ApiError::BadRequest("User is already verified"));
    }

    let code = generate_otp();
    let ttl_seconds = auth_state.config().verification_ttl_seconds();
    store_otp(
        &pool,
        state.user_id,
        OtpPurpose::Verification,
        &hash_otp(&code),
        seconds_i64(ttl_seconds),
    )
    .await?;

    mailer.enqueue(templates::resend_verification(
        &email,
        &code,
        Duration::from_secs(ttl_seconds),
    ))?;

    Ok(Json(MessageResponse::new(
        "A new verification code has been sent to your email",
    )))
}
