//! Voluntary withdrawal ("chicken out").

use axum::{extract::Extension, Json};
use sqlx::PgPool;
use tracing::info;

use super::principal::AuthContext;
use super::storage::withdraw_user;
use super::types::ChickenOutResponse;
use crate::api::handlers::error::{ApiError, ErrorBody};

/// Withdraw the caller and every application they own.
///
/// Calling again after withdrawing succeeds and reports zero newly withdrawn applications.
#[utoipa::path(
    post,
    path = "/api/v1/auth/chicken-out",
    responses(
        (status = 200, description = "Caller withdrawn", body = ChickenOutResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "User no longer exists", body = ErrorBody),
        (status = 429, description = "Rate limited"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn chicken_out(
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<ChickenOutResponse>, ApiError> {
    let withdrawn = withdraw_user(&pool, context.user_id)
        .await?
        .ok_or(ApiError::NotFound("User not found"))?;
    info!(user_id = %context.user_id, applications = withdrawn, "user withdrew");

    Ok(Json(ChickenOutResponse {
        message: "You have withdrawn from the recruitment process".to_string(),
        applications_withdrawn: withdrawn,
    }))
}
