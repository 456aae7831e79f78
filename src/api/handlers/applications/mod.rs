//! Application lifecycle endpoints.
//!
//! Flow Overview:
//! 1) An applicant creates a draft for one department (quota and one per department).
//! 2) Answers are saved in batches (`PATCH /{id}/save`) or singly via `/answers`.
//! 3) Submitting freezes the application for review.
//! 4) A draft can be deleted by its owner; withdrawal freezes everything.
//!
//! Every owner-scoped lookup answers `404` for ids the caller does not own.

pub(crate) mod lifecycle;
pub(crate) mod storage;
pub(crate) mod types;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use tracing::info;

use self::lifecycle::validate_answers;
use self::types::{
    AnswersResponse, ApplicantListResponse, ApplicationListResponse, ApplicationResponse,
    CreateApplicationRequest, SaveAnswersRequest,
};
use super::auth::{
    policy::{ADMIN_OR_ABOVE, APPLICANT_ONLY},
    types::MessageResponse,
    AuthContext,
};
use super::department::Department;
use super::error::{parse_body, parse_id, ApiError, ErrorBody};

pub use self::lifecycle::{ApplicationPolicy, DEFAULT_MAX_APPLICATIONS_PER_USER};

pub(crate) fn parse_department(value: &str) -> Result<Department, ApiError> {
    value.parse::<Department>().map_err(|_| {
        ApiError::BadRequest(
            "Invalid department. Must be one of: technical, management, social_media, design",
        )
    })
}

#[utoipa::path(
    get,
    path = "/api/v1/applications",
    responses(
        (status = 200, description = "All applications with their applicants", body = ApplicantListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires admin or super admin", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "applications"
)]
pub async fn list_applications(
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<ApplicantListResponse>, ApiError> {
    context.authorize(ADMIN_OR_ABOVE)?;
    let applications = storage::list_all(&pool).await?;
    Ok(Json(ApplicantListResponse {
        message: "Applications fetched successfully".to_string(),
        count: applications.len(),
        applications,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/applications",
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Draft created", body = ApplicationResponse),
        (status = 400, description = "Invalid department", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not an applicant, withdrawn, or quota reached", body = ErrorBody),
        (status = 409, description = "Already applied to this department", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "applications"
)]
pub async fn create_application(
    context: AuthContext,
    pool: Extension<PgPool>,
    policy: Extension<ApplicationPolicy>,
    payload: Result<Json<CreateApplicationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    context.authorize(APPLICANT_ONLY)?;
    let request = parse_body(payload)?;
    let department = parse_department(&request.department)?;

    let application =
        storage::create_application(&pool, context.user_id, department, &policy).await?;
    info!(
        user_id = %context.user_id,
        application_id = %application.id,
        department = %department,
        "application created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse {
            message: "Application created successfully".to_string(),
            application,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/applications/me",
    responses(
        (status = 200, description = "Caller's applications", body = ApplicationListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "applications"
)]
pub async fn my_applications(
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<ApplicationListResponse>, ApiError> {
    let applications = storage::list_for_user(&pool, context.user_id).await?;
    Ok(Json(ApplicationListResponse {
        message: "Your applications fetched successfully".to_string(),
        count: applications.len(),
        applications,
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/applications/{id}/save",
    params(("id" = String, Path, description = "Application id")),
    request_body = SaveAnswersRequest,
    responses(
        (status = 200, description = "Answers saved", body = AnswersResponse),
        (status = 400, description = "Invalid input or question outside the department", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Application withdrawn", body = ErrorBody),
        (status = 404, description = "Application not found", body = ErrorBody),
        (status = 409, description = "Application already submitted", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "applications"
)]
pub async fn save_application(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
    payload: Result<Json<SaveAnswersRequest>, JsonRejection>,
) -> Result<Json<AnswersResponse>, ApiError> {
    let application_id = parse_id(&id, "Invalid application ID")?;
    let request = parse_body(payload)?;
    validate_answers(&request.answers)?;

    let answers =
        storage::save_answers(&pool, application_id, context.user_id, &request.answers).await?;
    info!(
        application_id = %application_id,
        answers = answers.len(),
        "answers saved"
    );

    Ok(Json(AnswersResponse {
        message: "Answers saved successfully".to_string(),
        count: answers.len(),
        answers,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/applications/{id}/submit",
    params(("id" = String, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application submitted (repeat submits succeed unchanged)", body = ApplicationResponse),
        (status = 400, description = "Invalid application id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Application withdrawn", body = ErrorBody),
        (status = 404, description = "Application not found or access denied", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "applications"
)]
pub async fn submit_application(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<ApplicationResponse>, ApiError> {
    let application_id = parse_id(&id, "Invalid application ID")?;
    let application = storage::submit_application(&pool, application_id, context.user_id).await?;
    info!(application_id = %application_id, "application submitted");

    Ok(Json(ApplicationResponse {
        message: "Application submitted successfully".to_string(),
        application,
    }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/applications/{id}",
    params(("id" = String, Path, description = "Application id")),
    responses(
        (status = 200, description = "Draft deleted with its answers", body = MessageResponse),
        (status = 400, description = "Invalid application id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Application not found or access denied", body = ErrorBody),
        (status = 409, description = "Application already submitted", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "applications"
)]
pub async fn delete_application(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let application_id = parse_id(&id, "Invalid application ID")?;
    storage::delete_draft(&pool, application_id, context.user_id).await?;
    info!(application_id = %application_id, "application deleted");

    Ok(Json(MessageResponse::new("Application deleted successfully")))
}
