//! Department-scoped review workflow.
//!
//! Flow Overview:
//! 1) The caller's department is read from their user row; callers without one
//!    are refused.
//! 2) The queue lists submitted, non-withdrawn applications of that department,
//!    newest first, one page at a time.
//! 3) A review is an upsert keyed by (application, reviewer).

mod storage;
pub(crate) mod types;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    Json,
};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use self::types::{
    ApplicationReviewResponse, CreateReviewRequest, PageQuery, Pagination, ReviewQueueResponse,
    ReviewResponse, ReviewStatsResponse,
};
use super::applications::storage::answers_for_application;
use super::auth::AuthContext;
use super::department::Department;
use super::error::{parse_body, parse_id, ApiError, ErrorBody};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 100;

/// A validated page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// Parse raw query values. Non-numeric or non-positive pages become 1; limits
    /// outside `1..=100` become the default.
    #[must_use]
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1);
        let limit = limit
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|limit| (1..=MAX_PAGE_SIZE).contains(limit))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, limit }
    }

    #[must_use]
    pub fn offset(self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    #[must_use]
    pub fn pagination(self, total_count: i64) -> Pagination {
        Pagination {
            current_page: self.page,
            total_pages: (total_count + self.limit - 1) / self.limit,
            total_count,
            limit: self.limit,
        }
    }
}

/// Check a reviewer may review an application.
///
/// # Errors
/// `403` across departments, `400` for drafts and withdrawn applications.
pub fn check_reviewable(
    reviewer_department: Department,
    application_department: Department,
    submitted: bool,
    chickened_out: bool,
) -> Result<(), ApiError> {
    if reviewer_department != application_department {
        return Err(ApiError::Forbidden("Cannot review applications from other departments"));
    }
    if !submitted {
        return Err(ApiError::BadRequest("Cannot review unsubmitted applications"));
    }
    if chickened_out {
        return Err(ApiError::BadRequest("Cannot review withdrawn applications"));
    }
    Ok(())
}

async fn department_of(pool: &PgPool, reviewer_id: Uuid) -> Result<Department, ApiError> {
    storage::reviewer_department(pool, reviewer_id)
        .await?
        .ok_or(ApiError::Forbidden("Reviewer has no department assigned"))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/applications",
    params(PageQuery),
    responses(
        (status = 200, description = "Review queue of the caller's department", body = ReviewQueueResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not a reviewer, or no department assigned", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
pub async fn review_queue(
    context: AuthContext,
    pool: Extension<PgPool>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ReviewQueueResponse>, ApiError> {
    let department = department_of(&pool, context.user_id).await?;
    let page = Page::from_query(params.page.as_deref(), params.limit.as_deref());

    let (applications, total) =
        storage::review_queue(&pool, department, context.user_id, page).await?;

    Ok(Json(ReviewQueueResponse {
        message: "Applications fetched successfully".to_string(),
        department,
        applications,
        pagination: page.pagination(total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/applications/{id}",
    params(("id" = String, Path, description = "Application id")),
    responses(
        (status = 200, description = "Application with answers and question text", body = ApplicationReviewResponse),
        (status = 400, description = "Invalid application id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Application belongs to another department", body = ErrorBody),
        (status = 404, description = "No submitted application with this id", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
pub async fn application_for_review(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<ApplicationReviewResponse>, ApiError> {
    let application_id = parse_id(&id, "Invalid application ID")?;
    let department = department_of(&pool, context.user_id).await?;

    let application = storage::review_item(&pool, application_id, context.user_id)
        .await?
        .ok_or(ApiError::NotFound("Application not found"))?;
    if application.application.department != department {
        return Err(ApiError::Forbidden("Cannot access applications from other departments"));
    }
    let answers = answers_for_application(&pool, application_id).await?;

    Ok(Json(ApplicationReviewResponse {
        message: "Application fetched successfully".to_string(),
        application,
        answers,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 200, description = "Review created or updated", body = ReviewResponse),
        (status = 400, description = "Application not submitted or withdrawn", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Application belongs to another department", body = ErrorBody),
        (status = 404, description = "Application not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
pub async fn save_review(
    context: AuthContext,
    pool: Extension<PgPool>,
    payload: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewResponse>, ApiError> {
    let request = parse_body(payload)?;
    let department = department_of(&pool, context.user_id).await?;
    let comments = request
        .comments
        .as_deref()
        .map(str::trim)
        .filter(|comments| !comments.is_empty());

    let review = storage::upsert_review(
        &pool,
        context.user_id,
        department,
        request.application_id,
        request.shortlisted,
        comments,
    )
    .await?;
    info!(
        review_id = %review.id,
        application_id = %review.application_id,
        shortlisted = review.shortlisted,
        "review saved"
    );

    Ok(Json(ReviewResponse {
        message: "Review saved successfully".to_string(),
        review,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/reviews/stats",
    responses(
        (status = 200, description = "Counts for the caller's department", body = ReviewStatsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Not a reviewer, or no department assigned", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "reviews"
)]
pub async fn review_stats(
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<ReviewStatsResponse>, ApiError> {
    let department = department_of(&pool, context.user_id).await?;
    let stats = storage::review_stats(&pool, department, context.user_id).await?;
    Ok(Json(ReviewStatsResponse {
        message: "Review statistics fetched successfully".to_string(),
        stats,
    }))
}
