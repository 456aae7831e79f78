//! Department question bank.
//!
//! Reading the questions of one department is public so applicants can prepare
//! before registering. Listing every department needs an evaluator; writes need
//! an admin.

mod storage;
pub(crate) mod types;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use tracing::info;

use self::types::{CreateQuestionRequest, DepartmentQuery, QuestionListResponse, QuestionResponse};
use super::applications::parse_department;
use super::auth::{
    policy::{ADMIN_OR_ABOVE, EVALUATOR_OR_ABOVE},
    types::MessageResponse,
    utils::required_text,
    AuthContext,
};
use super::error::{parse_body, parse_id, ApiError, ErrorBody};

#[utoipa::path(
    get,
    path = "/api/v1/questions",
    params(DepartmentQuery),
    responses(
        (status = 200, description = "Questions of the department", body = QuestionListResponse),
        (status = 400, description = "Missing or unknown department", body = ErrorBody),
    ),
    tag = "questions"
)]
pub async fn questions_by_department(
    pool: Extension<PgPool>,
    Query(params): Query<DepartmentQuery>,
) -> Result<Json<QuestionListResponse>, ApiError> {
    let raw = params
        .dept
        .as_deref()
        .and_then(required_text)
        .ok_or(ApiError::BadRequest("Department parameter is required"))?;
    let department = parse_department(&raw)?;

    let questions = storage::list_by_department(&pool, department).await?;
    Ok(Json(QuestionListResponse {
        message: "Questions fetched successfully".to_string(),
        count: questions.len(),
        questions,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/all",
    responses(
        (status = 200, description = "Questions of every department", body = QuestionListResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires evaluator or above", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "questions"
)]
pub async fn all_questions(
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<QuestionListResponse>, ApiError> {
    context.authorize(EVALUATOR_OR_ABOVE)?;
    let questions = storage::list_all(&pool).await?;
    Ok(Json(QuestionListResponse {
        message: "All questions fetched successfully".to_string(),
        count: questions.len(),
        questions,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/questions/{id}",
    params(("id" = String, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question", body = QuestionResponse),
        (status = 400, description = "Invalid question id", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody),
    ),
    tag = "questions"
)]
pub async fn get_question(
    Path(id): Path<String>,
    pool: Extension<PgPool>,
) -> Result<Json<QuestionResponse>, ApiError> {
    let question_id = parse_id(&id, "Invalid question ID")?;
    let question = storage::fetch_question(&pool, question_id)
        .await?
        .ok_or(ApiError::NotFound("Question not found"))?;
    Ok(Json(QuestionResponse {
        message: "Question fetched successfully".to_string(),
        question,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/questions",
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question created", body = QuestionResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires admin or above", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "questions"
)]
pub async fn create_question(
    context: AuthContext,
    pool: Extension<PgPool>,
    payload: Result<Json<CreateQuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    context.authorize(ADMIN_OR_ABOVE)?;
    let request = parse_body(payload)?;
    let department = parse_department(&request.department)?;
    let title =
        required_text(&request.title).ok_or(ApiError::BadRequest("Title is required"))?;
    let body = required_text(&request.body).ok_or(ApiError::BadRequest("Body is required"))?;

    let question = storage::insert_question(&pool, department, &title, &body).await?;
    info!(
        question_id = %question.id,
        department = %department,
        created_by = %context.user_id,
        "question created"
    );

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse {
            message: "Question created successfully".to_string(),
            question,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/questions/{id}",
    params(("id" = String, Path, description = "Question id")),
    responses(
        (status = 200, description = "Question deleted with its answers", body = MessageResponse),
        (status = 400, description = "Invalid question id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires admin or above", body = ErrorBody),
        (status = 404, description = "Question not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "questions"
)]
pub async fn delete_question(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    context.authorize(ADMIN_OR_ABOVE)?;
    let question_id = parse_id(&id, "Invalid question ID")?;
    if !storage::delete_question(&pool, question_id).await? {
        return Err(ApiError::NotFound("Question not found"));
    }
    info!(question_id = %question_id, deleted_by = %context.user_id, "question deleted");
    Ok(Json(MessageResponse::new("Question deleted successfully")))
}
