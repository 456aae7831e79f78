//! Single-answer endpoints.
//!
//! These share the batch path's rules: the caller must own a draft that has not
//! been withdrawn, and the question must belong to the application's department.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use tracing::info;

use super::applications::{
    lifecycle::validate_answers,
    storage,
    types::{AnswerDetailsResponse, AnswerInput, AnswerResponse, PostAnswerRequest},
};
use super::auth::{policy::EVALUATOR_OR_ABOVE, types::MessageResponse, AuthContext};
use super::error::{parse_body, parse_id, ApiError, ErrorBody};

#[utoipa::path(
    post,
    path = "/api/v1/answers",
    request_body = PostAnswerRequest,
    responses(
        (status = 201, description = "Answer created or updated", body = AnswerResponse),
        (status = 400, description = "Blank body or question outside the department", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Application withdrawn", body = ErrorBody),
        (status = 404, description = "Application not found", body = ErrorBody),
        (status = 409, description = "Application already submitted", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "answers"
)]
pub async fn post_answer(
    context: AuthContext,
    pool: Extension<PgPool>,
    payload: Result<Json<PostAnswerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = parse_body(payload)?;
    let input = [AnswerInput {
        question_id: request.question_id,
        body: request.body,
    }];
    validate_answers(&input)?;

    let answer = storage::save_answers(&pool, request.application_id, context.user_id, &input)
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::Internal("Answer was not stored"))?;
    info!(
        application_id = %request.application_id,
        question_id = %request.question_id,
        "answer saved"
    );

    Ok((
        StatusCode::CREATED,
        Json(AnswerResponse {
            message: "Answer saved successfully".to_string(),
            answer,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/answers/{id}",
    params(("id" = String, Path, description = "Answer id")),
    responses(
        (status = 200, description = "Answer deleted", body = MessageResponse),
        (status = 400, description = "Invalid answer id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Application withdrawn", body = ErrorBody),
        (status = 404, description = "Answer not found or access denied", body = ErrorBody),
        (status = 409, description = "Application already submitted", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "answers"
)]
pub async fn delete_answer(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<MessageResponse>, ApiError> {
    let answer_id = parse_id(&id, "Invalid answer ID")?;
    storage::delete_answer(&pool, answer_id, context.user_id).await?;
    info!(answer_id = %answer_id, "answer deleted");
    Ok(Json(MessageResponse::new("Answer deleted successfully")))
}

#[utoipa::path(
    get,
    path = "/api/v1/answers/application/{id}",
    params(("id" = String, Path, description = "Application id")),
    responses(
        (status = 200, description = "Caller's answers for the application", body = AnswerDetailsResponse),
        (status = 400, description = "Invalid application id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 404, description = "Application not found or access denied", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "answers"
)]
pub async fn application_answers(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<AnswerDetailsResponse>, ApiError> {
    let application_id = parse_id(&id, "Invalid application ID")?;
    let answers = storage::answers_for_owned_application(&pool, application_id, context.user_id)
        .await?
        .ok_or(ApiError::NotFound("Application not found or access denied"))?;

    Ok(Json(AnswerDetailsResponse {
        message: "Answers fetched successfully".to_string(),
        count: answers.len(),
        answers,
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/answers/user/{id}",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "All answers written by the user", body = AnswerDetailsResponse),
        (status = 400, description = "Invalid user id", body = ErrorBody),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Requires evaluator or above", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "answers"
)]
pub async fn user_answers(
    Path(id): Path<String>,
    context: AuthContext,
    pool: Extension<PgPool>,
) -> Result<Json<AnswerDetailsResponse>, ApiError> {
    context.authorize(EVALUATOR_OR_ABOVE)?;
    let user_id = parse_id(&id, "Invalid user ID")?;
    let answers = storage::answers_by_user(&pool, user_id).await?;

    Ok(Json(AnswerDetailsResponse {
        message: "Answers fetched successfully".to_string(),
        count: answers.len(),
        answers,
    }))
}
