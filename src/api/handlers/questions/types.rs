use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::handlers::department::Department;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: Uuid,
    pub department: Department,
    pub title: String,
    pub body: String,
    pub created_at: String,
}

#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct DepartmentQuery {
    /// One of `technical`, `management`, `social_media`, `design`.
    pub dept: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateQuestionRequest {
    pub department: String,
    pub title: String,
    pub body: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct QuestionResponse {
    pub message: String,
    pub question: Question,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct QuestionListResponse {
    pub message: String,
    pub questions: Vec<Question>,
    pub count: usize,
}
