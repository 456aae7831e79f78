//! Request/response types for applications and answers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::handlers::department::Department;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub id: Uuid,
    pub user_id: Uuid,
    pub department: Department,
    pub submitted: bool,
    pub chickened_out: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Application row joined with its owner, for privileged listings.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct ApplicationWithApplicant {
    #[serde(flatten)]
    pub application: Application,
    pub applicant_name: String,
    pub applicant_email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub id: Uuid,
    pub application_id: Uuid,
    pub question_id: Uuid,
    pub body: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Answer with the text of the question it answers.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct AnswerWithQuestion {
    #[serde(flatten)]
    pub answer: Answer,
    pub question_title: String,
    pub question_body: String,
    pub department: Department,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateApplicationRequest {
    pub department: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AnswerInput {
    pub question_id: Uuid,
    pub body: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SaveAnswersRequest {
    pub answers: Vec<AnswerInput>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct PostAnswerRequest {
    pub application_id: Uuid,
    pub question_id: Uuid,
    pub body: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApplicationResponse {
    pub message: String,
    pub application: Application,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApplicationListResponse {
    pub message: String,
    pub applications: Vec<Application>,
    pub count: usize,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApplicantListResponse {
    pub message: String,
    pub applications: Vec<ApplicationWithApplicant>,
    pub count: usize,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AnswersResponse {
    pub message: String,
    pub answers: Vec<Answer>,
    pub count: usize,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AnswerResponse {
    pub message: String,
    pub answer: Answer,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AnswerDetailsResponse {
    pub message: String,
    pub answers: Vec<AnswerWithQuestion>,
    pub count: usize,
}
