use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::handlers::{
    applications::types::{AnswerWithQuestion, Application},
    department::Department,
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Review {
    pub id: Uuid,
    pub application_id: Uuid,
    pub reviewer_id: Uuid,
    pub department: Department,
    pub shortlisted: bool,
    pub comments: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A submitted application with its applicant and the caller's review, if any.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct ReviewQueueItem {
    #[serde(flatten)]
    pub application: Application,
    pub applicant_name: String,
    pub applicant_email: String,
    pub review_id: Option<Uuid>,
    pub shortlisted: Option<bool>,
    pub review_comments: Option<String>,
    pub reviewed_at: Option<String>,
}

/// Raw paging parameters; anything unparsable falls back to the defaults.
#[derive(IntoParams, Deserialize, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number, default 1.
    pub page: Option<String>,
    /// Page size, default 50, at most 100.
    pub limit: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub limit: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ReviewQueueResponse {
    pub message: String,
    pub department: Department,
    pub applications: Vec<ReviewQueueItem>,
    pub pagination: Pagination,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ApplicationReviewResponse {
    pub message: String,
    pub application: ReviewQueueItem,
    pub answers: Vec<AnswerWithQuestion>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateReviewRequest {
    pub application_id: Uuid,
    pub shortlisted: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ReviewResponse {
    pub message: String,
    pub review: Review,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReviewStats {
    pub department: Department,
    pub total_applications: i64,
    pub reviewed_count: i64,
    pub shortlisted_count: i64,
    pub rejected_count: i64,
    pub pending_count: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ReviewStatsResponse {
    pub message: String,
    pub stats: ReviewStats,
}
