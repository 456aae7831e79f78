//! Rules of the application state machine.
//!
//! An application starts as a draft (`submitted = false`). Submitting is one-way.
//! Withdrawal (`chickened_out = true`) is an orthogonal flag that freezes the
//! application whatever its submission state. Only a draft that has not been
//! withdrawn accepts answer changes.
//!
//! These checks are pure; storage applies them to rows it has locked.

use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use super::types::AnswerInput;
use crate::api::handlers::{department::Department, error::ApiError};

pub const DEFAULT_MAX_APPLICATIONS_PER_USER: i64 = 2;

#[derive(Clone, Copy, Debug)]
pub struct ApplicationPolicy {
    max_applications_per_user: i64,
}

impl ApplicationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_applications_per_user: DEFAULT_MAX_APPLICATIONS_PER_USER,
        }
    }

    #[must_use]
    pub fn with_max_applications_per_user(mut self, max: i64) -> Self {
        self.max_applications_per_user = max.max(1);
        self
    }

    #[must_use]
    pub fn max_applications_per_user(&self) -> i64 {
        self.max_applications_per_user
    }

    /// Admit a new application when the caller owns fewer than the quota.
    ///
    /// # Errors
    /// `403` with the current and maximum counts once the quota is reached.
    pub fn check_quota(&self, current: i64) -> Result<(), ApiError> {
        if current < self.max_applications_per_user {
            return Ok(());
        }
        Err(ApiError::detailed(
            StatusCode::FORBIDDEN,
            "Maximum number of applications reached",
            json!({
                "current_applications": current,
                "maximum_allowed": self.max_applications_per_user,
                "message": "You have reached the maximum number of applications allowed per user",
            }),
        ))
    }
}

impl Default for ApplicationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// The mutable-relevant flags of an application row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplicationState {
    pub submitted: bool,
    pub chickened_out: bool,
}

impl ApplicationState {
    /// # Errors
    /// `403` once withdrawn, `409` once submitted.
    pub fn ensure_editable(self) -> Result<(), ApiError> {
        if self.chickened_out {
            return Err(ApiError::Forbidden("Application has been withdrawn"));
        }
        if self.submitted {
            return Err(ApiError::Conflict("Application has already been submitted"));
        }
        Ok(())
    }
}

pub fn duplicate_department(department: Department) -> ApiError {
    ApiError::detailed(
        StatusCode::CONFLICT,
        "You have already created an application for this department",
        json!({
            "department": department,
            "message": "Only one application per department is allowed per user",
        }),
    )
}

/// Check an answer targets a question of the application's department.
///
/// # Errors
/// `400` naming the question when it is unknown or belongs to another department.
pub fn check_answer_department(
    question_id: Uuid,
    application_department: Department,
    question_department: Option<Department>,
) -> Result<(), ApiError> {
    match question_department {
        None => Err(ApiError::detailed(
            StatusCode::BAD_REQUEST,
            "Question not found",
            json!({ "question_id": question_id }),
        )),
        Some(department) if department != application_department => Err(ApiError::detailed(
            StatusCode::BAD_REQUEST,
            "Question department does not match application department",
            json!({
                "question_id": question_id,
                "application_department": application_department,
                "question_department": department,
            }),
        )),
        Some(_) => Ok(()),
    }
}

/// Reject empty batches and blank answer bodies.
///
/// # Errors
/// `400` describing the first problem found.
pub fn validate_answers(answers: &[AnswerInput]) -> Result<(), ApiError> {
    if answers.is_empty() {
        return Err(ApiError::BadRequest("At least one answer is required"));
    }
    if let Some(blank) = answers.iter().find(|answer| answer.body.trim().is_empty()) {
        return Err(ApiError::detailed(
            StatusCode::BAD_REQUEST,
            "Answer body is required",
            json!({ "question_id": blank.question_id }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_admits_below_limit() {
        let policy = ApplicationPolicy::new();
        assert_eq!(policy.max_applications_per_user(), 2);
        assert!(policy.check_quota(0).is_ok());
        assert!(policy.check_quota(1).is_ok());
    }

    #[test]
    fn quota_rejects_with_counts() {
        let policy = ApplicationPolicy::new().with_max_applications_per_user(3);
        match policy.check_quota(3) {
            Err(ApiError::Detailed {
                status, details, ..
            }) => {
                assert_eq!(status, StatusCode::FORBIDDEN);
                assert_eq!(details["current_applications"], 3);
                assert_eq!(details["maximum_allowed"], 3);
            }
            other => panic!("expected quota error, got {other:?}"),
        }
    }

    #[test]
    fn quota_floor_is_one() {
        let policy = ApplicationPolicy::new().with_max_applications_per_user(0);
        assert_eq!(policy.max_applications_per_user(), 1);
    }

    #[test]
    fn only_open_drafts_are_editable() {
        let draft = ApplicationState {
            submitted: false,
            chickened_out: false,
        };
        assert!(draft.ensure_editable().is_ok());

        let submitted = ApplicationState {
            submitted: true,
            chickened_out: false,
        };
        assert!(matches!(
            submitted.ensure_editable(),
            Err(ApiError::Conflict(_))
        ));

        for submitted in [false, true] {
            let withdrawn = ApplicationState {
                submitted,
                chickened_out: true,
            };
            assert!(matches!(
                withdrawn.ensure_editable(),
                Err(ApiError::Forbidden(_))
            ));
        }
    }

    #[test]
    fn duplicate_department_is_conflict() {
        match duplicate_department(Department::Design) {
            ApiError::Detailed {
                status, details, ..
            } => {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(details["department"], "design");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn answer_department_must_match() {
        let question_id = Uuid::new_v4();
        assert!(
            check_answer_department(question_id, Department::Technical, Some(Department::Technical))
                .is_ok()
        );

        match check_answer_department(question_id, Department::Technical, Some(Department::Design)) {
            Err(ApiError::Detailed {
                status, details, ..
            }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(details["question_id"], question_id.to_string());
                assert_eq!(details["application_department"], "technical");
                assert_eq!(details["question_department"], "design");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }

        assert!(check_answer_department(question_id, Department::Technical, None).is_err());
    }

    #[test]
    fn answers_need_bodies() {
        assert!(validate_answers(&[]).is_err());
        let blank = AnswerInput {
            question_id: Uuid::new_v4(),
            body: "   ".to_string(),
        };
        assert!(validate_answers(&[blank]).is_err());
        let ok = AnswerInput {
            question_id: Uuid::new_v4(),
            body: "Rust".to_string(),
        };
        assert!(validate_answers(&[ok]).is_ok());
    }
}
