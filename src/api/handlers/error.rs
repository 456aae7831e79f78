//! HTTP error taxonomy shared by every handler.
//!
//! All failures render as `{"error": "...", "details": ...}` where `details` is
//! omitted unless the error carries structured context (quota counts, the
//! offending question, ...). Database errors are logged and never sent to clients.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

/// Error body returned by every endpoint.
#[derive(ToSchema, Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    /// Any status with a message and structured details.
    #[error("{message}")]
    Detailed {
        status: StatusCode,
        message: &'static str,
        details: Value,
    },
    #[error("{0}")]
    Unavailable(&'static str),
    #[error("{0}")]
    Internal(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn detailed(status: StatusCode, message: &'static str, details: Value) -> Self {
        Self::Detailed {
            status,
            message,
            details,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Detailed { status, .. } => *status,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Database(err) => {
                error!("Database error: {err}");
                ErrorBody {
                    error: "Internal server error".to_string(),
                    details: None,
                }
            }
            Self::Internal(message) => {
                error!("Internal error: {message}");
                ErrorBody {
                    error: message.to_string(),
                    details: None,
                }
            }
            Self::Detailed {
                message, details, ..
            } => ErrorBody {
                error: message.to_string(),
                details: Some(details),
            },
            Self::BadRequest(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::Unavailable(message) => ErrorBody {
                error: message.to_string(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body or turn the rejection into a `400` with the reason as details.
pub fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => Err(ApiError::detailed(
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            Value::String(rejection.body_text()),
        )),
    }
}

/// Parse a path id, mapping malformed input to `400`.
pub fn parse_id(raw: &str, message: &'static str) -> Result<uuid::Uuid, ApiError> {
    uuid::Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(message))
}

/// Returns `true` for SQLSTATE `23505` (unique violation).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}
