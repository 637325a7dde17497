//! Error handling for the DevEvent HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// Standard error response format for all HTTP errors
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Vec<serde_json::Value>,
    pub trace_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("conflict: {message}")]
    Conflict {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String, code: String },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Conflict {
            details,
            code: "conflict".to_string(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            code: "unauthorized".to_string(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let status = self.status();

        let (code, message, details) = match self {
            AppError::Validation {
                details,
                code,
                message,
            }
            | AppError::Conflict {
                details,
                code,
                message,
            } => (code, message, details),
            AppError::NotFound { message, code }
            | AppError::Unauthorized { message, code }
            | AppError::BadRequest { message, code } => (code, message, Vec::new()),
            AppError::Internal(e) => {
                // Detail stays in the logs; clients get an opaque message.
                tracing::error!(error_id = %error_id, error = ?e, "internal error");
                (
                    "internal_error".to_string(),
                    INTERNAL_MESSAGE.to_string(),
                    Vec::new(),
                )
            }
        };

        tracing::warn!(
            error_id = %error_id,
            error_code = %code,
            status_code = %status.as_u16(),
            "Request error"
        );

        let body = ErrorEnvelope {
            error: ErrorBody {
                code,
                message,
                details,
                trace_id: error_id.to_string(),
                timestamp,
            },
        };

        (status, Json(body)).into_response()
    }
}
