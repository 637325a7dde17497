//! Error taxonomy shared by the event and booking modules.

use devevent_db::DbError;
use devevent_http::error::AppError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: String,
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{field} '{value}' is already taken")]
    Conflict { field: String, value: String },

    #[error("store failure: {0}")]
    Store(#[source] DbError),
}

impl CoreError {
    pub fn validation(field: &'static str, error: impl Into<String>) -> Self {
        Self::Validation {
            message: "Validation failed".to_string(),
            details: vec![FieldError {
                field,
                error: error.into(),
            }],
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<DbError> for CoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::DuplicateKey { field, value, .. } => CoreError::Conflict { field, value },
            other => CoreError::Store(other),
        }
    }
}

/// Collects field errors so a request reports every bad field at once.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn push(&mut self, field: &'static str, error: impl Into<String>) {
        self.0.push(FieldError {
            field,
            error: error.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was recorded, otherwise a validation error.
    pub fn finish(self, message: impl Into<String>) -> Result<(), CoreError> {
        if self.0.is_empty() {
            return Ok(());
        }
        Err(CoreError::Validation {
            message: message.into(),
            details: self.0,
        })
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message, details } => AppError::validation(
                details
                    .into_iter()
                    .map(|d| json!({"field": d.field, "error": d.error}))
                    .collect(),
                message,
            ),
            CoreError::NotFound(message) => AppError::not_found(message),
            CoreError::Conflict { field, value } => {
                let message = format!("{field} '{value}' is already taken");
                AppError::conflict(vec![json!({"field": field, "value": value})], message)
            }
            CoreError::Store(e) => AppError::Internal(anyhow::Error::new(e)),
        }
    }
}
