use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vitalog_core::error::{self, ApiError, FieldError};

/// Internal error type that converts to structured API responses
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Validation error (400)
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Addressed record does not exist (404)
    #[error("{resource} '{id}' not found")]
    NotFound { resource: &'static str, id: String },
    /// Missing or invalid bearer token (401)
    #[error("{message}")]
    Unauthorized { message: String },
    /// Database error after bounded retries (500)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Internal error (500)
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let (status, api_error) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: error::codes::VALIDATION_FAILED.to_string(),
                    message,
                    field,
                    received,
                    request_id,
                    docs_hint,
                },
            ),
            AppError::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: error::codes::NOT_FOUND.to_string(),
                    message: format!("{resource} '{id}' not found"),
                    field: None,
                    received: Some(serde_json::Value::String(id)),
                    request_id,
                    docs_hint: None,
                },
            ),
            AppError::Unauthorized { message } => (
                StatusCode::UNAUTHORIZED,
                ApiError {
                    error: error::codes::UNAUTHORIZED.to_string(),
                    message,
                    field: None,
                    received: None,
                    request_id,
                    docs_hint: Some(
                        "Include 'Authorization: Bearer <token>' with a token from the identity provider."
                            .to_string(),
                    ),
                },
            ),
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::DATABASE_ERROR.to_string(),
                        message: "A storage error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError {
                        error: error::codes::INTERNAL_ERROR.to_string(),
                        message: "An internal error occurred".to_string(),
                        field: None,
                        received: None,
                        request_id,
                        docs_hint: None,
                    },
                )
            }
        };

        (status, Json(api_error)).into_response()
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        AppError::Validation {
            message: err.message,
            field: Some(err.field),
            received: None,
            docs_hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_a_readable_message() {
        let err = AppError::NotFound {
            resource: "journal entry",
            id: "2026-03-01".to_string(),
        };
        assert_eq!(err.to_string(), "journal entry '2026-03-01' not found");
    }

    #[test]
    fn field_errors_become_validation_errors() {
        let err: AppError = FieldError::new("moodScore", "must be between 1 and 5").into();
        match err {
            AppError::Validation { field, message, .. } => {
                assert_eq!(field.as_deref(), Some("moodScore"));
                assert_eq!(message, "must be between 1 and 5");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
