use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        code: &'static str,
        message: String,
    },
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,
    #[error("You do not have permission to perform this action.")]
    PermissionDenied,
    #[error("Not found.")]
    NotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid_choice(field: &'static str, value: impl fmt::Display) -> Self {
        ApiError::Validation {
            field,
            code: "invalid_choice",
            message: format!("\"{}\" is not a valid choice.", value),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Validation {
                field,
                code,
                message,
            } => {
                let mut fields = Map::new();
                fields.insert(
                    (*field).to_string(),
                    json!([{ "code": code, "message": message }]),
                );
                (StatusCode::BAD_REQUEST, Value::Object(fields))
            }
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, json!({ "detail": self.to_string() }))
            }
            ApiError::PermissionDenied => {
                (StatusCode::FORBIDDEN, json!({ "detail": self.to_string() }))
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, json!({ "detail": self.to_string() })),
            ApiError::Internal(e) => {
                tracing::error!(error.cause_chain = ?e, error.message = %e, "unexpected error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Internal server error." }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
