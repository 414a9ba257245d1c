//! Request-level errors and their HTTP mapping.

use crate::database::StoreError;
use crate::models::Envelope;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or incomplete request input (400).
    #[error("{0}")]
    Validation(String),

    /// The record an update targets does not exist (400).
    #[error("{0}")]
    NoSuchRecord(String),

    /// Lookup found nothing (404). Carries the `result` payload verbatim.
    #[error("Not found: {0}")]
    NotFound(Value),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ApiError {
    /// Missing required body keys, listed in declaration order.
    pub fn missing_params(missing: &[&str]) -> Self {
        ApiError::Validation(format!(
            "Missing params in request body: {}",
            missing.join(",")
        ))
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(Value::String(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::NoSuchRecord(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(StoreError::Search(_) | StoreError::Reference(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let result = match self {
            ApiError::NotFound(payload) => payload,
            other => {
                if status.is_server_error() {
                    tracing::error!(error = %other, "request failed");
                } else {
                    tracing::debug!(error = %other, "request rejected");
                }
                Value::String(other.to_string())
            }
        };
        (status, Json(Envelope::failure(result))).into_response()
    }
}
