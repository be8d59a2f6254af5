//! Protocol-level error responses

use crate::error::{SelectorParseError, StorageError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors returned by the HTTP layer
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    BadSelector(#[from] SelectorParseError),

    #[error("the server could not find the requested resource {0}")]
    UnknownResource(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Storage(StorageError::NotFound(_)) | ApiError::UnknownResource(_) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Storage(StorageError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadSelector(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            ApiError::Storage(StorageError::NotFound(_)) | ApiError::UnknownResource(_) => {
                "NotFound"
            }
            ApiError::Storage(StorageError::Unavailable(_)) => "ServiceUnavailable",
            ApiError::BadSelector(_) => "BadRequest",
        }
    }
}

/// Kubernetes-style `Status` object
#[derive(Debug, Serialize)]
pub struct Status {
    pub kind: &'static str,
    #[serde(rename = "apiVersion")]
    pub api_version: &'static str,
    pub status: &'static str,
    pub message: String,
    pub reason: &'static str,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        match &self {
            // Expected outcomes for clients probing entities
            ApiError::Storage(StorageError::NotFound(_)) | ApiError::UnknownResource(_) => {
                debug!(error = %self, "Resource not found")
            }
            _ => warn!(error = %self, code = code.as_u16(), "Request failed"),
        }

        let body = Status {
            kind: "Status",
            api_version: "v1",
            status: "Failure",
            message: self.to_string(),
            reason: self.reason(),
            code: code.as_u16(),
        };
        (code, Json(body)).into_response()
    }
}
