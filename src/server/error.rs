//! Failure envelope and the mapping from service errors to HTTP statuses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::errors::DatasetError;
use crate::server::middleware::validation::FieldErrors;

#[derive(Debug)]
pub enum ApiError {
    /// Request failed schema validation; carries the field error tree
    Validation { message: String, errors: FieldErrors },
    /// Known failure with an explicit status
    Status { status: StatusCode, message: String },
    /// Anything else; details are logged, never returned
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn validation(errors: FieldErrors) -> Self {
        ApiError::Validation {
            message: "Validation error".to_string(),
            errors,
        }
    }

    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(StatusCode::BAD_REQUEST, message)
    }

    /// Map a service error for one route. Not-found statuses differ between
    /// routes, and so does the message used for store failures.
    pub fn from_service(err: DatasetError, not_found: StatusCode, failure: &str) -> Self {
        match err {
            DatasetError::DatasetNotFound(_) => Self::status(not_found, "Dataset not found"),
            DatasetError::RowNotFound { .. } => Self::status(not_found, "Row not found"),
            DatasetError::InvalidRowData(message) => Self::bad_request(message),
            other => {
                error!(code = other.error_code(), "{}: {}", failure, other);
                Self::status(StatusCode::INTERNAL_SERVER_ERROR, failure)
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Status { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Validation { message, errors } => {
                debug!("Rejected request: {}", errors);
                json!({
                    "success": false,
                    "data": null,
                    "message": message,
                    "errors": errors,
                })
            }
            ApiError::Status { message, .. } => {
                if status.is_client_error() {
                    warn!("{} {}", status.as_u16(), message);
                }
                json!({
                    "success": false,
                    "data": null,
                    "message": message,
                })
            }
            ApiError::Internal(err) => {
                error!("Unhandled error: {:#}", err);
                json!({
                    "success": false,
                    "data": null,
                    "message": "Internal server error",
                })
            }
        };

        (status, Json(body)).into_response()
    }
}
