use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use painterp_core::DomainError;
use painterp_infra::ServiceError;

/// Error returned by handlers. Rendered as `{success: false, message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("{0}")]
    NotFound(String),

    /// Storage or other infrastructure failure. `detail` is only sent to
    /// clients outside production.
    #[error("{message}")]
    Internal { message: String, detail: String },
}

/// Message and underlying cause of a 5xx, attached to the response as an
/// extension.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    pub message: String,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// Map a service failure. `context` is the client-facing message for
    /// infrastructure errors (e.g. "Error creating invoice").
    pub fn from_service(err: ServiceError, context: &str) -> Self {
        match err {
            ServiceError::Domain(DomainError::NotFound(msg)) => ApiError::NotFound(msg),
            ServiceError::Domain(domain) => ApiError::BadRequest(domain.to_string()),
            ServiceError::Store(detail) => ApiError::Internal {
                message: context.to_string(),
                detail,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        let detail = match self {
            ApiError::Internal { detail, .. } => {
                error!(%message, %detail, "request failed");
                Some(detail)
            }
            _ => None,
        };

        let mut response = json_error(status, message.clone());
        if let Some(detail) = detail {
            response
                .extensions_mut()
                .insert(ErrorDetail { message, detail });
        }
        response
    }
}

/// Attach `context` to service failures.
pub trait ServiceResultExt<T> {
    fn or_api(self, context: &str) -> Result<T, ApiError>;
}

impl<T> ServiceResultExt<T> for Result<T, ServiceError> {
    fn or_api(self, context: &str) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::from_service(e, context))
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "message": message.into(),
        })),
    )
        .into_response()
}
