use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{models::FieldErrors, service::ServiceError};

/// Realm announced in the `WWW-Authenticate` challenge.
pub const REALM: &str = "people-registry";

/// ApiError
///
/// The single error type returned by handlers and the `AuthUser` extractor. Every variant
/// is recoverable; none of them terminate the process.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller could not be identified at all.
    #[error("authentication required")]
    Unauthenticated,
    /// The caller is known but lacks the role the operation needs.
    #[error("missing role {0}")]
    Forbidden(&'static str),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("validation failed")]
    Validation(FieldErrors),
    /// The body is not JSON, or not shaped like the expected payload.
    #[error("{}", .0.body_text())]
    Body(#[from] JsonRejection),
    #[error("internal error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::Duplicate { .. } => ApiError::Conflict(message),
            ServiceError::Store(e) => {
                // Details stay in the logs, the client only sees a generic 500.
                tracing::error!(error = %e, "store failure");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match self {
            ApiError::Validation(fields) => (status, Json(fields)).into_response(),
            ApiError::Unauthenticated => (
                status,
                [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", REALM))],
                Json(serde_json::json!({"error": message})),
            )
                .into_response(),
            _ => (status, Json(serde_json::json!({"error": message}))).into_response(),
        }
    }
}
