//! services/api/src/error.rs
//!
//! Defines the error types for the API service: `ApiError` for startup failures and
//! `AppError` for failures scoped to a single request.

use crate::config::ConfigError;
use crate::credentials::CredentialError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use family_records_core::ports::PortError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for starting the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure to apply the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Credential Error: {0}")]
    Credentials(#[from] CredentialError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failure reported back to the user for one request. The session survives all of them.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A required field is missing or malformed. Nothing was written.
    #[error("{0}")]
    Validation(String),
    /// Wrong credentials, duplicate registration, or no valid session.
    #[error("{0}")]
    Authentication(String),
    /// The signed-in role may not perform this action.
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// The request body is larger than the configured limit.
    #[error("{0}")]
    PayloadTooLarge(String),
    /// The document store failed. Shown to the user instead of crashing the session.
    #[error("Document storage is unavailable: {0}")]
    Storage(String),
    #[error("An unexpected internal error occurred")]
    Internal(String),
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => AppError::NotFound(what),
            PortError::Conflict(what) => AppError::Conflict(what),
            PortError::Unauthorized => AppError::Authentication("Unauthorized".to_string()),
            PortError::Storage(msg) => AppError::Storage(msg),
            PortError::Unexpected(msg) => AppError::Internal(msg),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// The JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Storage(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(detail) = &self {
            error!("Internal error: {}", detail);
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
