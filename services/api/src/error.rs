//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how it is
//! reported to HTTP clients.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use document_generator_core::{ports::PortError, OutlineError};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// An editing or conversion step was refused; the session kept its previous state.
    #[error("{0}")]
    Outline(#[from] OutlineError),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A file-handling task moved off the async runtime panicked or was cancelled.
    #[error("Background file task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Port(PortError::Protected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Port(_) => StatusCode::BAD_GATEWAY,
            ApiError::Outline(err) => match err {
                OutlineError::BlockNotFound(_) | OutlineError::ResourceNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                OutlineError::DuplicateResource(_) => StatusCode::CONFLICT,
                OutlineError::MalformedSection { .. }
                | OutlineError::DanglingResourceKey { .. }
                | OutlineError::UnreadableResourceFile { .. }
                | OutlineError::UnsupportedResourceType { .. }
                | OutlineError::ProtectedDocument { .. }
                | OutlineError::UnsafeResourcePath { .. }
                | OutlineError::InvalidBlockConversion
                | OutlineError::Json(_) => StatusCode::UNPROCESSABLE_ENTITY,
                OutlineError::Port(PortError::Protected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
                OutlineError::Port(_) => StatusCode::BAD_GATEWAY,
                OutlineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Config(_) | ApiError::Io(_) | ApiError::Blocking(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn conversion_errors_are_client_errors() {
        let err = ApiError::from(OutlineError::DanglingResourceKey {
            key: "resource_3".into(),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(OutlineError::ResourceNotFound(PathBuf::from("/x")));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rejected_files_are_client_errors() {
        let err = ApiError::from(OutlineError::UnsafeResourcePath {
            path: PathBuf::from("../../etc/passwd"),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(OutlineError::ProtectedDocument {
            path: PathBuf::from("locked.docx"),
        });
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(PortError::Protected("locked.docx".into()));
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let err = ApiError::from(OutlineError::DuplicateResource(PathBuf::from("/files/a.md")));
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn generation_failures_are_gateway_errors() {
        let err = ApiError::from(PortError::Unexpected("model offline".into()));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }
}
