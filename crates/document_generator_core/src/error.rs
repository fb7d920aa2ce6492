//! crates/document_generator_core/src/error.rs
//!
//! Error kinds raised while editing a document or converting it to and from
//! the outline format. Every kind is recoverable: callers report it and keep
//! their previous state.

use crate::ports::PortError;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutlineError {
    /// A section carries neither a `prompt` nor a `resource_key` and the import
    /// was told not to fall back to an empty AI block.
    #[error("Section {position} has neither a prompt nor a resource key")]
    MalformedSection { position: String },

    /// A `refs` entry or `resource_key` names a resource the outline does not declare.
    #[error("Resource key '{key}' does not match any declared resource")]
    DanglingResourceKey { key: String },

    #[error("Failed to read resource file {}: {source}", path.display())]
    UnreadableResourceFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported resource file type: {}", path.display())]
    UnsupportedResourceType { path: PathBuf },

    /// The document is encrypted or password protected and its text cannot be read.
    #[error("Document {} appears to be protected or encrypted and cannot be processed", path.display())]
    ProtectedDocument { path: PathBuf },

    /// An imported resource path points outside the directory it was extracted to.
    #[error("Resource path {} escapes the import directory", path.display())]
    UnsafeResourcePath { path: PathBuf },

    /// Another resource already uses this path.
    #[error("Resource already registered: {}", .0.display())]
    DuplicateResource(PathBuf),

    #[error("Block not found: {0}")]
    BlockNotFound(Uuid),

    #[error("Resource not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    #[error("Only AI and text blocks can be converted into each other")]
    InvalidBlockConversion,

    #[error("Invalid outline JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),
}

/// A convenience type alias for `Result<T, OutlineError>`.
pub type OutlineResult<T> = Result<T, OutlineError>;
