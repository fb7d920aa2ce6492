//! crates/document_generator_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the generation engine, the archive container and the export format.

use crate::outline::Outline;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external collaborators (network, archive, disk).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Protected document: {0}")]
    Protected(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Bundle Members
//=========================================================================================

/// Where the bytes of a bundle member come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberSource {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// One named entry of a `.docpack` bundle. Names use `/` separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleMember {
    pub name: String,
    pub source: MemberSource,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Produces the final markdown document for an outline.
    async fn generate_document(&self, outline: &Outline, session_id: Uuid) -> PortResult<String>;
}

/// The archive container behind `.docpack` files.
pub trait DocpackCodec: Send + Sync {
    /// Writes every member into a single archive at `output`.
    fn write_bundle(&self, output: &Path, members: &[BundleMember]) -> PortResult<()>;

    /// Unpacks every member of `archive` below `destination`, keeping member names as relative paths.
    fn extract_bundle(&self, archive: &Path, destination: &Path) -> PortResult<()>;
}

pub trait DocumentExporter: Send + Sync {
    /// Writes generated markdown into `directory` and returns the written file.
    fn export_markdown(&self, markdown: &str, directory: &Path, base_name: &str)
        -> PortResult<PathBuf>;

    /// Converts generated markdown to a Word document in `directory`.
    fn export_docx(&self, markdown: &str, directory: &Path, base_name: &str)
        -> PortResult<PathBuf>;
}

/// Reads the plain text out of rich document formats (DOCX) used as resources.
pub trait TextExtractor: Send + Sync {
    /// Returns the document's non-empty paragraphs separated by blank lines.
    /// Encrypted or password-protected files fail with [`PortError::Protected`].
    fn extract_text(&self, path: &Path) -> PortResult<String>;
}

/// Extractor for callers that only deal with plain-text resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextOnly;

impl TextExtractor for PlainTextOnly {
    fn extract_text(&self, path: &Path) -> PortResult<String> {
        Err(PortError::Unexpected(format!(
            "no rich document reader configured for {}",
            path.display()
        )))
    }
}
