//! services/api/src/adapters/export.rs
//!
//! Writes generated markdown to disk as `{title}.md` and `{title}.docx`.

use crate::adapters::docx::write_markdown_docx;
use document_generator_core::ports::{DocumentExporter, PortError, PortResult};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Default)]
pub struct FileExporter;

/// Turns a document title into a file stem that is safe on every platform.
pub fn safe_file_stem(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim();
    if stem.is_empty() {
        "document".to_string()
    } else {
        stem.to_string()
    }
}

fn prepare(directory: &Path, base_name: &str, extension: &str) -> PortResult<PathBuf> {
    fs::create_dir_all(directory).map_err(|e| PortError::Unexpected(e.to_string()))?;
    Ok(directory.join(format!("{}.{}", safe_file_stem(base_name), extension)))
}

impl DocumentExporter for FileExporter {
    fn export_markdown(&self, markdown: &str, directory: &Path, base_name: &str) -> PortResult<PathBuf> {
        let path = prepare(directory, base_name, "md")?;
        fs::write(&path, markdown).map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(path)
    }

    fn export_docx(&self, markdown: &str, directory: &Path, base_name: &str) -> PortResult<PathBuf> {
        let path = prepare(directory, base_name, "docx")?;
        write_markdown_docx(markdown, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DocxTextExtractor;
    use document_generator_core::ports::TextExtractor;
    use tempfile::TempDir;

    #[test]
    fn stems_are_filesystem_safe() {
        assert_eq!(safe_file_stem("Q3 Report: draft/v2"), "Q3 Report_ draft_v2");
        assert_eq!(safe_file_stem("   "), "document");
    }

    #[test]
    fn writes_markdown_named_after_title() {
        let dir = TempDir::new().unwrap();
        let path = FileExporter
            .export_markdown("# Hi\n", &dir.path().join("out"), "Weekly Plan")
            .unwrap();
        assert_eq!(path, dir.path().join("out").join("Weekly Plan.md"));
        assert_eq!(fs::read_to_string(path).unwrap(), "# Hi\n");
    }

    #[test]
    fn writes_docx_beside_the_markdown() {
        let dir = TempDir::new().unwrap();
        let md = FileExporter
            .export_markdown("# Weekly Plan\n\nBody text.\n", dir.path(), "Weekly Plan")
            .unwrap();
        let docx = FileExporter
            .export_docx("# Weekly Plan\n\nBody text.\n", dir.path(), "Weekly Plan")
            .unwrap();

        assert_eq!(docx.parent(), md.parent());
        assert_eq!(docx.file_name().unwrap(), "Weekly Plan.docx");
        let text = DocxTextExtractor.extract_text(&docx).unwrap();
        assert_eq!(text, "Weekly Plan\n\nBody text.");
    }
}
