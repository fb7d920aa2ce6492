//! services/api/src/web/protocol.rs
//!
//! Defines the JSON messages exchanged between the browser editor and the API server.

use chrono::{DateTime, Utc};
use document_generator_core::{
    domain::{BlockKind, Document, IndentDirection},
    outline::Outline,
    ports::TextExtractor,
    OutlineResult,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// One edit to a session's document. Every command is followed by a full
/// outline regeneration.
#[derive(Deserialize, Debug, Clone, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditCommand {
    SetTitle {
        title: String,
    },
    SetGeneralInstruction {
        instruction: String,
    },

    /// Adds an empty block after `after`, or at the end when absent.
    AddBlock {
        #[schema(value_type = String)]
        kind: BlockKind,
        #[serde(default)]
        after: Option<Uuid>,
    },
    DeleteBlock {
        block_id: Uuid,
    },
    UpdateContent {
        block_id: Uuid,
        content: String,
    },
    UpdateHeading {
        block_id: Uuid,
        heading: String,
    },
    ConvertBlock {
        block_id: Uuid,
        #[schema(value_type = String)]
        kind: BlockKind,
    },
    ToggleCollapsed {
        block_id: Uuid,
    },
    SetAllCollapsed {
        collapsed: bool,
    },
    Indent {
        block_id: Uuid,
        #[schema(value_type = String)]
        direction: IndentDirection,
    },
    SetIndentLevel {
        block_id: Uuid,
        level: usize,
    },

    AttachResource {
        block_id: Uuid,
        #[schema(value_type = String)]
        path: PathBuf,
    },
    DetachResource {
        block_id: Uuid,
        #[schema(value_type = String)]
        path: PathBuf,
    },
    RemoveResource {
        #[schema(value_type = String)]
        path: PathBuf,
    },
    SetResourceTitle {
        #[schema(value_type = String)]
        path: PathBuf,
        title: String,
    },
    SetResourceDescription {
        #[schema(value_type = String)]
        path: PathBuf,
        description: String,
    },
    /// Edits a resource description from one of the blocks that uses it.
    SetBlockResourceDescription {
        block_id: Uuid,
        #[schema(value_type = String)]
        path: PathBuf,
        description: String,
    },

    /// Starts over with a fresh draft.
    Reset,
}

impl EditCommand {
    /// `extractor` reads `.docx` resources when a block attaches one.
    pub fn apply(self, document: &mut Document, extractor: &dyn TextExtractor) -> OutlineResult<()> {
        match self {
            EditCommand::SetTitle { title } => document.title = title,
            EditCommand::SetGeneralInstruction { instruction } => {
                document.general_instruction = instruction
            }
            EditCommand::AddBlock { kind, after } => {
                document.add_block(kind, after);
            }
            EditCommand::DeleteBlock { block_id } => document.delete_block(block_id)?,
            EditCommand::UpdateContent { block_id, content } => {
                document.update_content(block_id, &content)?
            }
            EditCommand::UpdateHeading { block_id, heading } => {
                document.update_heading(block_id, &heading)?
            }
            EditCommand::ConvertBlock { block_id, kind } => document.convert_block(block_id, kind)?,
            EditCommand::ToggleCollapsed { block_id } => {
                document.toggle_collapsed(block_id)?;
            }
            EditCommand::SetAllCollapsed { collapsed } => document.set_all_collapsed(collapsed),
            EditCommand::Indent {
                block_id,
                direction,
            } => {
                document.indent(block_id, direction)?;
            }
            EditCommand::SetIndentLevel { block_id, level } => {
                document.set_indent_level(block_id, level)?;
            }
            EditCommand::AttachResource { block_id, path } => {
                document.attach_resource(block_id, &path, extractor)?
            }
            EditCommand::DetachResource { block_id, path } => {
                document.detach_resource(block_id, &path)?
            }
            EditCommand::RemoveResource { path } => document.remove_resource(&path)?,
            EditCommand::SetResourceTitle { path, title } => {
                document.set_resource_title(&path, &title)?
            }
            EditCommand::SetResourceDescription { path, description } => {
                document.set_resource_description(&path, &description)?
            }
            EditCommand::SetBlockResourceDescription {
                block_id,
                path,
                description,
            } => document.set_block_resource_description(block_id, &path, &description)?,
            EditCommand::Reset => *document = Document::new_draft(),
        }
        Ok(())
    }
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// The full state of a session, returned after every change.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub document: Document,
    #[schema(value_type = Object)]
    pub outline: Outline,
    pub generated_markdown: Option<String>,
}

/// The result of a generation run.
#[derive(Serialize, Debug, Clone, ToSchema)]
pub struct GenerateResponse {
    pub session_id: Uuid,
    pub markdown: String,
    #[schema(value_type = String)]
    pub markdown_path: PathBuf,
    #[schema(value_type = String)]
    pub docx_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_generator_core::ports::PlainTextOnly;

    #[test]
    fn commands_are_tagged_by_type() {
        let command: EditCommand = serde_json::from_str(
            r#"{"type":"add_block","kind":"text"}"#,
        )
        .unwrap();
        assert!(matches!(
            command,
            EditCommand::AddBlock {
                kind: BlockKind::Text,
                after: None
            }
        ));

        let command: EditCommand =
            serde_json::from_str(r#"{"type":"indent","block_id":"6f1c2d1e-7c1b-4a43-9a3c-1b0c8f8f0a11","direction":"out"}"#)
                .unwrap();
        assert!(matches!(
            command,
            EditCommand::Indent {
                direction: IndentDirection::Out,
                ..
            }
        ));
    }

    #[test]
    fn reset_restores_draft_layout() {
        let mut document = Document::new_draft();
        document.title = "Old".into();
        EditCommand::Reset.apply(&mut document, &PlainTextOnly).unwrap();
        assert!(document.title.is_empty());
        assert_eq!(document.blocks.len(), 2);
    }
}
