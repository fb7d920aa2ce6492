//! crates/document_generator_core/src/domain.rs
//!
//! Defines the editor's data model: a flat list of blocks, each carrying an
//! indent level, plus the document-wide resource list.
//! Blocks refer to resources by path; titles and descriptions live once in
//! `Document::resources`, so an edit made through any block is seen by all of them.

use crate::error::{OutlineError, OutlineResult};
use crate::ports::{PortError, TextExtractor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Deepest indent level a block can be moved to.
pub const MAX_INDENT_LEVEL: usize = 5;

/// Text given to freshly added heading blocks.
pub const DEFAULT_HEADING_TEXT: &str = "Heading";

pub const DOCX_EXTENSION: &str = "docx";

//=========================================================================================
// Blocks
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Ai,
    Text,
    Heading,
}

/// A section whose prose is written by the generation engine from a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBlock {
    #[serde(default)]
    pub heading: String,
    /// The prompt.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub resources: Vec<PathBuf>,
}

/// A section copied verbatim into the output, either from a resource file or
/// from text typed into the block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub resource: Option<PathBuf>,
    /// Set once the user typed into the block; the literal content then
    /// supersedes any attached file and is saved as an inline resource.
    #[serde(default)]
    pub edited: bool,
}

/// A purely visual divider. Not part of the generated section tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingBlock {
    #[serde(default)]
    pub content: String,
}

impl Default for HeadingBlock {
    fn default() -> Self {
        Self {
            content: DEFAULT_HEADING_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockBody {
    Ai(AiBlock),
    Text(TextBlock),
    Heading(HeadingBlock),
}

impl BlockBody {
    pub fn empty(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Ai => BlockBody::Ai(AiBlock::default()),
            BlockKind::Text => BlockBody::Text(TextBlock::default()),
            BlockKind::Heading => BlockBody::Heading(HeadingBlock::default()),
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            BlockBody::Ai(_) => BlockKind::Ai,
            BlockBody::Text(_) => BlockKind::Text,
            BlockBody::Heading(_) => BlockKind::Heading,
        }
    }

    /// The section title. Heading blocks have none.
    pub fn heading(&self) -> &str {
        match self {
            BlockBody::Ai(ai) => &ai.heading,
            BlockBody::Text(text) => &text.heading,
            BlockBody::Heading(_) => "",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            BlockBody::Ai(ai) => &ai.content,
            BlockBody::Text(text) => &text.content,
            BlockBody::Heading(heading) => &heading.content,
        }
    }

    fn set_heading(&mut self, heading: String) {
        match self {
            BlockBody::Ai(ai) => ai.heading = heading,
            BlockBody::Text(text) => text.heading = heading,
            BlockBody::Heading(block) => block.content = heading,
        }
    }

    fn references(&self, path: &Path) -> bool {
        match self {
            BlockBody::Ai(ai) => ai.resources.iter().any(|p| p == path),
            BlockBody::Text(text) => text.resource.as_deref() == Some(path),
            BlockBody::Heading(_) => false,
        }
    }

    /// Drops the reference to `path`; a text block losing its file also loses the loaded text.
    fn forget_resource(&mut self, path: &Path) {
        match self {
            BlockBody::Ai(ai) => ai.resources.retain(|p| p != path),
            BlockBody::Text(text) => {
                if text.resource.as_deref() == Some(path) {
                    text.resource = None;
                    text.content.clear();
                }
            }
            BlockBody::Heading(_) => {}
        }
    }

    fn repoint_resource(&mut self, old: &Path, new: &Path) {
        match self {
            BlockBody::Ai(ai) => {
                for path in ai.resources.iter_mut().filter(|p| p.as_path() == old) {
                    *path = new.to_path_buf();
                }
            }
            BlockBody::Text(text) => {
                if text.resource.as_deref() == Some(old) {
                    text.resource = Some(new.to_path_buf());
                }
            }
            BlockBody::Heading(_) => {}
        }
    }
}

fn collapsed_by_default() -> bool {
    true
}

/// One editable unit of the flat outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: Uuid,
    #[serde(flatten)]
    pub body: BlockBody,
    /// Display state only.
    #[serde(default = "collapsed_by_default")]
    pub collapsed: bool,
    #[serde(default)]
    pub indent_level: usize,
    /// The other variant's content, kept while the block is converted between AI and text.
    #[serde(skip)]
    parked: Option<BlockBody>,
}

impl Block {
    pub fn new(body: BlockBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            body,
            collapsed: true,
            indent_level: 0,
            parked: None,
        }
    }

    pub fn ai(heading: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(BlockBody::Ai(AiBlock {
            heading: heading.into(),
            content: prompt.into(),
            resources: Vec::new(),
        }))
    }

    pub fn text(heading: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(BlockBody::Text(TextBlock {
            heading: heading.into(),
            content: content.into(),
            resource: None,
            edited: false,
        }))
    }

    pub fn heading(content: impl Into<String>) -> Self {
        Self::new(BlockBody::Heading(HeadingBlock {
            content: content.into(),
        }))
    }

    pub fn with_indent(mut self, indent_level: usize) -> Self {
        self.indent_level = indent_level;
        self
    }

    pub fn kind(&self) -> BlockKind {
        self.body.kind()
    }

    /// Whether the block carries anything worth emitting as a section:
    /// a heading, content or a resource. Heading blocks never do.
    pub fn has_material(&self) -> bool {
        match &self.body {
            BlockBody::Ai(ai) => {
                !ai.heading.is_empty() || !ai.content.is_empty() || !ai.resources.is_empty()
            }
            BlockBody::Text(text) => {
                !text.heading.is_empty() || !text.content.is_empty() || text.resource.is_some()
            }
            BlockBody::Heading(_) => false,
        }
    }
}

//=========================================================================================
// Resources
//=========================================================================================

/// A reference file available to the document's blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub path: PathBuf,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl Resource {
    /// A resource titled after its file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = file_name_of(&path);
        Self {
            path,
            title,
            description: String::new(),
        }
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

//=========================================================================================
// Document
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndentDirection {
    In,
    Out,
}

/// The whole editable state of one draft.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub general_instruction: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Document {
    /// The starting point of every new or reset session: an expanded empty AI
    /// block followed by a collapsed empty text block.
    pub fn new_draft() -> Self {
        let mut first = Block::new(BlockBody::empty(BlockKind::Ai));
        first.collapsed = false;
        Self {
            blocks: vec![first, Block::new(BlockBody::empty(BlockKind::Text))],
            ..Self::default()
        }
    }

    pub fn block(&self, id: Uuid) -> Option<&Block> {
        self.blocks.iter().find(|block| block.id == id)
    }

    fn position(&self, id: Uuid) -> OutlineResult<usize> {
        self.blocks
            .iter()
            .position(|block| block.id == id)
            .ok_or(OutlineError::BlockNotFound(id))
    }

    fn block_mut(&mut self, id: Uuid) -> OutlineResult<&mut Block> {
        self.blocks
            .iter_mut()
            .find(|block| block.id == id)
            .ok_or(OutlineError::BlockNotFound(id))
    }

    // --- Blocks ---

    /// Adds an empty block and returns its id.
    ///
    /// AI and text blocks go right after `after` (inheriting its indent level)
    /// when it names an existing block, otherwise to the end at level 0.
    /// Heading blocks are always appended.
    pub fn add_block(&mut self, kind: BlockKind, after: Option<Uuid>) -> Uuid {
        let mut block = Block::new(BlockBody::empty(kind));
        let id = block.id;
        let anchor = match kind {
            BlockKind::Heading => None,
            _ => after.and_then(|anchor| self.position(anchor).ok()),
        };
        match anchor {
            Some(index) => {
                block.indent_level = self.blocks[index].indent_level;
                self.blocks.insert(index + 1, block);
            }
            None => self.blocks.push(block),
        }
        id
    }

    /// Removes a block. Its descendants move up one level so none of them
    /// is left skipping a level.
    pub fn delete_block(&mut self, id: Uuid) -> OutlineResult<()> {
        let index = self.position(id)?;
        let removed = self.blocks.remove(index);
        self.shift_descendants(index, removed.indent_level, 1);
        Ok(())
    }

    /// Moves the run of blocks starting at `start` that sit deeper than
    /// `parent_level` up by `by` levels.
    fn shift_descendants(&mut self, start: usize, parent_level: usize, by: usize) {
        for block in self.blocks[start..].iter_mut() {
            if block.indent_level <= parent_level {
                break;
            }
            block.indent_level = block.indent_level.saturating_sub(by);
        }
    }

    /// Replaces the block's prompt, literal text or heading text.
    ///
    /// Typing non-empty text into a text block marks it edited and detaches its
    /// file: from then on the typed text is what gets generated.
    pub fn update_content(&mut self, id: Uuid, content: &str) -> OutlineResult<()> {
        let block = self.block_mut(id)?;
        match &mut block.body {
            BlockBody::Ai(ai) => ai.content = content.to_string(),
            BlockBody::Text(text) => {
                text.content = content.to_string();
                if !content.is_empty() {
                    text.edited = true;
                    text.resource = None;
                }
            }
            BlockBody::Heading(heading) => heading.content = content.to_string(),
        }
        Ok(())
    }

    pub fn update_heading(&mut self, id: Uuid, heading: &str) -> OutlineResult<()> {
        self.block_mut(id)?.body.set_heading(heading.to_string());
        Ok(())
    }

    /// Switches a block between AI and text. The content of the variant being
    /// left is parked on the block and restored if it is converted back.
    pub fn convert_block(&mut self, id: Uuid, to: BlockKind) -> OutlineResult<()> {
        let block = self.block_mut(id)?;
        let from = block.kind();
        if from == to {
            return Ok(());
        }
        if from == BlockKind::Heading || to == BlockKind::Heading {
            return Err(OutlineError::InvalidBlockConversion);
        }

        let mut restored = match block.parked.take() {
            Some(parked) if parked.kind() == to => parked,
            _ => BlockBody::empty(to),
        };
        restored.set_heading(block.body.heading().to_string());
        let previous = std::mem::replace(&mut block.body, restored);
        block.parked = Some(previous);
        Ok(())
    }

    /// Flips the block's display state and returns the new value.
    pub fn toggle_collapsed(&mut self, id: Uuid) -> OutlineResult<bool> {
        let block = self.block_mut(id)?;
        block.collapsed = !block.collapsed;
        Ok(block.collapsed)
    }

    pub fn set_all_collapsed(&mut self, collapsed: bool) {
        for block in &mut self.blocks {
            block.collapsed = collapsed;
        }
    }

    /// Moves a block one level in or out and returns its resulting level.
    pub fn indent(&mut self, id: Uuid, direction: IndentDirection) -> OutlineResult<usize> {
        let index = self.position(id)?;
        let current = self.blocks[index].indent_level;
        let requested = match direction {
            IndentDirection::In => current + 1,
            IndentDirection::Out => current.saturating_sub(1),
        };
        Ok(self.apply_indent(index, requested))
    }

    /// Requests an explicit level; deeper requests are capped so the block
    /// never skips a level below its predecessor.
    pub fn set_indent_level(&mut self, id: Uuid, level: usize) -> OutlineResult<usize> {
        let index = self.position(id)?;
        Ok(self.apply_indent(index, level))
    }

    fn apply_indent(&mut self, index: usize, requested: usize) -> usize {
        let current = self.blocks[index].indent_level;
        let level = if requested > current {
            // The first block has nothing to nest under.
            let ceiling = match index.checked_sub(1) {
                Some(previous) => (self.blocks[previous].indent_level + 1).min(MAX_INDENT_LEVEL),
                None => 0,
            };
            requested.min(ceiling).max(current)
        } else {
            requested
        };
        self.blocks[index].indent_level = level;
        if level < current {
            // Children follow their parent out.
            self.shift_descendants(index + 1, current, current - level);
        }
        level
    }

    // --- Resources ---

    pub fn resource(&self, path: &Path) -> Option<&Resource> {
        self.resources.iter().find(|resource| resource.path == path)
    }

    fn resource_mut(&mut self, path: &Path) -> OutlineResult<&mut Resource> {
        self.resources
            .iter_mut()
            .find(|resource| resource.path == path)
            .ok_or_else(|| OutlineError::ResourceNotFound(path.to_path_buf()))
    }

    /// Registers a resource. Returns `false` if one with the same path already exists.
    pub fn add_resource(&mut self, resource: Resource) -> bool {
        if self.resource(&resource.path).is_some() {
            return false;
        }
        self.resources.push(resource);
        true
    }

    /// The resources a block refers to, as stored in the document-wide list.
    pub fn block_resources(&self, id: Uuid) -> OutlineResult<Vec<&Resource>> {
        let block = self.block(id).ok_or(OutlineError::BlockNotFound(id))?;
        let paths: Vec<&Path> = match &block.body {
            BlockBody::Ai(ai) => ai.resources.iter().map(PathBuf::as_path).collect(),
            BlockBody::Text(text) => text.resource.iter().map(PathBuf::as_path).collect(),
            BlockBody::Heading(_) => Vec::new(),
        };
        Ok(paths
            .into_iter()
            .filter_map(|path| self.resource(path))
            .collect())
    }

    /// Attaches a registered resource to a block.
    ///
    /// AI blocks collect any number of distinct resources. A text block holds
    /// at most one: the new one replaces the old and its file is loaded as the
    /// block's text, through `extractor` for DOCX files. If that file cannot be
    /// read, nothing changes.
    pub fn attach_resource(
        &mut self,
        id: Uuid,
        path: &Path,
        extractor: &dyn TextExtractor,
    ) -> OutlineResult<()> {
        if self.resource(path).is_none() {
            return Err(OutlineError::ResourceNotFound(path.to_path_buf()));
        }
        let index = self.position(id)?;
        match &mut self.blocks[index].body {
            BlockBody::Ai(ai) => {
                if !ai.resources.iter().any(|p| p == path) {
                    ai.resources.push(path.to_path_buf());
                }
            }
            BlockBody::Text(text) => {
                let content = read_resource_text(path, extractor)?;
                text.resource = Some(path.to_path_buf());
                text.content = content;
                text.edited = false;
            }
            BlockBody::Heading(_) => return Err(OutlineError::InvalidBlockConversion),
        }
        Ok(())
    }

    pub fn detach_resource(&mut self, id: Uuid, path: &Path) -> OutlineResult<()> {
        self.block_mut(id)?.body.forget_resource(path);
        Ok(())
    }

    /// Removes a resource from the document and from every block using it.
    pub fn remove_resource(&mut self, path: &Path) -> OutlineResult<()> {
        let before = self.resources.len();
        self.resources.retain(|resource| resource.path != path);
        if self.resources.len() == before {
            return Err(OutlineError::ResourceNotFound(path.to_path_buf()));
        }
        for block in &mut self.blocks {
            block.body.forget_resource(path);
        }
        Ok(())
    }

    pub fn set_resource_title(&mut self, path: &Path, title: &str) -> OutlineResult<()> {
        self.resource_mut(path)?.title = title.to_string();
        Ok(())
    }

    pub fn set_resource_description(&mut self, path: &Path, description: &str) -> OutlineResult<()> {
        self.resource_mut(path)?.description = description.to_string();
        Ok(())
    }

    /// Edits a resource's description from one of the blocks that uses it.
    /// Every other block referencing the same path sees the change.
    pub fn set_block_resource_description(
        &mut self,
        id: Uuid,
        path: &Path,
        description: &str,
    ) -> OutlineResult<()> {
        let block = self.block(id).ok_or(OutlineError::BlockNotFound(id))?;
        if !block.body.references(path) {
            return Err(OutlineError::ResourceNotFound(path.to_path_buf()));
        }
        self.set_resource_description(path, description)
    }

    /// Points a resource at a new file. Title, description and list position
    /// are kept, so the resource's emitted key does not change. `new` must not
    /// belong to another resource.
    pub fn replace_resource_file(&mut self, old: &Path, new: &Path) -> OutlineResult<()> {
        if old != new && self.resource(new).is_some() {
            return Err(OutlineError::DuplicateResource(new.to_path_buf()));
        }
        self.resource_mut(old)?.path = new.to_path_buf();
        for block in &mut self.blocks {
            block.body.repoint_resource(old, new);
        }
        Ok(())
    }
}

pub fn is_docx(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCX_EXTENSION))
}

/// Loads a resource as text. DOCX files go through `extractor`; everything
/// else is read as UTF-8.
pub fn read_resource_text(path: &Path, extractor: &dyn TextExtractor) -> OutlineResult<String> {
    if is_docx(path) {
        if !path.exists() {
            return Err(OutlineError::UnreadableResourceFile {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        return extractor.extract_text(path).map_err(|e| match e {
            PortError::Protected(_) => OutlineError::ProtectedDocument {
                path: path.to_path_buf(),
            },
            other => OutlineError::Port(other),
        });
    }
    fs::read_to_string(path).map_err(|source| OutlineError::UnreadableResourceFile {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PlainTextOnly;
    use tempfile::TempDir;

    fn doc_with(blocks: Vec<Block>) -> Document {
        Document {
            blocks,
            ..Document::default()
        }
    }

    #[test]
    fn new_draft_has_expanded_ai_then_collapsed_text() {
        let doc = Document::new_draft();
        assert_eq!(doc.blocks.len(), 2);
        assert_eq!(doc.blocks[0].kind(), BlockKind::Ai);
        assert!(!doc.blocks[0].collapsed);
        assert_eq!(doc.blocks[1].kind(), BlockKind::Text);
        assert!(doc.blocks[1].collapsed);
    }

    #[test]
    fn add_block_after_anchor_inherits_indent() {
        let mut doc = doc_with(vec![Block::ai("A", ""), Block::ai("B", "").with_indent(1)]);
        let anchor = doc.blocks[1].id;
        let id = doc.add_block(BlockKind::Text, Some(anchor));
        assert_eq!(doc.blocks[2].id, id);
        assert_eq!(doc.blocks[2].indent_level, 1);

        let orphan = doc.add_block(BlockKind::Ai, Some(Uuid::new_v4()));
        assert_eq!(doc.blocks.last().map(|b| b.id), Some(orphan));
        assert_eq!(doc.blocks[3].indent_level, 0);
    }

    #[test]
    fn heading_blocks_are_appended() {
        let mut doc = doc_with(vec![Block::ai("A", ""), Block::ai("B", "")]);
        let first = doc.blocks[0].id;
        doc.add_block(BlockKind::Heading, Some(first));
        assert_eq!(doc.blocks[2].kind(), BlockKind::Heading);
        assert_eq!(doc.blocks[2].body.content(), DEFAULT_HEADING_TEXT);
    }

    #[test]
    fn editing_text_block_detaches_its_file() {
        let mut doc = doc_with(vec![Block::text("T", "")]);
        let id = doc.blocks[0].id;
        if let BlockBody::Text(text) = &mut doc.blocks[0].body {
            text.resource = Some(PathBuf::from("/tmp/a.txt"));
        }
        doc.update_content(id, "typed").unwrap();
        match &doc.blocks[0].body {
            BlockBody::Text(text) => {
                assert!(text.edited);
                assert_eq!(text.resource, None);
                assert_eq!(text.content, "typed");
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[test]
    fn convert_round_trip_restores_parked_content() {
        let mut doc = doc_with(vec![Block::ai("Intro", "Write intro")]);
        let id = doc.blocks[0].id;
        doc.convert_block(id, BlockKind::Text).unwrap();
        assert_eq!(doc.blocks[0].kind(), BlockKind::Text);
        assert_eq!(doc.blocks[0].body.heading(), "Intro");
        assert_eq!(doc.blocks[0].body.content(), "");

        doc.update_content(id, "literal").unwrap();
        doc.convert_block(id, BlockKind::Ai).unwrap();
        assert_eq!(doc.blocks[0].body.content(), "Write intro");

        doc.convert_block(id, BlockKind::Text).unwrap();
        assert_eq!(doc.blocks[0].body.content(), "literal");
    }

    #[test]
    fn heading_blocks_cannot_be_converted() {
        let mut doc = doc_with(vec![Block::heading("H")]);
        let id = doc.blocks[0].id;
        assert!(matches!(
            doc.convert_block(id, BlockKind::Ai),
            Err(OutlineError::InvalidBlockConversion)
        ));
    }

    #[test]
    fn first_block_cannot_be_indented() {
        let mut doc = doc_with(vec![Block::ai("A", ""), Block::ai("B", "")]);
        let first = doc.blocks[0].id;
        assert_eq!(doc.indent(first, IndentDirection::In).unwrap(), 0);
    }

    #[test]
    fn indent_is_capped_one_below_previous() {
        let mut doc = doc_with(vec![
            Block::ai("A", ""),
            Block::ai("B", "").with_indent(1),
            Block::ai("C", ""),
        ]);
        let third = doc.blocks[2].id;
        assert_eq!(doc.set_indent_level(third, 3).unwrap(), 2);
        assert_eq!(doc.indent(third, IndentDirection::In).unwrap(), 2);
        assert_eq!(doc.indent(third, IndentDirection::Out).unwrap(), 1);
        assert_eq!(doc.set_indent_level(third, 0).unwrap(), 0);
        assert_eq!(doc.indent(third, IndentDirection::Out).unwrap(), 0);
    }

    #[test]
    fn indent_never_exceeds_max_level() {
        let mut blocks = vec![Block::ai("root", "")];
        for level in 1..=MAX_INDENT_LEVEL {
            blocks.push(Block::ai(format!("L{level}"), "").with_indent(level));
        }
        blocks.push(Block::ai("last", "").with_indent(MAX_INDENT_LEVEL));
        let mut doc = doc_with(blocks);
        let last = doc.blocks.last().map(|b| b.id).unwrap();
        assert_eq!(
            doc.indent(last, IndentDirection::In).unwrap(),
            MAX_INDENT_LEVEL
        );
    }

    #[test]
    fn resource_description_propagates_to_every_block() {
        let path = PathBuf::from("/tmp/shared.txt");
        let mut doc = doc_with(vec![Block::ai("A", "a"), Block::ai("B", "b")]);
        doc.add_resource(Resource::from_path(&path));
        let (a, b) = (doc.blocks[0].id, doc.blocks[1].id);
        doc.attach_resource(a, &path, &PlainTextOnly).unwrap();
        doc.attach_resource(b, &path, &PlainTextOnly).unwrap();

        doc.set_block_resource_description(a, &path, "Quarterly numbers")
            .unwrap();

        assert_eq!(doc.block_resources(b).unwrap()[0].description, "Quarterly numbers");
        assert_eq!(doc.resource(&path).unwrap().description, "Quarterly numbers");
    }

    #[test]
    fn attaching_to_text_block_loads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# Notes").unwrap();

        let mut doc = doc_with(vec![Block::text("", "")]);
        let id = doc.blocks[0].id;
        doc.add_resource(Resource::from_path(&path));
        doc.attach_resource(id, &path, &PlainTextOnly).unwrap();
        assert_eq!(doc.blocks[0].body.content(), "# Notes");
    }

    #[test]
    fn unreadable_file_leaves_text_block_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.txt");
        let mut doc = doc_with(vec![Block::text("", "kept")]);
        let id = doc.blocks[0].id;
        doc.add_resource(Resource::from_path(&path));
        let before = doc.clone();

        let err = doc.attach_resource(id, &path, &PlainTextOnly).unwrap_err();
        assert!(matches!(err, OutlineError::UnreadableResourceFile { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn removing_resource_clears_text_blocks_using_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "body").unwrap();

        let mut doc = doc_with(vec![Block::ai("A", "a"), Block::text("T", "")]);
        let (ai, text) = (doc.blocks[0].id, doc.blocks[1].id);
        doc.add_resource(Resource::from_path(&path));
        doc.attach_resource(ai, &path, &PlainTextOnly).unwrap();
        doc.attach_resource(text, &path, &PlainTextOnly).unwrap();

        doc.remove_resource(&path).unwrap();
        assert!(doc.resources.is_empty());
        assert!(doc.block_resources(ai).unwrap().is_empty());
        assert_eq!(doc.blocks[1].body.content(), "");
    }

    #[test]
    fn replacing_file_keeps_metadata_and_position() {
        let old = PathBuf::from("/tmp/old.txt");
        let new = PathBuf::from("/tmp/new.txt");
        let mut doc = doc_with(vec![Block::ai("A", "a")]);
        doc.add_resource(Resource::from_path("/tmp/first.txt"));
        doc.add_resource(Resource::from_path(&old));
        doc.set_resource_title(&old, "Budget").unwrap();
        let id = doc.blocks[0].id;
        doc.attach_resource(id, &old, &PlainTextOnly).unwrap();

        doc.replace_resource_file(&old, &new).unwrap();
        assert_eq!(doc.resources[1].path, new);
        assert_eq!(doc.resources[1].title, "Budget");
        assert_eq!(doc.block_resources(id).unwrap()[0].path, new);
    }

    #[test]
    fn replacing_onto_another_resources_file_is_refused() {
        let a = PathBuf::from("/tmp/a.txt");
        let b = PathBuf::from("/tmp/b.txt");
        let mut doc = doc_with(vec![Block::ai("X", "x"), Block::ai("Y", "y")]);
        doc.add_resource(Resource::from_path(&a));
        doc.add_resource(Resource::from_path(&b));
        doc.set_resource_description(&b, "B only").unwrap();
        let (x, y) = (doc.blocks[0].id, doc.blocks[1].id);
        doc.attach_resource(x, &a, &PlainTextOnly).unwrap();
        doc.attach_resource(y, &b, &PlainTextOnly).unwrap();
        let before = doc.clone();

        let err = doc.replace_resource_file(&a, &b).unwrap_err();
        assert!(matches!(err, OutlineError::DuplicateResource(path) if path == b));
        assert_eq!(doc, before);

        // Re-uploading under the same name is still a plain replacement.
        doc.replace_resource_file(&a, &a).unwrap();
        assert_eq!(doc.resources.len(), 2);
    }

    #[test]
    fn outdenting_a_parent_takes_its_children_along() {
        let mut doc = doc_with(vec![
            Block::ai("A", "a"),
            Block::ai("B", "b").with_indent(1),
            Block::ai("C", "c").with_indent(2),
            Block::ai("D", "d").with_indent(1),
        ]);
        let b = doc.blocks[1].id;
        assert_eq!(doc.indent(b, IndentDirection::Out).unwrap(), 0);
        let levels: Vec<usize> = doc.blocks.iter().map(|b| b.indent_level).collect();
        assert_eq!(levels, [0, 0, 1, 1]);
    }

    #[test]
    fn deleting_a_parent_promotes_its_children() {
        let mut doc = doc_with(vec![
            Block::ai("A", "a"),
            Block::ai("B", "b").with_indent(1),
            Block::ai("C", "c").with_indent(2),
            Block::ai("D", "d").with_indent(3),
            Block::ai("E", "e").with_indent(1),
        ]);
        let b = doc.blocks[1].id;
        doc.delete_block(b).unwrap();
        let levels: Vec<usize> = doc.blocks.iter().map(|b| b.indent_level).collect();
        assert_eq!(levels, [0, 1, 2, 1]);
    }

    #[test]
    fn docx_text_goes_through_the_extractor() {
        struct Fixed;
        impl TextExtractor for Fixed {
            fn extract_text(&self, _path: &Path) -> crate::ports::PortResult<String> {
                Ok("From Word".into())
            }
        }
        struct Locked;
        impl TextExtractor for Locked {
            fn extract_text(&self, path: &Path) -> crate::ports::PortResult<String> {
                Err(PortError::Protected(path.display().to_string()))
            }
        }

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brief.DOCX");
        fs::write(&path, b"PK").unwrap();
        assert_eq!(read_resource_text(&path, &Fixed).unwrap(), "From Word");

        let mut doc = doc_with(vec![Block::text("", "kept")]);
        let id = doc.blocks[0].id;
        doc.add_resource(Resource::from_path(&path));
        let err = doc.attach_resource(id, &path, &Locked).unwrap_err();
        assert!(matches!(err, OutlineError::ProtectedDocument { .. }));
        assert_eq!(doc.blocks[0].body.content(), "kept");
    }

    #[test]
    fn block_json_is_tagged_by_type() {
        let block = Block::ai("Intro", "Write intro");
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "ai");
        assert_eq!(value["content"], "Write intro");

        let parsed: Block = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, block);
    }
}
