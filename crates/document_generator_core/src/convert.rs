//! crates/document_generator_core/src/convert.rs
//!
//! Conversion between the editor's flat, indent-annotated block list and the
//! nested section tree of an [`Outline`].
//!
//! Going forward, attached resources are matched to the document's resource
//! list by path and emitted under their positional key (`resource_{i+1}`).
//! Coming back, `refs` and `resource_key` are resolved by key against the
//! imported resource list.

use crate::domain::{
    file_name_of, read_resource_text, AiBlock, Block, BlockBody, BlockKind, Document, Resource,
    TextBlock,
};
use crate::error::{OutlineError, OutlineResult};
use crate::ports::TextExtractor;
use crate::outline::{Outline, ResourceEntry, Section, SectionKind, INLINE_KEY_PREFIX, RESOURCE_KEY_PREFIX};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// File extensions accepted for imported resources.
pub const SUPPORTED_RESOURCE_EXTENSIONS: &[&str] = &[
    "txt", "md", "py", "c", "cpp", "h", "java", "js", "ts", "jsx", "tsx", "json", "xml", "yaml",
    "yml", "toml", "ini", "cfg", "conf", "sh", "bash", "zsh", "fish", "ps1", "bat", "cmd", "rs",
    "go", "rb", "php", "pl", "lua", "r", "m", "swift", "kt", "scala", "clj", "ex", "exs", "elm",
    "fs", "ml", "sql", "html", "htm", "css", "scss", "sass", "less", "vue", "svelte", "astro",
    "tex", "rst", "adoc", "org", "csv", "docx",
];

pub fn is_supported_resource(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_RESOURCE_EXTENSIONS.contains(&ext.as_str()))
}

/// The key a resource is emitted under, given its position in the document's list.
pub fn resource_key(index: usize) -> String {
    format!("{RESOURCE_KEY_PREFIX}{}", index + 1)
}

fn key_for_path(resources: &[Resource], path: &Path) -> Option<String> {
    resources
        .iter()
        .position(|resource| resource.path == path)
        .map(resource_key)
}

//=========================================================================================
// Blocks -> Sections
//=========================================================================================

/// The literal text of an edited text block, waiting to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInline {
    pub key: String,
    pub block_id: Uuid,
    pub content: String,
}

impl PendingInline {
    /// Deterministic per block, so regenerating the outline overwrites the same file.
    pub fn file_name(&self) -> String {
        format!("inline_{}.txt", self.block_id)
    }
}

/// The section tree built from a block list, plus the inline resources it refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionTree {
    pub sections: Vec<Section>,
    pub inline: Vec<PendingInline>,
}

/// Nests a flat block list into sections. Performs no I/O.
///
/// Inline keys are numbered in encounter order, so the same blocks always get
/// the same keys.
pub fn blocks_to_sections(blocks: &[Block], resources: &[Resource]) -> SectionTree {
    let mut inline = Vec::new();
    let (sections, _) = build_sections(blocks, 0, 0, resources, &mut inline);
    SectionTree { sections, inline }
}

/// Consumes the siblings at `depth` starting at `start`; returns them and the
/// index of the first block not consumed.
///
/// A block shallower than `depth` ends the run. Blocks deeper than `depth`
/// that do not directly follow an emitted section are skipped together with
/// their subtree, which also covers the children of empty and heading blocks.
fn build_sections(
    blocks: &[Block],
    start: usize,
    depth: usize,
    resources: &[Resource],
    inline: &mut Vec<PendingInline>,
) -> (Vec<Section>, usize) {
    let mut sections = Vec::new();
    let mut index = start;

    while index < blocks.len() {
        let block = &blocks[index];
        if block.indent_level < depth {
            break;
        }
        if block.indent_level == depth {
            match block_to_section(block, resources, inline) {
                Some(mut section) => {
                    let has_children = blocks
                        .get(index + 1)
                        .is_some_and(|next| next.indent_level > depth);
                    if has_children {
                        let (children, next) =
                            build_sections(blocks, index + 1, depth + 1, resources, inline);
                        section.sections = children;
                        sections.push(section);
                        index = next;
                        continue;
                    }
                    sections.push(section);
                }
                None => debug!(block_id = %block.id, "Skipping block without section content"),
            }
        } else {
            warn!(
                block_id = %block.id,
                indent_level = block.indent_level,
                depth,
                "Skipping block nested under no section"
            );
        }
        index += 1;
    }

    (sections, index)
}

fn block_to_section(
    block: &Block,
    resources: &[Resource],
    inline: &mut Vec<PendingInline>,
) -> Option<Section> {
    if !block.has_material() {
        return None;
    }
    match &block.body {
        BlockBody::Ai(ai) => {
            let refs = ai
                .resources
                .iter()
                .filter_map(|path| key_for_path(resources, path))
                .collect();
            Some(Section::ai(ai.heading.clone(), ai.content.clone(), refs))
        }
        BlockBody::Text(text) => {
            let key = if text.edited && !text.content.is_empty() {
                let key = format!("{INLINE_KEY_PREFIX}{}", inline.len() + 1);
                inline.push(PendingInline {
                    key: key.clone(),
                    block_id: block.id,
                    content: text.content.clone(),
                });
                key
            } else {
                text.resource
                    .as_deref()
                    .and_then(|path| key_for_path(resources, path))
                    .unwrap_or_default()
            };
            Some(Section::text(text.heading.clone(), key))
        }
        BlockBody::Heading(_) => None,
    }
}

/// Writes each pending inline text to `directory/inline_{block_id}.txt` and
/// returns the matching resource entries.
pub fn materialize_inline(
    pending: &[PendingInline],
    directory: &Path,
) -> OutlineResult<Vec<ResourceEntry>> {
    if !pending.is_empty() {
        fs::create_dir_all(directory)?;
    }
    pending
        .iter()
        .map(|item| {
            let file_name = item.file_name();
            let path = directory.join(&file_name);
            fs::write(&path, &item.content)?;
            Ok(ResourceEntry {
                key: item.key.clone(),
                path,
                title: file_name,
                description: String::new(),
                is_inline: true,
            })
        })
        .collect()
}

/// Builds the full outline of a document, writing inline resources into `inline_dir`.
pub fn build_outline(document: &Document, inline_dir: &Path) -> OutlineResult<Outline> {
    let mut resources: Vec<ResourceEntry> = document
        .resources
        .iter()
        .enumerate()
        .map(|(index, resource)| ResourceEntry {
            key: resource_key(index),
            path: resource.path.clone(),
            title: resource.title.clone(),
            description: resource.description.clone(),
            is_inline: false,
        })
        .collect();

    let tree = blocks_to_sections(&document.blocks, &document.resources);
    resources.extend(materialize_inline(&tree.inline, inline_dir)?);

    Ok(Outline {
        title: document.title.clone(),
        general_instruction: document.general_instruction.clone(),
        resources,
        sections: tree.sections,
    })
}

//=========================================================================================
// Sections -> Blocks
//=========================================================================================

/// How to treat a section with neither `prompt` nor `resource_key`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BareSectionPolicy {
    /// Import it as an empty AI block.
    #[default]
    EmptyAi,
    /// Fail with [`OutlineError::MalformedSection`].
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub bare_sections: BareSectionPolicy,
    /// Directory that relative inline resource paths are resolved against.
    pub base_dir: Option<PathBuf>,
}

/// Resolves `path` against `root` and refuses anything that lands outside it,
/// including escapes through `..` or symlinks.
pub fn confine_to(root: &Path, path: &Path) -> OutlineResult<PathBuf> {
    let escapes = || OutlineError::UnsafeResourcePath {
        path: path.to_path_buf(),
    };
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(escapes());
    }
    let root = root.canonicalize()?;
    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let resolved = if candidate.exists() {
        candidate.canonicalize()?
    } else {
        candidate
    };
    if !resolved.starts_with(&root) {
        return Err(escapes());
    }
    Ok(resolved)
}

/// The imported resource list, split into regular entries and inline files.
struct ResourceCatalog<'a> {
    regular: Vec<(&'a str, Resource)>,
    inline: Vec<(&'a str, PathBuf)>,
}

impl<'a> ResourceCatalog<'a> {
    /// Checks every entry's type and, when importing into `base_dir`, that its
    /// path stays inside that directory.
    fn from_entries(entries: &'a [ResourceEntry], base_dir: Option<&Path>) -> OutlineResult<Self> {
        let mut regular = Vec::new();
        let mut inline = Vec::new();
        for entry in entries {
            if !is_supported_resource(&entry.path) {
                return Err(OutlineError::UnsupportedResourceType {
                    path: entry.path.clone(),
                });
            }
            let path = match base_dir {
                Some(base) => confine_to(base, &entry.path)?,
                None => entry.path.clone(),
            };
            if entry.is_inline_resource() {
                inline.push((entry.key.as_str(), path));
                continue;
            }
            let title = if entry.title.is_empty() {
                file_name_of(&path)
            } else {
                entry.title.clone()
            };
            regular.push((
                entry.key.as_str(),
                Resource {
                    path,
                    title,
                    description: entry.description.clone(),
                },
            ));
        }
        Ok(Self { regular, inline })
    }

    fn regular(&self, key: &str) -> OutlineResult<&Resource> {
        self.regular
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, resource)| resource)
            .ok_or_else(|| OutlineError::DanglingResourceKey {
                key: key.to_string(),
            })
    }

    fn inline(&self, key: &str) -> Option<&Path> {
        self.inline
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, path)| path.as_path())
    }

    fn into_resources(self) -> Vec<Resource> {
        self.regular.into_iter().map(|(_, resource)| resource).collect()
    }
}

/// Rebuilds an editable document from an outline.
///
/// Top-level sections become level-0 blocks and every nesting step adds one
/// level. Text sections are loaded from their resource file (DOCX through
/// `extractor`); inline resources come back as edited text blocks. The first
/// block is shown expanded, and an outline without sections yields a single
/// empty AI block.
pub fn document_from_outline(
    outline: &Outline,
    options: &ImportOptions,
    extractor: &dyn TextExtractor,
) -> OutlineResult<Document> {
    let importer = Importer {
        catalog: ResourceCatalog::from_entries(&outline.resources, options.base_dir.as_deref())?,
        options,
        extractor,
    };

    let mut blocks = importer.sections_to_blocks(&outline.sections, 0, "")?;
    if blocks.is_empty() {
        blocks.push(Block::new(BlockBody::empty(BlockKind::Ai)));
    }
    if let Some(first) = blocks.first_mut() {
        first.collapsed = false;
    }

    Ok(Document {
        title: outline.title.clone(),
        general_instruction: outline.general_instruction.clone(),
        resources: importer.catalog.into_resources(),
        blocks,
    })
}

struct Importer<'a> {
    catalog: ResourceCatalog<'a>,
    options: &'a ImportOptions,
    extractor: &'a dyn TextExtractor,
}

impl Importer<'_> {
    /// Flattens `sections` at `depth` in pre-order. `prefix` is the dotted
    /// position of the parent, used in error messages.
    fn sections_to_blocks(
        &self,
        sections: &[Section],
        depth: usize,
        prefix: &str,
    ) -> OutlineResult<Vec<Block>> {
        let mut blocks = Vec::new();
        for (offset, section) in sections.iter().enumerate() {
            let position = if prefix.is_empty() {
                (offset + 1).to_string()
            } else {
                format!("{prefix}.{}", offset + 1)
            };

            let mut block = Block::new(self.section_to_body(section, &position)?);
            block.indent_level = depth;
            blocks.push(block);

            blocks.extend(self.sections_to_blocks(&section.sections, depth + 1, &position)?);
        }
        Ok(blocks)
    }

    fn section_to_body(&self, section: &Section, position: &str) -> OutlineResult<BlockBody> {
        let heading = section.title.clone();
        match section.kind() {
            SectionKind::Ai { prompt, refs } => {
                let resources = refs
                    .iter()
                    .map(|key| self.catalog.regular(key).map(|resource| resource.path.clone()))
                    .collect::<OutlineResult<Vec<_>>>()?;
                Ok(BlockBody::Ai(AiBlock {
                    heading,
                    content: prompt.to_string(),
                    resources,
                }))
            }
            SectionKind::Text { resource_key } if resource_key.is_empty() => {
                Ok(BlockBody::Text(TextBlock {
                    heading,
                    ..TextBlock::default()
                }))
            }
            SectionKind::Text { resource_key } => match self.catalog.inline(resource_key) {
                Some(path) => Ok(BlockBody::Text(TextBlock {
                    heading,
                    content: read_resource_text(path, self.extractor)?,
                    resource: None,
                    edited: true,
                })),
                None => {
                    let resource = self.catalog.regular(resource_key)?;
                    Ok(BlockBody::Text(TextBlock {
                        heading,
                        content: read_resource_text(&resource.path, self.extractor)?,
                        resource: Some(resource.path.clone()),
                        edited: false,
                    }))
                }
            },
            SectionKind::Bare => match self.options.bare_sections {
                BareSectionPolicy::EmptyAi => {
                    warn!(position, "Section has no prompt or resource key; importing as an AI block");
                    Ok(BlockBody::Ai(AiBlock {
                        heading,
                        ..AiBlock::default()
                    }))
                }
                BareSectionPolicy::Reject => Err(OutlineError::MalformedSection {
                    position: position.to_string(),
                }),
            },
        }
    }
}
