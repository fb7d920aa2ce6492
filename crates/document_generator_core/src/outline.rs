//! crates/document_generator_core/src/outline.rs
//!
//! The nested outline exchanged with the generation engine and stored inside
//! `.docpack` bundles:
//!
//! ```json
//! { "title": "...", "general_instruction": "...",
//!   "resources": [{ "key": "resource_1", "path": "...", "title": "...", "description": "..." }],
//!   "sections": [{ "title": "...", "prompt": "...", "refs": ["resource_1"], "sections": [] }] }
//! ```

use crate::error::OutlineResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Key prefix of resources declared in the document's resource list.
pub const RESOURCE_KEY_PREFIX: &str = "resource_";

/// Key prefix of resources materialized from edited text blocks.
pub const INLINE_KEY_PREFIX: &str = "inline_resource_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub general_instruction: String,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub key: String,
    pub path: PathBuf,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_inline: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl ResourceEntry {
    /// Inline entries are recognized by flag or, once the flag was stripped, by key.
    pub fn is_inline_resource(&self) -> bool {
        self.is_inline || self.key.starts_with(INLINE_KEY_PREFIX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_key: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// What a section asks the generation engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind<'a> {
    /// Write prose from a prompt, consulting the referenced resources.
    Ai { prompt: &'a str, refs: &'a [String] },
    /// Copy a resource verbatim. An empty key copies nothing.
    Text { resource_key: &'a str },
    /// Neither marker present.
    Bare,
}

impl Section {
    pub fn ai(title: impl Into<String>, prompt: impl Into<String>, refs: Vec<String>) -> Self {
        Self {
            title: title.into(),
            prompt: Some(prompt.into()),
            refs: Some(refs),
            ..Self::default()
        }
    }

    pub fn text(title: impl Into<String>, resource_key: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            resource_key: Some(resource_key.into()),
            ..Self::default()
        }
    }

    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }

    /// A `prompt` wins over a `resource_key` when both are present.
    pub fn kind(&self) -> SectionKind<'_> {
        match (&self.prompt, &self.resource_key) {
            (Some(prompt), _) => SectionKind::Ai {
                prompt,
                refs: self.refs.as_deref().unwrap_or_default(),
            },
            (None, Some(resource_key)) => SectionKind::Text { resource_key },
            (None, None) => SectionKind::Bare,
        }
    }
}

impl Outline {
    pub fn from_json(raw: &str) -> OutlineResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> OutlineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn resource_by_key(&self, key: &str) -> Option<&ResourceEntry> {
        self.resources.iter().find(|entry| entry.key == key)
    }

    /// Drops the transient `is_inline` markers before the outline leaves the editor.
    pub fn strip_inline_markers(&mut self) {
        for entry in &mut self.resources {
            entry.is_inline = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sections_serialize_only_their_markers() {
        let outline = Outline {
            title: "Doc".into(),
            sections: vec![
                Section::ai("Intro", "Write intro", vec![])
                    .with_sections(vec![Section::text("Detail", "resource_1")]),
            ],
            ..Outline::default()
        };
        let value = serde_json::to_value(&outline).unwrap();
        assert_eq!(
            value["sections"],
            json!([{
                "title": "Intro",
                "prompt": "Write intro",
                "refs": [],
                "sections": [{ "title": "Detail", "resource_key": "resource_1", "sections": [] }]
            }])
        );
    }

    #[test]
    fn inline_flag_is_omitted_when_false() {
        let entry = ResourceEntry {
            key: "resource_1".into(),
            path: PathBuf::from("/tmp/a.txt"),
            title: "a.txt".into(),
            description: String::new(),
            is_inline: false,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert!(value.get("is_inline").is_none());
    }

    #[test]
    fn legacy_json_parses_with_defaults() {
        let outline = Outline::from_json(
            r#"{"resources":[{"key":"inline_resource_1","path":"inline_x.txt"}],
                "sections":[{"title":"Bare"}]}"#,
        )
        .unwrap();
        assert!(outline.resources[0].is_inline_resource());
        assert_eq!(outline.sections[0].kind(), SectionKind::Bare);
        assert!(outline.sections[0].sections.is_empty());
    }

    #[test]
    fn prompt_takes_precedence_over_resource_key() {
        let mut section = Section::ai("Both", "p", vec!["resource_2".into()]);
        section.resource_key = Some("resource_1".into());
        assert!(matches!(section.kind(), SectionKind::Ai { prompt: "p", .. }));
    }
}
