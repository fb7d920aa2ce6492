//! services/api/src/adapters/generation_llm.rs
//!
//! This module contains the adapter for the document generation engine.
//! It implements the `GenerationService` port from the `core` crate: text
//! sections are copied from their resource, AI sections are written by an
//! OpenAI-compatible LLM, and the results are assembled into one Markdown document.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use document_generator_core::{
    is_docx,
    outline::{Outline, ResourceEntry, Section, SectionKind},
    ports::{GenerationService, PortError, PortResult, TextExtractor},
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `GenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    extractor: Arc<dyn TextExtractor>,
}

impl OpenAiGenerationAdapter {
    /// Creates a new `OpenAiGenerationAdapter`. `extractor` reads `.docx` resources.
    pub fn new(
        client: Client<OpenAIConfig>,
        model: String,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        Self {
            client,
            model,
            extractor,
        }
    }

    async fn read_resource(&self, entry: &ResourceEntry) -> PortResult<String> {
        if !is_docx(&entry.path) {
            return tokio::fs::read_to_string(&entry.path)
                .await
                .map_err(|e| PortError::NotFound(format!("{}: {}", entry.path.display(), e)));
        }
        let extractor = self.extractor.clone();
        let path = entry.path.clone();
        tokio::task::spawn_blocking(move || extractor.extract_text(&path))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?
    }

    async fn write_section(
        &self,
        outline: &Outline,
        section: &Section,
        prompt: &str,
        references: &[Reference],
    ) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_instruction(outline))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(section_request(&section.title, prompt, references))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(format!(
                    "Generation LLM returned no text for section '{}'.",
                    section.title
                ))
            })
    }
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    async fn generate_document(&self, outline: &Outline, session_id: Uuid) -> PortResult<String> {
        let sections = walk_sections(&outline.sections);
        info!(%session_id, sections = sections.len(), "Generating document");

        let mut parts = Vec::new();
        if !outline.title.trim().is_empty() {
            parts.push(format!("# {}", outline.title.trim()));
        }

        for (depth, section) in sections {
            if let Some(heading) = heading_line(depth, &section.title) {
                parts.push(heading);
            }
            let body = match section.kind() {
                SectionKind::Ai { prompt, refs } => {
                    let mut references = Vec::with_capacity(refs.len());
                    for key in refs {
                        let entry = lookup(outline, key)?;
                        references.push(Reference {
                            title: entry.title.clone(),
                            description: entry.description.clone(),
                            content: self.read_resource(entry).await?,
                        });
                    }
                    debug!(%session_id, title = %section.title, "Writing AI section");
                    self.write_section(outline, section, prompt, &references)
                        .await?
                }
                SectionKind::Text { resource_key } if resource_key.is_empty() => continue,
                SectionKind::Text { resource_key } => {
                    self.read_resource(lookup(outline, resource_key)?).await?
                }
                SectionKind::Bare => continue,
            };
            parts.push(body.trim_end().to_string());
        }

        Ok(format!("{}\n", parts.join("\n\n")))
    }
}

//=========================================================================================
// Prompt and Layout Helpers
//=========================================================================================

/// A resource handed to the model alongside a section prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub title: String,
    pub description: String,
    pub content: String,
}

fn lookup<'a>(outline: &'a Outline, key: &str) -> PortResult<&'a ResourceEntry> {
    outline
        .resource_by_key(key)
        .ok_or_else(|| PortError::NotFound(format!("resource '{}'", key)))
}

/// Sections in document order, paired with their nesting depth.
pub fn walk_sections(sections: &[Section]) -> Vec<(usize, &Section)> {
    let mut ordered = Vec::new();
    let mut stack: Vec<(usize, &Section)> = sections.iter().rev().map(|s| (0, s)).collect();
    while let Some((depth, section)) = stack.pop() {
        ordered.push((depth, section));
        stack.extend(section.sections.iter().rev().map(|child| (depth + 1, child)));
    }
    ordered
}

/// `#` is taken by the document title, so top-level sections start at `##`.
pub fn heading_line(depth: usize, title: &str) -> Option<String> {
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some(format!("{} {}", "#".repeat((depth + 2).min(6)), title))
}

fn system_instruction(outline: &Outline) -> String {
    let mut instruction = String::from(
        "You are writing one section of a larger document. Respond with the section body \
         in Markdown only: no section heading, no preamble, no closing remarks.",
    );
    if !outline.title.trim().is_empty() {
        instruction.push_str(&format!("\n\nDocument title: {}", outline.title.trim()));
    }
    if !outline.general_instruction.trim().is_empty() {
        instruction.push_str(&format!(
            "\n\nInstructions for the whole document:\n{}",
            outline.general_instruction.trim()
        ));
    }
    instruction
}

pub fn section_request(title: &str, prompt: &str, references: &[Reference]) -> String {
    let mut request = String::new();
    if !title.trim().is_empty() {
        request.push_str(&format!("SECTION: {}\n\n", title.trim()));
    }
    request.push_str(&format!("TASK: {}", prompt.trim()));
    for reference in references {
        request.push_str(&format!("\n\n--- REFERENCE: {} ---\n", reference.title));
        if !reference.description.trim().is_empty() {
            request.push_str(&format!("({})\n", reference.description.trim()));
        }
        request.push_str(&reference.content);
    }
    request
}
