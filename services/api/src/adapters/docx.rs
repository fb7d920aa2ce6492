//! services/api/src/adapters/docx.rs
//!
//! Word document support: text extraction for `.docx` resources (the
//! `TextExtractor` port) and conversion of generated markdown into a `.docx` file.

use document_generator_core::ports::{PortError, PortResult, TextExtractor};
use docx_rs::{
    read_docx, BreakType, DocumentChild, Docx, Paragraph, ParagraphChild, Run, RunChild,
    RunFonts, Style, StyleType,
};
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::fs::{self, File};
use std::path::Path;

/// Encrypted Office files are OLE compound documents rather than zip packages.
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

const CODE_FONT: &str = "Courier New";

//=========================================================================================
// DOCX -> Text
//=========================================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct DocxTextExtractor;

impl TextExtractor for DocxTextExtractor {
    fn extract_text(&self, path: &Path) -> PortResult<String> {
        let bytes = fs::read(path)
            .map_err(|e| PortError::NotFound(format!("{}: {}", path.display(), e)))?;
        if bytes.starts_with(OLE_MAGIC) || !bytes.starts_with(ZIP_MAGIC) {
            return Err(PortError::Protected(path.display().to_string()));
        }
        let docx = read_docx(&bytes).map_err(|e| {
            PortError::Unexpected(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let paragraphs: Vec<String> = docx
            .document
            .children
            .iter()
            .filter_map(|child| match child {
                DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
                _ => None,
            })
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect();
        Ok(paragraphs.join("\n\n"))
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        let ParagraphChild::Run(run) = child else {
            continue;
        };
        for run_child in &run.children {
            match run_child {
                RunChild::Text(t) => text.push_str(&t.text),
                RunChild::Tab(_) => text.push('\t'),
                _ => {}
            }
        }
    }
    text
}

//=========================================================================================
// Markdown -> DOCX
//=========================================================================================

/// Writes `markdown` to `output` as a Word document.
pub fn write_markdown_docx(markdown: &str, output: &Path) -> PortResult<()> {
    let file = File::create(output).map_err(|e| PortError::Unexpected(e.to_string()))?;
    markdown_to_docx(markdown)
        .build()
        .pack(file)
        .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {}", output.display(), e)))
}

/// Headings, paragraphs, lists, emphasis and code survive the conversion;
/// anything else is kept as plain text.
pub fn markdown_to_docx(markdown: &str) -> Docx {
    let mut builder = DocxBuilder::default();
    for event in Parser::new(markdown) {
        builder.push(event);
    }
    builder.flush();

    let styled = (1..=6).fold(Docx::new(), |docx, level| docx.add_style(heading_style(level)));
    builder
        .paragraphs
        .into_iter()
        .fold(styled, |docx, paragraph| docx.add_paragraph(paragraph))
}

fn heading_style(level: usize) -> Style {
    // Half-points: 16pt for level 1 down to 11pt.
    let size = 32usize.saturating_sub(2 * (level - 1)).max(22);
    Style::new(format!("Heading{level}"), StyleType::Paragraph)
        .name(format!("Heading {level}"))
        .size(size)
        .bold()
}

#[derive(Default)]
struct DocxBuilder {
    paragraphs: Vec<Paragraph>,
    current: Option<Paragraph>,
    /// One entry per open list: the next number for ordered lists.
    lists: Vec<Option<u64>>,
    bold: bool,
    italic: bool,
    in_code_block: bool,
}

impl DocxBuilder {
    fn push(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                self.flush();
                self.current = Some(Paragraph::new().style(&format!("Heading{}", level as usize)));
            }
            Event::Start(Tag::Paragraph) => {
                if self.current.is_none() {
                    self.current = Some(Paragraph::new());
                }
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.in_code_block = true;
                self.current = Some(Paragraph::new());
            }
            Event::Start(Tag::List(first)) => {
                self.flush();
                self.lists.push(first);
            }
            Event::Start(Tag::Item) => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}. ");
                        *number += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                let prefix = format!("{}{}", "    ".repeat(depth), marker);
                self.current = Some(Paragraph::new().add_run(Run::new().add_text(prefix)));
            }
            Event::Start(Tag::Strong) => self.bold = true,
            Event::Start(Tag::Emphasis) => self.italic = true,
            Event::End(TagEnd::Strong) => self.bold = false,
            Event::End(TagEnd::Emphasis) => self.italic = false,
            Event::End(TagEnd::List(_)) => {
                self.flush();
                self.lists.pop();
            }
            Event::End(TagEnd::CodeBlock) => {
                self.in_code_block = false;
                self.flush();
            }
            Event::End(TagEnd::Heading(_) | TagEnd::Paragraph | TagEnd::Item) => self.flush(),
            Event::Text(text) if self.in_code_block => {
                let mut lines = text.lines().peekable();
                while let Some(line) = lines.next() {
                    self.add_run(code_run(line));
                    if lines.peek().is_some() {
                        self.add_run(Run::new().add_break(BreakType::TextWrapping));
                    }
                }
            }
            Event::Text(text) => {
                let run = self.styled(Run::new().add_text(text.as_ref()));
                self.add_run(run);
            }
            Event::Code(code) => self.add_run(code_run(&code)),
            Event::SoftBreak => self.add_run(Run::new().add_text(" ")),
            Event::HardBreak => self.add_run(Run::new().add_break(BreakType::TextWrapping)),
            Event::Rule => {
                self.flush();
                self.paragraphs.push(Paragraph::new());
            }
            _ => {}
        }
    }

    fn styled(&self, mut run: Run) -> Run {
        if self.bold {
            run = run.bold();
        }
        if self.italic {
            run = run.italic();
        }
        run
    }

    fn add_run(&mut self, run: Run) {
        let paragraph = self.current.take().unwrap_or_else(Paragraph::new);
        self.current = Some(paragraph.add_run(run));
    }

    fn flush(&mut self) {
        if let Some(paragraph) = self.current.take() {
            self.paragraphs.push(paragraph);
        }
    }
}

fn code_run(text: &str) -> Run {
    Run::new()
        .add_text(text)
        .fonts(RunFonts::new().ascii(CODE_FONT).hi_ansi(CODE_FONT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn generated_docx_reads_back_as_paragraphs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plan.docx");
        write_markdown_docx(
            "# Launch plan\n\nShip on **Friday**.\n\n- first\n- second\n",
            &path,
        )
        .unwrap();

        let text = DocxTextExtractor.extract_text(&path).unwrap();
        assert_eq!(text, "Launch plan\n\nShip on Friday.\n\n• first\n\n• second");
    }

    #[test]
    fn ordered_lists_are_numbered() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("steps.docx");
        write_markdown_docx("1. one\n2. two\n", &path).unwrap();
        let text = DocxTextExtractor.extract_text(&path).unwrap();
        assert_eq!(text, "1. one\n\n2. two");
    }

    #[test]
    fn encrypted_documents_are_reported_as_protected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.docx");
        let mut bytes = OLE_MAGIC.to_vec();
        bytes.extend_from_slice(&[0; 504]);
        fs::write(&path, bytes).unwrap();

        let err = DocxTextExtractor.extract_text(&path).unwrap_err();
        assert!(matches!(err, PortError::Protected(_)));
    }
}
