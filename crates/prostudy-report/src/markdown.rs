//! Markdown export for lesson documents.
//!
//! This module provides the [`MarkdownGenerator`] struct for converting a
//! [`LessonDocument`] into a Markdown file. The generated document contains:
//!
//! - The lesson title and its badges
//! - Every section in document order, each under a level-two heading
//! - A footer with the render timestamp
//!
//! # Example
//!
//! ```rust
//! use prostudy_report::{LessonDocument, MarkdownGenerator};
//!
//! let document = LessonDocument::builder()
//!     .title("Conch")
//!     .badge("Difficulty: 5/10")
//!     .section("Technical Overview", "Inner or outer conch placement.")
//!     .build()
//!     .unwrap();
//!
//! let markdown = MarkdownGenerator::new(&document).generate();
//! assert!(markdown.contains("## Technical Overview"));
//! ```

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::{DocumentSection, LessonDocument};

/// Generates Markdown documents from rendered lessons.
pub struct MarkdownGenerator<'a> {
    document: &'a LessonDocument,
}

impl<'a> MarkdownGenerator<'a> {
    /// Creates a new Markdown generator for the given document.
    #[must_use]
    pub const fn new(document: &'a LessonDocument) -> Self {
        Self { document }
    }

    /// Generates the complete Markdown document.
    #[must_use]
    pub fn generate(&self) -> String {
        let mut output = String::new();

        self.write_title(&mut output);
        self.write_badges(&mut output);
        self.write_sections(&mut output);
        self.write_footer(&mut output);

        output
    }

    fn write_title(&self, output: &mut String) {
        let _ = writeln!(
            output,
            "# {}\n",
            escape_markdown(&self.document.title)
        );
    }

    fn write_badges(&self, output: &mut String) {
        if self.document.badges.is_empty() {
            return;
        }

        let badges: Vec<String> = self
            .document
            .badges
            .iter()
            .map(|b| format!("**{}**", escape_markdown(b)))
            .collect();
        let _ = writeln!(output, "{}\n", badges.join(" | "));
    }

    fn write_sections(&self, output: &mut String) {
        if self.document.sections.is_empty() {
            let _ = writeln!(output, "*No lesson content.*\n");
            return;
        }

        for section in &self.document.sections {
            Self::write_section(output, section);
        }
    }

    /// Writes one section. Bodies are emitted verbatim so that lists and
    /// paragraphs produced by the service survive the export.
    fn write_section(output: &mut String, section: &DocumentSection) {
        let _ = writeln!(output, "## {}\n", escape_markdown(&section.heading));
        let _ = writeln!(output, "{}\n", normalize_body(&section.body));
    }

    fn write_footer(&self, output: &mut String) {
        let _ = writeln!(output, "---");
        let timestamp = format_timestamp(&self.document.generated_at);
        let _ = writeln!(output, "*Generated by Pro-Study at {timestamp}*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Format: "YYYY-MM-DD HH:MM:SS UTC"
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Escapes special Markdown characters in single-line text (titles, headings).
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '*' | '_' | '`' | '#' | '[' | ']' | '!' | '\\' | '<' | '>' | '|' => {
                result.push('\\');
                result.push(ch);
            }
            '\n' | '\r' => result.push(' '),
            _ => result.push(ch),
        }
    }

    result
}

/// Normalizes line endings and strips trailing whitespace from a section body.
fn normalize_body(body: &str) -> String {
    let lines: Vec<&str> = body.lines().map(str::trim_end).collect();
    let joined = lines.join("\n");
    let trimmed = joined.trim();

    if trimmed.is_empty() {
        "*No content.*".to_string()
    } else {
        trimmed.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================
