//! Pro-Study Lesson Export
//!
//! This crate turns a finished lesson into a downloadable document. It knows
//! nothing about how lessons are generated: callers hand it a fully rendered
//! [`LessonDocument`] (title, badges and an ordered list of sections) and pick
//! an output format.
//!
//! # Types
//!
//! - [`LessonDocument`] - The complete document structure
//! - [`DocumentSection`] - One named section of a lesson
//! - [`ExportFormat`] - Supported output formats
//!
//! # Generators
//!
//! - [`json::JsonGenerator`] - Generate JSON documents with compact or pretty formatting
//! - [`MarkdownGenerator`] - Generate human-readable Markdown documents
//!
//! # Example
//!
//! ```rust
//! use prostudy_report::{LessonDocument, MarkdownGenerator};
//!
//! let document = LessonDocument::builder()
//!     .title("Helix")
//!     .section("Technical Overview", "Upper outer cartilage rim.")
//!     .build()
//!     .unwrap();
//!
//! let markdown = MarkdownGenerator::new(&document).generate();
//! assert!(markdown.contains("# Helix"));
//! ```

pub mod json;
mod markdown;

pub use markdown::MarkdownGenerator;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document export.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Failed to serialize the document to JSON.
    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failed to read or write document files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid document data.
    #[error("invalid document data: {0}")]
    InvalidData(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ReportError>;

// ============================================================================
// ExportFormat
// ============================================================================

/// Output format for an exported lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Markdown document (default).
    #[default]
    Markdown,
    /// Pretty-printed JSON document.
    Json,
}

impl ExportFormat {
    /// Parses a format name, case-insensitively. Accepts `md` as an alias.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "markdown" | "md" => Some(Self::Markdown),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }

    /// MIME type served for downloads.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Markdown => "text/markdown; charset=utf-8",
            Self::Json => "application/json",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

// ============================================================================
// LessonDocument
// ============================================================================

/// A rendered lesson ready for export.
///
/// Sections keep the order they were added in; the generators never reorder
/// or drop them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonDocument {
    /// Lesson title.
    pub title: String,

    /// Short labels shown under the title (e.g. "Difficulty: 6/10").
    #[serde(default)]
    pub badges: Vec<String>,

    /// Ordered lesson sections.
    pub sections: Vec<DocumentSection>,

    /// When the document was rendered.
    pub generated_at: DateTime<Utc>,
}

impl LessonDocument {
    /// Creates a new document builder.
    #[must_use]
    pub fn builder() -> LessonDocumentBuilder {
        LessonDocumentBuilder::default()
    }

    /// Suggested download file name for this document in the given format.
    ///
    /// ```rust
    /// use prostudy_report::{ExportFormat, LessonDocument};
    ///
    /// let document = LessonDocument::builder().title("Philtrum (Medusa)").build().unwrap();
    /// assert_eq!(document.file_name(ExportFormat::Markdown), "philtrum-medusa.md");
    /// ```
    #[must_use]
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("{}.{}", slugify(&self.title), format.extension())
    }

    /// Looks up a section by heading.
    #[must_use]
    pub fn section(&self, heading: &str) -> Option<&DocumentSection> {
        self.sections.iter().find(|s| s.heading == heading)
    }
}

/// One named section of a lesson document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSection {
    /// Section heading.
    pub heading: String,
    /// Section body text.
    pub body: String,
}

impl DocumentSection {
    /// Creates a new section.
    #[must_use]
    pub fn new(heading: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            body: body.into(),
        }
    }
}

// ============================================================================
// LessonDocumentBuilder
// ============================================================================

/// Builder for constructing [`LessonDocument`] instances.
#[derive(Debug, Clone, Default)]
pub struct LessonDocumentBuilder {
    title: Option<String>,
    badges: Vec<String>,
    sections: Vec<DocumentSection>,
    generated_at: Option<DateTime<Utc>>,
}

impl LessonDocumentBuilder {
    /// Sets the document title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Adds a badge.
    #[must_use]
    pub fn badge(mut self, badge: impl Into<String>) -> Self {
        self.badges.push(badge.into());
        self
    }

    /// Appends a section.
    #[must_use]
    pub fn section(mut self, heading: impl Into<String>, body: impl Into<String>) -> Self {
        self.sections.push(DocumentSection::new(heading, body));
        self
    }

    /// Sets the render timestamp. Defaults to now.
    #[must_use]
    pub const fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Builds the document.
    ///
    /// # Errors
    ///
    /// Returns `ReportError::InvalidData` if the title is missing or blank.
    pub fn build(self) -> Result<LessonDocument> {
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ReportError::InvalidData("document title is required".to_string()))?;

        Ok(LessonDocument {
            title,
            badges: self.badges,
            sections: self.sections,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
        })
    }
}

static NON_ALNUM: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").ok());

/// Lowercases and collapses every run of non-alphanumeric characters to `-`.
///
/// Falls back to `lesson` when nothing usable is left.
#[must_use]
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let slug = match NON_ALNUM.as_ref() {
        Some(re) => re.replace_all(&lower, "-").into_owned(),
        None => lower,
    };
    let slug = slug.trim_matches('-');

    if slug.is_empty() {
        "lesson".to_string()
    } else {
        slug.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_title() {
        let result = LessonDocument::builder().section("A", "b").build();
        assert!(matches!(result, Err(ReportError::InvalidData(_))));

        let result = LessonDocument::builder().title("   ").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_keeps_section_order() {
        let document = LessonDocument::builder()
            .title("Rook")
            .section("First", "1")
            .section("Second", "2")
            .section("Third", "3")
            .build()
            .unwrap();

        let headings: Vec<_> = document.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(headings, vec!["First", "Second", "Third"]);
        assert_eq!(document.section("Second").unwrap().body, "2");
        assert!(document.section("Fourth").is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Anti-Tragus"), "anti-tragus");
        assert_eq!(slugify("Titanium: G5 vs G23 vs F136"), "titanium-g5-vs-g23-vs-f136");
        assert_eq!(slugify("  Nerve Bundles & Sensitivity  "), "nerve-bundles-sensitivity");
        assert_eq!(slugify("???"), "lesson");
    }

    #[test]
    fn test_export_format_parse() {
        assert_eq!(ExportFormat::parse("Markdown"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("md"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("JSON"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse("pdf"), None);
    }

    #[test]
    fn test_file_name_uses_extension() {
        let document = LessonDocument::builder().title("Daith").build().unwrap();
        assert_eq!(document.file_name(ExportFormat::Markdown), "daith.md");
        assert_eq!(document.file_name(ExportFormat::Json), "daith.json");
    }

    #[test]
    fn test_export_format_serialization() {
        assert_eq!(
            serde_json::to_string(&ExportFormat::Markdown).unwrap(),
            r#""markdown""#
        );
        let format: ExportFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, ExportFormat::Json);
    }
}
