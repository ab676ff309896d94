//! JSON export for lesson documents.
//!
//! This module provides [`JsonGenerator`] for serializing a [`LessonDocument`]
//! as compact single-line JSON or pretty-printed for human readability.
//!
//! # Example
//!
//! ```rust
//! use prostudy_report::LessonDocument;
//! use prostudy_report::json::JsonGenerator;
//!
//! let document = LessonDocument::builder()
//!     .title("Industrial")
//!     .section("Technical Overview", "Two helix points joined by one barbell.")
//!     .build()
//!     .unwrap();
//!
//! let generator = JsonGenerator::new(&document);
//! let compact = generator.generate().unwrap();
//! let pretty = generator.generate_pretty().unwrap();
//! assert!(!compact.contains('\n'));
//! assert!(pretty.contains('\n'));
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::{LessonDocument, ReportError, Result};

/// JSON document generator.
pub struct JsonGenerator<'a> {
    document: &'a LessonDocument,
}

impl<'a> JsonGenerator<'a> {
    /// Creates a new JSON generator for the given document.
    #[must_use]
    pub const fn new(document: &'a LessonDocument) -> Self {
        Self { document }
    }

    /// Generates compact JSON output (single line, no extra whitespace).
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate(&self) -> Result<String> {
        serde_json::to_string(self.document).map_err(ReportError::from)
    }

    /// Generates pretty-printed JSON output with indentation.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    pub fn generate_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self.document).map_err(ReportError::from)
    }

    /// Writes the JSON document directly to a file.
    ///
    /// Creates or overwrites the file at `path`. Parent directories must exist.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Serialization`] if JSON serialization fails.
    /// Returns [`ReportError::Io`] if file creation or writing fails.
    pub fn write_to_file(&self, path: &Path, pretty: bool) -> Result<()> {
        let json = if pretty {
            self.generate_pretty()?
        } else {
            self.generate()?
        };

        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;

        Ok(())
    }
}
