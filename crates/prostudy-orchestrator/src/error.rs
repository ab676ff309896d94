//! Error types for the Pro-Study orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, lesson generation, curriculum expansion,
//! AI service interactions, and lesson export.

use std::path::PathBuf;

/// A specialized `Result` type for Pro-Study orchestrator operations.
pub type Result<T> = std::result::Result<T, StudyError>;

/// Errors that can occur while running a study session.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your prostudy.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// No API credential was found in the environment.
    #[error("No API key found in environment variable '{env_var}'\n\nSuggestion: Export {env_var} (or GEMINI_API_KEY) before starting")]
    MissingApiKey {
        /// Name of the environment variable that was checked.
        env_var: String,
    },

    // ========================================================================
    // Lesson Generation Errors
    // ========================================================================
    /// The lesson service returned an empty or malformed payload.
    #[error("Lesson generation failed for '{topic}': {message}\n\nSuggestion: Retry in a few moments")]
    GenerationFailure {
        /// Topic title the lesson was requested for.
        topic: String,
        /// Description of what was wrong with the response.
        message: String,
    },

    /// No successfully generated lesson is currently displayed.
    #[error("No lesson is available to export\n\nSuggestion: Generate a lesson and wait for it to finish")]
    NoActiveLesson,

    // ========================================================================
    // Curriculum Errors
    // ========================================================================
    /// The suggestion service call failed.
    #[error("Curriculum expansion failed: {message}")]
    ExpansionFailure {
        /// Description of the failure.
        message: String,
    },

    /// A curriculum expansion is already in flight.
    #[error("Curriculum expansion already in progress\n\nSuggestion: Wait for the current analysis to finish")]
    ExpansionBusy,

    /// A request carried unusable input (e.g. a blank title).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of what was wrong.
        message: String,
    },

    /// No topic with the given id exists in the tree.
    #[error("Topic not found: '{id}'")]
    TopicNotFound {
        /// The id that was looked up.
        id: String,
    },

    // ========================================================================
    // LLM Errors
    // ========================================================================
    /// LLM API returned an error (authentication, rate limiting, etc.).
    #[error("LLM API error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    LlmApiError {
        /// The kind of API error (e.g., rate limit, authentication, server).
        kind: LlmErrorKind,
        /// Detailed error message from the API.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Export Errors
    // ========================================================================
    /// The export collaborator failed to render the document.
    #[error("Failed to export lesson: {0}")]
    Export(#[from] prostudy_report::ReportError),

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Categories of LLM API errors for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl LlmErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key or credentials",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the LLM service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the LLM provider's status page",
        }
    }

    /// Classifies an HTTP status code returned by the service.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl StudyError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `MissingApiKey` error.
    #[must_use]
    pub fn missing_api_key(env_var: impl Into<String>) -> Self {
        Self::MissingApiKey {
            env_var: env_var.into(),
        }
    }

    /// Creates a new `GenerationFailure` error.
    #[must_use]
    pub fn generation(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailure {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ExpansionFailure` error.
    #[must_use]
    pub fn expansion(message: impl Into<String>) -> Self {
        Self::ExpansionFailure {
            message: message.into(),
        }
    }

    /// Creates a new `TopicNotFound` error.
    #[must_use]
    pub fn topic_not_found(id: impl Into<String>) -> Self {
        Self::TopicNotFound { id: id.into() }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `LlmApiError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn llm_api_error(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::LlmApiError {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Returns `true` if this error is transient and the user may simply retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmApiError {
                kind: LlmErrorKind::RateLimit | LlmErrorKind::Server | LlmErrorKind::Network,
                ..
            } | Self::GenerationFailure { .. }
                | Self::ExpansionFailure { .. }
                | Self::ExpansionBusy
        )
    }

    /// Returns `true` if this error prevents the process from starting.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::MissingApiKey { .. }
        )
    }
}
