//! Configuration types for the Pro-Study orchestrator.
//!
//! Everything is optional: a missing `prostudy.json` yields the defaults, and
//! unknown fields are ignored. The API credential is never read from the file;
//! only the name of the environment variable holding it is configurable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "prostudy.json";

/// Secondary environment variable checked for the API credential.
pub const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    3000
}

fn default_api_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_lesson_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_suggestion_model() -> String {
    "gemini-3-flash-preview".to_string()
}

const fn default_lesson_temperature() -> f32 {
    0.6
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

/// Main configuration for a study session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Interface the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL of the generative-language API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Model used for lesson generation.
    #[serde(default = "default_lesson_model")]
    pub lesson_model: String,

    /// Model used for curriculum suggestions.
    #[serde(default = "default_suggestion_model")]
    pub suggestion_model: String,

    /// Sampling temperature for lesson generation.
    #[serde(default = "default_lesson_temperature")]
    pub lesson_temperature: f32,

    /// Directory exported lessons are written to by the CLI.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Environment variable holding the API credential.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_base_url: default_api_base_url(),
            lesson_model: default_lesson_model(),
            suggestion_model: default_suggestion_model(),
            lesson_temperature: default_lesson_temperature(),
            output_dir: default_output_dir(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            StudyError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads `prostudy.json` from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigParseError` if the file exists but contains
    /// invalid JSON.
    ///
    /// Returns `StudyError::ConfigValidationError` if the configuration values
    /// are invalid.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(StudyError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| StudyError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(StudyError::config_validation(
                "host must not be empty",
                "Set host to an interface address such as 127.0.0.1 in your prostudy.json",
            ));
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(StudyError::config_validation(
                format!("apiBaseUrl must be an http(s) URL, got '{}'", self.api_base_url),
                "Use the default https://generativelanguage.googleapis.com or a full proxy URL",
            ));
        }

        if self.lesson_model.trim().is_empty() || self.suggestion_model.trim().is_empty() {
            return Err(StudyError::config_validation(
                "lessonModel and suggestionModel must not be empty",
                "Remove the fields from prostudy.json to use the default models",
            ));
        }

        if !(0.0..=2.0).contains(&self.lesson_temperature) {
            return Err(StudyError::config_validation(
                format!(
                    "lessonTemperature must be between 0.0 and 2.0, got {}",
                    self.lesson_temperature
                ),
                "Set lessonTemperature to a value such as 0.6 in your prostudy.json",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(StudyError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your prostudy.json (use '.' for current directory)",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(StudyError::config_validation(
                "apiKeyEnv must not be empty",
                "Name the environment variable holding your API key, e.g. API_KEY",
            ));
        }

        Ok(())
    }

    /// Reads the API credential from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::MissingApiKey` if neither variable is set.
    pub fn resolve_api_key(&self) -> Result<String> {
        self.resolve_api_key_with(|name| std::env::var(name).ok())
    }

    /// Reads the API credential through `lookup`, checking `api_key_env`
    /// first and [`FALLBACK_API_KEY_ENV`] second. Blank values are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::MissingApiKey` if no non-blank value is found.
    pub fn resolve_api_key_with<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        [self.api_key_env.as_str(), FALLBACK_API_KEY_ENV]
            .into_iter()
            .filter_map(&lookup)
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
            .ok_or_else(|| StudyError::missing_api_key(self.api_key_env.clone()))
    }

    /// Socket address string for the HTTP server.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
