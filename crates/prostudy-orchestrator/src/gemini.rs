//! Gemini implementation of [`LessonService`].
//!
//! Talks to the `generateContent` REST endpoint with a JSON response schema so
//! the model replies with a single JSON document in the first candidate.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LlmErrorKind, Result, StudyError};
use crate::lesson::LessonRecord;
use crate::service::LessonService;
use crate::topic::TopicNode;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// Prompts and Schemas
// ============================================================================

/// Builds the lesson prompt for a title.
#[must_use]
pub fn lesson_prompt(title: &str, deep_dive: bool) -> String {
    if deep_dive {
        format!(
            "Generate a master-level technical analysis for the specific body piercing: \"{title}\".\n\
             This is for a professional piercer reference database.\n\
             Include clinical details for every section. Be extremely specific about jewelry gauges, lengths, and materials.\n\
             For \"Procedure\", provide a step-by-step clinical walkthrough."
        )
    } else {
        format!(
            "Generate a detailed, professional, and well-researched lesson for a body piercing student about the topic: \"{title}\".\n\
             The content must be structured clinically and educationally."
        )
    }
}

/// Builds the gap-analysis prompt from the current curriculum titles.
#[must_use]
pub fn suggestion_prompt(existing_titles: &[String]) -> String {
    format!(
        "Based on this existing body piercing curriculum: [{}],\n\
         suggest 3-5 new, advanced, or niche technical topics that would be valuable for a professional piercer to study.\n\
         Focus on high-level clinical, technical, or historical aspects.",
        existing_titles.join(", ")
    )
}

fn string_property(description: Option<&str>) -> Value {
    match description {
        Some(d) => json!({ "type": "STRING", "description": d }),
        None => json!({ "type": "STRING" }),
    }
}

/// Response schema for a lesson.
#[must_use]
pub fn lesson_schema() -> Value {
    let properties = [
        ("title", None),
        ("overview", None),
        ("anatomy", Some("Detailed anatomical structures involved")),
        ("tools", Some("Instruments required (clamps, needles, etc.)")),
        ("procedure", Some("Step-by-step clinical execution")),
        ("aftercare", Some("Detailed cleaning and lifestyle instructions")),
        ("complications", Some("Potential clinical issues and signs")),
        (
            "jewelrySpecs",
            Some("Standard gauges, lengths, diameters, and biocompatible materials"),
        ),
        (
            "painAndHealing",
            Some("Expected pain levels (1-10) and comprehensive healing timeline"),
        ),
        ("difficulty", Some("Technical difficulty rating (1-10) with reasoning")),
        ("setup", Some("Full instrument and tool tray setup layout")),
        ("faqs", Some("Common professional and client questions")),
        ("prosCons", Some("Technical advantages and physiological risks")),
        ("redFlags", Some("Anatomical contraindications to decline service")),
        (
            "clientDiscussion",
            Some("Clinical consultation script and expectation setting"),
        ),
        (
            "commonIssues",
            Some("Typical healing hurdles like irritation bumps or migration"),
        ),
    ]
    .into_iter()
    .map(|(name, description)| (name.to_string(), string_property(description)))
    .collect::<serde_json::Map<_, _>>();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": ["title", "overview", "anatomy", "tools", "procedure", "aftercare", "complications"],
    })
}

/// Response schema for topic suggestions.
#[must_use]
pub fn suggestion_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "title": { "type": "STRING" },
                "description": { "type": "STRING" },
            },
            "required": ["id", "title"],
        },
    })
}

// ============================================================================
// Response Parsing
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, trimmed.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// Parses a lesson reply body for `title`.
///
/// # Errors
///
/// Returns `GenerationFailure` if the reply has no text, the text is not a
/// JSON object, or required fields are blank.
pub fn parse_lesson_reply(title: &str, body: &str) -> Result<LessonRecord> {
    let reply: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| StudyError::generation(title, format!("unreadable reply: {e}")))?;

    let text = reply.text();
    if text.is_empty() {
        return Err(StudyError::generation(title, "Failed to generate content"));
    }

    let record: LessonRecord = serde_json::from_str(&text)
        .map_err(|e| StudyError::generation(title, format!("invalid lesson JSON: {e}")))?;
    record.validate(title)
}

/// Parses a suggestion reply body. No text means no suggestions.
///
/// # Errors
///
/// Returns `ExpansionFailure` if the text is not a JSON array of topics.
pub fn parse_suggestion_reply(body: &str) -> Result<Vec<TopicNode>> {
    let reply: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| StudyError::expansion(format!("unreadable reply: {e}")))?;

    let text = reply.text();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&text)
        .map_err(|e| StudyError::expansion(format!("invalid suggestion JSON: {e}")))
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| format!("HTTP {status}"))
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the Gemini API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    lesson_model: String,
    suggestion_model: String,
    temperature: f32,
}

impl GeminiClient {
    /// Creates a client from configuration and a resolved API key.
    #[must_use]
    pub fn new(config: &Config, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("prostudy/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_key: api_key.into(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            lesson_model: config.lesson_model.clone(),
            suggestion_model: config.suggestion_model.clone(),
            temperature: config.lesson_temperature,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Posts a request and returns the raw body of a successful reply.
    async fn post(&self, model: &str, body: &Value) -> Result<String> {
        let url = self.endpoint(model);
        debug!(url = %url, "Calling generateContent");

        let response = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| StudyError::llm_api_error(LlmErrorKind::Network, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StudyError::llm_api_error(LlmErrorKind::Network, e.to_string()))?;

        if !status.is_success() {
            let kind = LlmErrorKind::from_status(status.as_u16());
            warn!(status = %status, kind = %kind, model = %model, "generateContent failed");
            return Err(StudyError::llm_api_error(kind, error_message(status, &text)));
        }

        Ok(text)
    }
}

#[async_trait]
impl LessonService for GeminiClient {
    async fn generate_lesson(&self, title: &str, deep_dive: bool) -> Result<LessonRecord> {
        let body = json!({
            "contents": [{ "parts": [{ "text": lesson_prompt(title, deep_dive) }] }],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json",
                "responseSchema": lesson_schema(),
            },
        });

        let reply = self.post(&self.lesson_model, &body).await?;
        let record = parse_lesson_reply(title, &reply)?;
        info!(title = %record.title, deep_dive, "Lesson generated");
        Ok(record)
    }

    async fn suggest_topics(&self, existing_titles: &[String]) -> Result<Vec<TopicNode>> {
        let body = json!({
            "contents": [{ "parts": [{ "text": suggestion_prompt(existing_titles) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": suggestion_schema(),
            },
        });

        let reply = self.post(&self.suggestion_model, &body).await?;
        let topics = parse_suggestion_reply(&reply)?;
        info!(count = topics.len(), "Topic suggestions received");
        Ok(topics)
    }
}
