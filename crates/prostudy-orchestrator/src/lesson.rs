//! Lesson records and the request state machine.
//!
//! At most one lesson is active at a time. Every request gets a monotonically
//! increasing sequence number; a completion is applied only if it carries the
//! latest sequence and the state is still `Loading`. Anything else is a stale
//! result from a superseded or closed request and is dropped.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyError};

// ============================================================================
// GenerateRequest
// ============================================================================

/// A request to generate a lesson for a title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    /// Topic or procedure title. Lessons are keyed by title, not id.
    pub title: String,
    /// Whether the full optional field set is requested.
    #[serde(default)]
    pub deep_dive: bool,
}

impl GenerateRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(title: impl Into<String>, deep_dive: bool) -> Self {
        Self {
            title: title.into(),
            deep_dive,
        }
    }
}

// ============================================================================
// LessonRecord
// ============================================================================

/// Names of the narrative fields every lesson must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    "overview",
    "anatomy",
    "tools",
    "procedure",
    "aftercare",
    "complications",
];

/// A generated lesson, as returned by the lesson service.
///
/// Required fields default to empty on deserialization so that a partial
/// payload can be reported precisely by [`LessonRecord::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRecord {
    /// Lesson title.
    #[serde(default)]
    pub title: String,

    /// General technical overview.
    #[serde(default)]
    pub overview: String,
    /// Relevant anatomy.
    #[serde(default)]
    pub anatomy: String,
    /// Instruments and tools.
    #[serde(default)]
    pub tools: String,
    /// Step-by-step procedure.
    #[serde(default)]
    pub procedure: String,
    /// Aftercare protocol.
    #[serde(default)]
    pub aftercare: String,
    /// Known complications.
    #[serde(default)]
    pub complications: String,

    /// Jewelry gauges, lengths and materials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jewelry_specs: Option<String>,
    /// Pain level and healing timeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pain_and_healing: Option<String>,
    /// Difficulty rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    /// Tray and workspace setup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
    /// Frequently asked professional questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faqs: Option<String>,
    /// Pros and cons.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pros_cons: Option<String>,
    /// Contraindications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_flags: Option<String>,
    /// Consultation and consent script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_discussion: Option<String>,
    /// Common healing issues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_issues: Option<String>,
}

/// Returns the trimmed value if present and not blank.
#[must_use]
pub fn present(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

impl LessonRecord {
    /// Names of required fields that are blank.
    #[must_use]
    pub fn missing_required(&self) -> Vec<&'static str> {
        let values = [
            &self.overview,
            &self.anatomy,
            &self.tools,
            &self.procedure,
            &self.aftercare,
            &self.complications,
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Checks a service payload for the requested title.
    ///
    /// A blank title is replaced by the requested one. Blank required fields
    /// make the payload malformed.
    pub fn validate(mut self, requested_title: &str) -> Result<Self> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            return Err(StudyError::generation(
                requested_title,
                format!("response is missing required fields: {}", missing.join(", ")),
            ));
        }
        if self.title.trim().is_empty() {
            self.title = requested_title.to_string();
        }
        Ok(self)
    }

    /// Returns `true` if both deep-dive marker fields are present.
    #[must_use]
    pub fn is_deep_dive(&self) -> bool {
        present(self.difficulty.as_ref()).is_some()
            && present(self.pain_and_healing.as_ref()).is_some()
    }
}

// ============================================================================
// RequestState
// ============================================================================

/// State of the lesson display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RequestState {
    /// Nothing displayed.
    #[default]
    Idle,
    /// Waiting for the service.
    Loading {
        /// The outstanding request.
        request: GenerateRequest,
    },
    /// A lesson is displayed.
    Success {
        /// The displayed lesson.
        lesson: LessonRecord,
    },
    /// The last request failed.
    Error {
        /// Description of the failure, for logs and API clients.
        message: String,
    },
}

impl RequestState {
    /// Short status name used in events.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading { .. } => "loading",
            Self::Success { .. } => "success",
            Self::Error { .. } => "error",
        }
    }

    /// Title the state refers to, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Loading { request } => Some(&request.title),
            Self::Success { lesson } => Some(&lesson.title),
            Self::Idle | Self::Error { .. } => None,
        }
    }
}

// ============================================================================
// LessonState
// ============================================================================

/// Handle for one issued request. Required to complete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    /// Sequence number assigned at `begin`.
    pub sequence: u64,
    /// The request itself.
    pub request: GenerateRequest,
}

/// What `complete` did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The lesson is now displayed.
    Succeeded,
    /// The display now shows the error state.
    Failed,
    /// The result belonged to a superseded or closed request and was dropped.
    Stale,
}

/// The single-active-lesson state machine.
#[derive(Debug, Clone, Default)]
pub struct LessonState {
    state: RequestState,
    latest: u64,
}

impl LessonState {
    /// Creates an idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn current(&self) -> &RequestState {
        &self.state
    }

    /// The displayed lesson, if the state is `Success`.
    #[must_use]
    pub const fn lesson(&self) -> Option<&LessonRecord> {
        match &self.state {
            RequestState::Success { lesson } => Some(lesson),
            _ => None,
        }
    }

    /// Sequence number of the most recently issued request.
    #[must_use]
    pub const fn latest_sequence(&self) -> u64 {
        self.latest
    }

    /// Starts a request from any state. The previous record is discarded.
    pub fn begin(&mut self, request: GenerateRequest) -> RequestTicket {
        self.latest += 1;
        self.state = RequestState::Loading {
            request: request.clone(),
        };
        RequestTicket {
            sequence: self.latest,
            request,
        }
    }

    /// Applies a service result if it is still wanted.
    pub fn complete(&mut self, ticket: &RequestTicket, result: Result<LessonRecord>) -> Completion {
        if ticket.sequence != self.latest || !matches!(self.state, RequestState::Loading { .. }) {
            return Completion::Stale;
        }

        match result.and_then(|record| record.validate(&ticket.request.title)) {
            Ok(lesson) => {
                self.state = RequestState::Success { lesson };
                Completion::Succeeded
            }
            Err(e) => {
                self.state = RequestState::Error {
                    message: e.to_string(),
                };
                Completion::Failed
            }
        }
    }

    /// Returns to `Idle` and discards any record. An outstanding request's
    /// result will be dropped when it arrives.
    pub fn close(&mut self) {
        self.state = RequestState::Idle;
    }
}
