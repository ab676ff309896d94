//! Boundary to the generative content service.

use async_trait::async_trait;

use crate::error::Result;
use crate::lesson::LessonRecord;
use crate::topic::TopicNode;

/// Generates lessons and curriculum suggestions.
///
/// Implementations must be safe to call concurrently; the controller issues
/// calls from spawned tasks without holding the session lock.
#[async_trait]
pub trait LessonService: Send + Sync {
    /// Generates a lesson for `title`. Deep-dive mode asks for every optional
    /// field.
    ///
    /// # Errors
    ///
    /// Returns `GenerationFailure` for empty or malformed payloads and
    /// `LlmApiError` for transport or HTTP failures.
    async fn generate_lesson(&self, title: &str, deep_dive: bool) -> Result<LessonRecord>;

    /// Suggests three to five new root topics given every title already in
    /// the curriculum. An empty reply yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns `LlmApiError` for transport or HTTP failures and
    /// `ExpansionFailure` for malformed payloads.
    async fn suggest_topics(&self, existing_titles: &[String]) -> Result<Vec<TopicNode>>;
}
