//! The study session: every piece of mutable state in one owner.
//!
//! `Session` is synchronous and never awaits. The controller holds it behind
//! a mutex, takes tickets out of it, performs the service call with the lock
//! released, and hands the result back in. Tickets make late results safe:
//! a lesson result is checked against the lesson sequence, an expansion
//! result against the session epoch (bumped on reset).

use chrono::{DateTime, Utc};
use prostudy_report::{json::JsonGenerator, ExportFormat, LessonDocument, MarkdownGenerator};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{piercing_atlas, seed_curriculum, Atlas, Focus, CUSTOM_ID_PREFIX};
use crate::display::{self, LessonView};
use crate::error::{Result, StudyError};
use crate::lesson::{Completion, GenerateRequest, LessonRecord, LessonState, RequestState, RequestTicket};
use crate::stats::{ExploredSet, SessionStats};
use crate::topic::{TopicNode, TopicTree};
use crate::tree_view::{ToggleOutcome, TopicRow, TreeEvent, TreeView};

// ============================================================================
// Snapshots and Tickets
// ============================================================================

/// Read-only view of the curriculum for renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumSnapshot {
    /// Active focus, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus: Option<Focus>,
    /// Heading for the filtered view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Visible rows, depth-first.
    pub rows: Vec<TopicRow>,
    /// Root nodes after filtering, with full subtrees.
    pub roots: Vec<TopicNode>,
    /// Whether a gap analysis is in flight.
    pub expanding: bool,
}

/// Summary sent to newly connected observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Progress counters.
    pub stats: SessionStats,
    /// Current lesson state name.
    pub lesson_status: String,
    /// Title of the loading or displayed lesson.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson_title: Option<String>,
    /// Whether a gap analysis is in flight.
    pub expanding: bool,
    /// Total nodes in the curriculum.
    pub topic_count: usize,
    /// Sequence number of the most recent lesson request.
    pub lesson_sequence: u64,
}

/// Handle for an in-flight gap analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionTicket {
    epoch: u64,
    /// Every curriculum title at the time the analysis started.
    pub titles: Vec<String>,
}

/// What `finish_expansion` did with a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    /// Suggestions were appended; holds their final ids.
    Applied(Vec<String>),
    /// The analysis failed; the curriculum is unchanged.
    Failed,
    /// The result belonged to a session that has since been reset.
    Stale,
}

/// A successfully submitted custom request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSubmission {
    /// Id of the node added to the curriculum.
    pub id: String,
    /// The lesson request started for it.
    pub ticket: RequestTicket,
}

/// A rendered export ready to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedLesson {
    /// Suggested file name.
    pub file_name: String,
    /// MIME type of `body`.
    pub content_type: &'static str,
    /// Document text.
    pub body: String,
}

// ============================================================================
// Session
// ============================================================================

/// All state for one study session.
#[derive(Debug, Clone)]
pub struct Session {
    seed: Vec<TopicNode>,
    tree: TopicTree,
    atlas: Atlas,
    view: TreeView,
    explored: ExploredSet,
    stats: SessionStats,
    lesson: LessonState,
    expanding: bool,
    epoch: u64,
    custom_draft: String,
    next_custom: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates a session over the built-in curriculum and atlas.
    #[must_use]
    pub fn new() -> Self {
        Self::with_curriculum(seed_curriculum(), piercing_atlas())
    }

    /// Creates a session over custom seed data.
    #[must_use]
    pub fn with_curriculum(seed: Vec<TopicNode>, atlas: Atlas) -> Self {
        Self {
            tree: TopicTree::new(seed.clone()),
            seed,
            atlas,
            view: TreeView::new(),
            explored: ExploredSet::new(),
            stats: SessionStats::default(),
            lesson: LessonState::new(),
            expanding: false,
            epoch: 0,
            custom_draft: String::new(),
            next_custom: 1,
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The curriculum tree.
    #[must_use]
    pub const fn tree(&self) -> &TopicTree {
        &self.tree
    }

    /// The procedure atlas.
    #[must_use]
    pub const fn atlas(&self) -> &Atlas {
        &self.atlas
    }

    /// Progress counters.
    #[must_use]
    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Explored node ids.
    #[must_use]
    pub const fn explored(&self) -> &ExploredSet {
        &self.explored
    }

    /// Current lesson state.
    #[must_use]
    pub const fn lesson_state(&self) -> &RequestState {
        self.lesson.current()
    }

    /// Rendered lesson panel.
    #[must_use]
    pub fn lesson_view(&self) -> LessonView {
        LessonView::render(self.lesson.current())
    }

    /// Whether a gap analysis is in flight.
    #[must_use]
    pub const fn is_expanding(&self) -> bool {
        self.expanding
    }

    /// Current custom-request draft.
    #[must_use]
    pub fn custom_draft(&self) -> &str {
        &self.custom_draft
    }

    /// Replaces the custom-request draft.
    pub fn set_custom_draft(&mut self, text: impl Into<String>) {
        self.custom_draft = text.into();
    }

    /// Curriculum rows and roots, optionally filtered by focus.
    #[must_use]
    pub fn curriculum(&self, focus: Option<Focus>) -> CurriculumSnapshot {
        let roots: Vec<&TopicNode> = self
            .tree
            .roots()
            .filter(|root| focus.map_or(true, |f| f.includes(&root.id)))
            .collect();

        CurriculumSnapshot {
            focus,
            label: focus.map(|f| f.label().to_string()),
            rows: self.view.rows(roots.iter().copied()),
            roots: roots.into_iter().cloned().collect(),
            expanding: self.expanding,
        }
    }

    /// Summary for observers.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lesson.current();
        SessionSnapshot {
            stats: self.stats,
            lesson_status: state.name().to_string(),
            lesson_title: state.title().map(ToString::to_string),
            expanding: self.expanding,
            topic_count: self.tree.node_count(),
            lesson_sequence: self.lesson.latest_sequence(),
        }
    }

    // ------------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------------

    /// Toggles a node's expansion and records first explorations.
    pub fn toggle_topic(&mut self, id: &str) -> Result<ToggleOutcome> {
        let node = self
            .tree
            .find(id)
            .ok_or_else(|| StudyError::topic_not_found(id))?;

        let outcome = self.view.toggle(node);
        if let Some(TreeEvent::Explored { id }) = &outcome.event {
            if self.explored.insert(id.clone()) {
                self.stats.sync_explored(&self.explored);
                debug!(id = %id, explored = self.stats.topics_explored, "Topic explored");
            }
        }
        Ok(outcome)
    }

    /// Starts a basic lesson for a tree node's title.
    pub fn request_topic_lesson(&mut self, id: &str) -> Result<RequestTicket> {
        let node = self
            .tree
            .find(id)
            .ok_or_else(|| StudyError::topic_not_found(id))?;

        match TreeView::generate(node) {
            TreeEvent::GenerateRequested(request) => self.begin_lesson(request),
            TreeEvent::Explored { .. } => Err(StudyError::invalid_request(
                "tree produced no lesson request",
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Lessons
    // ------------------------------------------------------------------------

    /// Starts a lesson request, replacing whatever was displayed.
    pub fn begin_lesson(&mut self, request: GenerateRequest) -> Result<RequestTicket> {
        let title = request.title.trim();
        if title.is_empty() {
            return Err(StudyError::invalid_request("lesson title must not be blank"));
        }
        let request = GenerateRequest::new(title, request.deep_dive);

        let ticket = self.lesson.begin(request);
        info!(
            title = %ticket.request.title,
            deep_dive = ticket.request.deep_dive,
            sequence = ticket.sequence,
            "Lesson requested"
        );
        Ok(ticket)
    }

    /// Applies a service result for a ticket.
    pub fn complete_lesson(
        &mut self,
        ticket: &RequestTicket,
        result: Result<LessonRecord>,
    ) -> Completion {
        let completion = self.lesson.complete(ticket, result);
        match completion {
            Completion::Succeeded => {
                self.stats.record_lesson();
                info!(
                    title = %ticket.request.title,
                    lessons = self.stats.lessons_generated,
                    "Lesson ready"
                );
            }
            Completion::Failed => {
                if let RequestState::Error { message } = self.lesson.current() {
                    warn!(title = %ticket.request.title, error = %message, "Lesson generation failed");
                }
            }
            Completion::Stale => {
                debug!(
                    title = %ticket.request.title,
                    sequence = ticket.sequence,
                    "Dropped stale lesson result"
                );
            }
        }
        completion
    }

    /// Closes the lesson panel.
    pub fn close_lesson(&mut self) {
        self.lesson.close();
    }

    /// Starts a deep-dive lesson on a uniformly random title drawn from the
    /// curriculum and the atlas. Returns `None` if both are empty.
    pub fn random_lesson<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<RequestTicket> {
        let mut pool = self.tree.flatten_titles();
        pool.extend(self.atlas.entries().map(ToString::to_string));

        let title = pool.choose(rng)?.clone();
        self.begin_lesson(GenerateRequest::new(title, true)).ok()
    }

    /// Submits the current draft as a custom topic.
    ///
    /// A blank draft does nothing. Otherwise a `custom-<n>` node is added to
    /// the front of the dynamic topics, a deep-dive lesson is started for it,
    /// and the draft is cleared.
    pub fn submit_custom(&mut self) -> Option<CustomSubmission> {
        let title = self.custom_draft.trim().to_string();
        if title.is_empty() {
            return None;
        }

        let id = self.next_custom_id();
        let id = self.tree.append_custom(TopicNode::leaf(id, title.clone()));
        let ticket = self.lesson.begin(GenerateRequest::new(title, true));
        self.custom_draft.clear();

        info!(id = %id, title = %ticket.request.title, "Custom topic added");
        Some(CustomSubmission { id, ticket })
    }

    fn next_custom_id(&mut self) -> String {
        loop {
            let candidate = format!("{CUSTOM_ID_PREFIX}{}", self.next_custom);
            self.next_custom += 1;
            if !self.tree.contains_id(&candidate) {
                return candidate;
            }
        }
    }

    /// Export document for the displayed lesson.
    pub fn lesson_document(&self, now: DateTime<Utc>) -> Result<LessonDocument> {
        let lesson = self.lesson.lesson().ok_or(StudyError::NoActiveLesson)?;
        Ok(display::to_document(lesson, now)?)
    }

    /// Renders the displayed lesson for download.
    pub fn export_lesson(&self, format: ExportFormat, now: DateTime<Utc>) -> Result<ExportedLesson> {
        let document = self.lesson_document(now)?;

        let body = match format {
            ExportFormat::Markdown => MarkdownGenerator::new(&document).generate(),
            ExportFormat::Json => JsonGenerator::new(&document).generate_pretty()?,
        };

        Ok(ExportedLesson {
            file_name: document.file_name(format),
            content_type: format.content_type(),
            body,
        })
    }

    // ------------------------------------------------------------------------
    // Curriculum expansion
    // ------------------------------------------------------------------------

    /// Marks a gap analysis as in flight and collects the titles to send.
    pub fn begin_expansion(&mut self) -> Result<ExpansionTicket> {
        if self.expanding {
            return Err(StudyError::ExpansionBusy);
        }
        self.expanding = true;

        let titles = self.tree.flatten_titles();
        info!(titles = titles.len(), "Analyzing curriculum gaps");
        Ok(ExpansionTicket {
            epoch: self.epoch,
            titles,
        })
    }

    /// Applies a gap analysis result.
    ///
    /// Failures are logged and change nothing but the busy flag. Results from
    /// before a reset change nothing at all, not even the busy flag of the
    /// analysis that may have started since.
    pub fn finish_expansion(
        &mut self,
        ticket: &ExpansionTicket,
        result: Result<Vec<TopicNode>>,
    ) -> ExpansionOutcome {
        if ticket.epoch != self.epoch {
            debug!("Dropped gap analysis result from a previous session");
            return ExpansionOutcome::Stale;
        }
        self.expanding = false;

        match result {
            Ok(nodes) => {
                let added = self.tree.append_suggested(nodes);
                info!(added = added.len(), "Curriculum expanded");
                ExpansionOutcome::Applied(added)
            }
            Err(e) => {
                warn!(error = %e, "Curriculum expansion failed");
                ExpansionOutcome::Failed
            }
        }
    }

    // ------------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------------

    /// Discards all session state, as a page reload would.
    ///
    /// The lesson sequence keeps counting so that results of requests issued
    /// before the reset are still recognised as stale.
    pub fn reset(&mut self) {
        let mut lesson = std::mem::take(&mut self.lesson);
        lesson.close();

        let epoch = self.epoch + 1;
        *self = Self {
            lesson,
            epoch,
            ..Self::with_curriculum(self.seed.clone(), self.atlas.clone())
        };
        info!("Session reset");
    }
}
