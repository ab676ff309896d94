//! Async front of the session.
//!
//! Holds the [`Session`] behind a single mutex and runs service calls in
//! spawned tasks with the lock released. Every state change is broadcast as a
//! [`StudyEvent`].

use std::sync::Arc;

use chrono::Utc;
use prostudy_report::ExportFormat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::catalog::{Atlas, Focus};
use crate::display::LessonView;
use crate::error::{Result, StudyError};
use crate::lesson::{Completion, GenerateRequest, RequestState, RequestTicket};
use crate::service::LessonService;
use crate::session::{
    CurriculumSnapshot, ExpansionOutcome, ExportedLesson, Session, SessionSnapshot,
};
use crate::stats::SessionStats;
use crate::tree_view::{ToggleOutcome, TreeEvent};
use crate::websocket::{EventBroadcaster, StudyEvent};

/// A lesson request that has been issued and is running in the background.
#[derive(Debug)]
pub struct LessonTask {
    /// The issued ticket.
    pub ticket: RequestTicket,
    /// The background task; completes once the result has been applied.
    pub task: JoinHandle<()>,
}

/// A custom request that was accepted.
#[derive(Debug)]
pub struct CustomTask {
    /// Id of the node added to the curriculum.
    pub id: String,
    /// The lesson request started for it.
    pub lesson: LessonTask,
}

/// Shared handle to the running session.
#[derive(Clone)]
pub struct StudyController {
    session: Arc<Mutex<Session>>,
    service: Arc<dyn LessonService>,
    broadcaster: EventBroadcaster,
}

impl std::fmt::Debug for StudyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyController")
            .field("broadcaster", &self.broadcaster)
            .finish_non_exhaustive()
    }
}

impl StudyController {
    /// Creates a controller over a fresh session.
    #[must_use]
    pub fn new(service: Arc<dyn LessonService>) -> Self {
        Self::with_session(Session::new(), service)
    }

    /// Creates a controller over an existing session.
    #[must_use]
    pub fn with_session(session: Session, service: Arc<dyn LessonService>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            service,
            broadcaster: EventBroadcaster::default(),
        }
    }

    /// The event broadcaster.
    #[must_use]
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Summary for observers.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    /// Curriculum rows and roots.
    pub async fn curriculum(&self, focus: Option<Focus>) -> CurriculumSnapshot {
        self.session.lock().await.curriculum(focus)
    }

    /// The procedure atlas.
    pub async fn atlas(&self) -> Atlas {
        self.session.lock().await.atlas().clone()
    }

    /// Progress counters.
    pub async fn stats(&self) -> SessionStats {
        self.session.lock().await.stats()
    }

    /// Rendered lesson panel.
    pub async fn lesson_view(&self) -> LessonView {
        self.session.lock().await.lesson_view()
    }

    /// Renders the displayed lesson for download.
    pub async fn export_lesson(&self, format: ExportFormat) -> Result<ExportedLesson> {
        self.session.lock().await.export_lesson(format, Utc::now())
    }

    // ------------------------------------------------------------------------
    // Tree
    // ------------------------------------------------------------------------

    /// Toggles a node.
    pub async fn toggle_topic(&self, id: &str) -> Result<ToggleOutcome> {
        let mut session = self.session.lock().await;
        let outcome = session.toggle_topic(id)?;

        if let Some(TreeEvent::Explored { id }) = &outcome.event {
            let stats = session.stats();
            self.broadcaster
                .send(StudyEvent::topic_explored(id.clone(), stats.topics_explored));
            self.broadcaster.send(StudyEvent::stats_updated(stats));
        }
        Ok(outcome)
    }

    /// Starts a basic lesson for a tree node.
    pub async fn request_topic_lesson(&self, id: &str) -> Result<LessonTask> {
        let ticket = {
            let mut session = self.session.lock().await;
            let ticket = session.request_topic_lesson(id)?;
            self.announce_loading(&ticket);
            ticket
        };
        Ok(self.spawn_lesson(ticket))
    }

    // ------------------------------------------------------------------------
    // Lessons
    // ------------------------------------------------------------------------

    /// Starts a lesson for an arbitrary title (atlas entries, direct requests).
    pub async fn request_lesson(&self, request: GenerateRequest) -> Result<LessonTask> {
        let ticket = {
            let mut session = self.session.lock().await;
            let ticket = session.begin_lesson(request)?;
            self.announce_loading(&ticket);
            ticket
        };
        Ok(self.spawn_lesson(ticket))
    }

    /// Starts a deep-dive lesson on a random title. `None` when there is
    /// nothing to pick from.
    pub async fn random_lesson(&self) -> Option<LessonTask> {
        let ticket = {
            let mut session = self.session.lock().await;
            let ticket = session.random_lesson(&mut StdRng::from_entropy())?;
            self.announce_loading(&ticket);
            ticket
        };
        Some(self.spawn_lesson(ticket))
    }

    /// Submits a custom request. Blank text does nothing.
    pub async fn submit_custom(&self, text: &str) -> Option<CustomTask> {
        let submission = {
            let mut session = self.session.lock().await;
            session.set_custom_draft(text);
            let submission = session.submit_custom()?;
            self.announce_loading(&submission.ticket);
            submission
        };

        let lesson = self.spawn_lesson(submission.ticket);
        Some(CustomTask {
            id: submission.id,
            lesson,
        })
    }

    /// Closes the lesson panel.
    pub async fn close_lesson(&self) {
        let mut session = self.session.lock().await;
        session.close_lesson();
        self.broadcaster
            .send(StudyEvent::lesson_state(session.lesson_state()));
    }

    /// Broadcasts the `Loading` state for a freshly issued ticket. Called
    /// with the session lock held so events follow state order.
    fn announce_loading(&self, ticket: &RequestTicket) {
        self.broadcaster
            .send(StudyEvent::lesson_state(&RequestState::Loading {
                request: ticket.request.clone(),
            }));
    }

    fn spawn_lesson(&self, ticket: RequestTicket) -> LessonTask {
        let controller = self.clone();
        let task_ticket = ticket.clone();
        let task = tokio::spawn(async move {
            controller.run_lesson(task_ticket).await;
        });

        LessonTask { ticket, task }
    }

    async fn run_lesson(&self, ticket: RequestTicket) {
        let result = self
            .service
            .generate_lesson(&ticket.request.title, ticket.request.deep_dive)
            .await;
        let retryable = result.as_ref().is_err_and(StudyError::is_transient);

        let mut session = self.session.lock().await;
        match session.complete_lesson(&ticket, result) {
            Completion::Succeeded => {
                self.broadcaster
                    .send(StudyEvent::lesson_state(session.lesson_state()));
                self.broadcaster
                    .send(StudyEvent::stats_updated(session.stats()));
            }
            Completion::Failed => {
                self.broadcaster
                    .send(StudyEvent::lesson_state(session.lesson_state()));
                let message = format!("Lesson generation failed for '{}'", ticket.request.title);
                self.broadcaster.send(StudyEvent::failure(message, retryable));
            }
            Completion::Stale => {}
        }
    }

    // ------------------------------------------------------------------------
    // Curriculum expansion
    // ------------------------------------------------------------------------

    /// Starts a gap analysis in the background.
    ///
    /// Results of an analysis started before a reset are dropped without an
    /// event.
    ///
    /// # Errors
    ///
    /// Returns `ExpansionBusy` if one is already running.
    pub async fn expand_curriculum(&self) -> Result<JoinHandle<()>> {
        let ticket = self.session.lock().await.begin_expansion()?;

        let controller = self.clone();
        Ok(tokio::spawn(async move {
            let result = controller.service.suggest_topics(&ticket.titles).await;

            let mut session = controller.session.lock().await;
            match session.finish_expansion(&ticket, result) {
                ExpansionOutcome::Applied(ids) => {
                    controller
                        .broadcaster
                        .send(StudyEvent::curriculum_expanded(ids));
                }
                ExpansionOutcome::Failed => {
                    controller
                        .broadcaster
                        .send(StudyEvent::curriculum_expanded(Vec::new()));
                }
                ExpansionOutcome::Stale => {}
            }
        }))
    }

    // ------------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------------

    /// Discards all session state.
    pub async fn reset(&self) -> SessionSnapshot {
        let mut session = self.session.lock().await;
        session.reset();
        let snapshot = session.snapshot();

        self.broadcaster
            .send(StudyEvent::stats_updated(snapshot.stats));
        self.broadcaster
            .send(StudyEvent::lesson_state(session.lesson_state()));
        snapshot
    }
}
