//! Pro-Study Orchestrator
//!
//! Owns the study session (curriculum tree, explored set, lesson state,
//! curriculum expansion) and exposes it over HTTP and WebSocket. Lessons and
//! topic suggestions come from a [`LessonService`]; [`GeminiClient`] is the
//! production implementation.

pub mod api;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod gemini;
pub mod lesson;
pub mod service;
pub mod session;
pub mod stats;
pub mod topic;
pub mod tree_view;
pub mod websocket;

pub use api::{create_router, AppState, ErrorResponse};
pub use catalog::{piercing_atlas, seed_curriculum, Atlas, AtlasCategory, Focus};
pub use config::Config;
pub use controller::{CustomTask, LessonTask, StudyController};
pub use display::{LessonView, SectionView};
pub use error::{LlmErrorKind, Result, StudyError};
pub use gemini::GeminiClient;
pub use lesson::{
    Completion, GenerateRequest, LessonRecord, LessonState, RequestState, RequestTicket,
};
pub use service::LessonService;
pub use session::{
    CurriculumSnapshot, ExpansionOutcome, ExportedLesson, Session, SessionSnapshot,
};
pub use stats::{ExploredSet, SessionStats};
pub use topic::{TopicNode, TopicTree};
pub use tree_view::{ToggleOutcome, TopicRow, TreeEvent, TreeView};
pub use websocket::{EventBroadcaster, StudyEvent};
