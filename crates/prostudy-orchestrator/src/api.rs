//! HTTP API endpoints for the Pro-Study server.
//!
//! # Endpoints
//!
//! - `GET /api/curriculum?focus=` - Visible tree rows and roots
//! - `POST /api/topics/:id/toggle` - Expand or collapse a node
//! - `POST /api/topics/:id/lesson` - Generate a basic lesson for a node
//! - `GET /api/atlas` - Procedure atlas
//! - `POST /api/lessons` - Generate a lesson for any title
//! - `POST /api/lessons/random` - Generate a deep-dive lesson on a random title
//! - `GET /api/lesson` - Current lesson panel
//! - `DELETE /api/lesson` - Close the lesson panel
//! - `GET /api/lesson/export?format=` - Download the displayed lesson
//! - `POST /api/custom` - Submit a custom topic request
//! - `POST /api/curriculum/expand` - Start a curriculum gap analysis
//! - `GET /api/stats` - Session counters
//! - `POST /api/session/reset` - Discard all session state
//! - `GET /ws` - WebSocket event stream
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use prostudy_orchestrator::{create_router, AppState, Config, GeminiClient, StudyController};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let service = Arc::new(GeminiClient::new(&config, "api-key"));
//! let state = AppState::new(StudyController::new(service));
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prostudy_report::ExportFormat;
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::catalog::{Atlas, Focus};
use crate::controller::{LessonTask, StudyController};
use crate::display::LessonView;
use crate::error::StudyError;
use crate::lesson::{GenerateRequest, RequestTicket};
use crate::session::{CurriculumSnapshot, SessionSnapshot};
use crate::stats::SessionStats;
use crate::tree_view::ToggleOutcome;
use crate::websocket::ws_handler;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query string for the curriculum endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurriculumQuery {
    /// Optional focus name.
    pub focus: Option<String>,
}

/// Query string for the export endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportQuery {
    /// `markdown` (default) or `json`.
    pub format: Option<String>,
}

/// Response body for the toggle endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    /// Node id.
    pub id: String,
    /// Expansion state after the toggle.
    pub expanded: bool,
    /// Whether this toggle was the node's first exploration.
    pub explored: bool,
}

impl From<ToggleOutcome> for ToggleResponse {
    fn from(outcome: ToggleOutcome) -> Self {
        Self {
            explored: outcome.event.is_some(),
            id: outcome.id,
            expanded: outcome.expanded,
        }
    }
}

/// Response body for endpoints that start a lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonStartedResponse {
    /// Sequence number of the request.
    pub sequence: u64,
    /// Requested title.
    pub title: String,
    /// Whether deep-dive mode was requested.
    pub deep_dive: bool,
    /// Id of the topic added for a custom request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,
}

impl LessonStartedResponse {
    fn new(ticket: &RequestTicket, topic_id: Option<String>) -> Self {
        Self {
            sequence: ticket.sequence,
            title: ticket.request.title.clone(),
            deep_dive: ticket.request.deep_dive,
            topic_id,
        }
    }
}

impl From<LessonTask> for LessonStartedResponse {
    fn from(task: LessonTask) -> Self {
        Self::new(&task.ticket, None)
    }
}

/// Request body for the custom topic endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomRequest {
    /// Free-text topic request.
    pub request: String,
}

/// Response body for the custom topic endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomResponse {
    /// Whether a topic was added and a lesson started.
    pub accepted: bool,
    /// Details of the started lesson, when accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<LessonStartedResponse>,
}

/// Response body for the expand endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandResponse {
    /// Always `true`; results arrive as a `curriculum_expanded` event.
    pub started: bool,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The running session.
    pub controller: StudyController,
}

impl AppState {
    /// Creates a new `AppState`.
    #[must_use]
    pub const fn new(controller: StudyController) -> Self {
        Self { controller }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// Unknown topic id.
    NotFound(String),
    /// The request conflicts with work in progress or missing state.
    Conflict(String),
    /// The request itself is unusable.
    BadRequest(String),
    /// Anything else.
    Internal(String),
}

impl From<StudyError> for ApiError {
    fn from(err: StudyError) -> Self {
        match err {
            StudyError::TopicNotFound { .. } => Self::NotFound(err.to_string()),
            StudyError::ExpansionBusy | StudyError::NoActiveLesson => {
                Self::Conflict(err.to_string())
            }
            StudyError::InvalidRequest { .. } => Self::BadRequest(err.to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints, the WebSocket route, CORS
/// and request tracing.
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for development (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/curriculum", get(handle_curriculum))
        .route("/curriculum/expand", post(handle_expand))
        .route("/topics/:id/toggle", post(handle_toggle))
        .route("/topics/:id/lesson", post(handle_topic_lesson))
        .route("/atlas", get(handle_atlas))
        .route("/lessons", post(handle_lesson))
        .route("/lessons/random", post(handle_random_lesson))
        .route("/lesson", get(handle_lesson_view).delete(handle_close_lesson))
        .route("/lesson/export", get(handle_export))
        .route("/custom", post(handle_custom))
        .route("/stats", get(handle_stats))
        .route("/session/reset", post(handle_reset));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/curriculum`.
async fn handle_curriculum(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CurriculumQuery>,
) -> Result<Json<CurriculumSnapshot>, ApiError> {
    let focus = match query.focus.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(name) => Some(
            Focus::parse(name)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown focus '{name}'")))?,
        ),
    };
    Ok(Json(state.controller.curriculum(focus).await))
}

/// Handler for `POST /api/topics/:id/toggle`.
async fn handle_toggle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let outcome = state.controller.toggle_topic(&id).await?;
    Ok(Json(outcome.into()))
}

/// Handler for `POST /api/topics/:id/lesson`.
async fn handle_topic_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<LessonStartedResponse>), ApiError> {
    let task = state.controller.request_topic_lesson(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(task.into())))
}

/// Handler for `GET /api/atlas`.
async fn handle_atlas(State(state): State<Arc<AppState>>) -> Json<Atlas> {
    Json(state.controller.atlas().await)
}

/// Handler for `POST /api/lessons`.
async fn handle_lesson(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<LessonStartedResponse>), ApiError> {
    info!(title = %request.title, deep_dive = request.deep_dive, "Lesson request received");
    let task = state.controller.request_lesson(request).await?;
    Ok((StatusCode::ACCEPTED, Json(task.into())))
}

/// Handler for `POST /api/lessons/random`.
async fn handle_random_lesson(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<LessonStartedResponse>), ApiError> {
    let task = state
        .controller
        .random_lesson()
        .await
        .ok_or_else(|| ApiError::Conflict("Nothing to pick a lesson from".to_string()))?;
    Ok((StatusCode::ACCEPTED, Json(task.into())))
}

/// Handler for `GET /api/lesson`.
async fn handle_lesson_view(State(state): State<Arc<AppState>>) -> Json<LessonView> {
    Json(state.controller.lesson_view().await)
}

/// Handler for `DELETE /api/lesson`.
async fn handle_close_lesson(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.close_lesson().await;
    StatusCode::NO_CONTENT
}

/// Handler for `GET /api/lesson/export`.
async fn handle_export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let format = match query.format.as_deref() {
        None => ExportFormat::default(),
        Some(name) => ExportFormat::parse(name)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown export format '{name}'")))?,
    };

    let export = state.controller.export_lesson(format).await?;
    info!(file = %export.file_name, "Lesson exported");

    let disposition = format!("attachment; filename=\"{}\"", export.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, export.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response())
}

/// Handler for `POST /api/custom`.
async fn handle_custom(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CustomRequest>,
) -> (StatusCode, Json<CustomResponse>) {
    match state.controller.submit_custom(&request.request).await {
        Some(custom) => (
            StatusCode::ACCEPTED,
            Json(CustomResponse {
                accepted: true,
                lesson: Some(LessonStartedResponse::new(
                    &custom.lesson.ticket,
                    Some(custom.id),
                )),
            }),
        ),
        None => (
            StatusCode::OK,
            Json(CustomResponse {
                accepted: false,
                lesson: None,
            }),
        ),
    }
}

/// Handler for `POST /api/curriculum/expand`.
async fn handle_expand(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ExpandResponse>), ApiError> {
    state.controller.expand_curriculum().await?;
    Ok((StatusCode::ACCEPTED, Json(ExpandResponse { started: true })))
}

/// Handler for `GET /api/stats`.
async fn handle_stats(State(state): State<Arc<AppState>>) -> Json<SessionStats> {
    Json(state.controller.stats().await)
}

/// Handler for `POST /api/session/reset`.
async fn handle_reset(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    info!("Session reset requested");
    Json(state.controller.reset().await)
}

// ============================================================================
// Tests
// ============================================================================
