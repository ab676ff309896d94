//! WebSocket event types and broadcasting for live session observation.
//!
//! Events are broadcast to every connected client as the session changes.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes a session snapshot
//! - `topic_explored` - A tree node was expanded for the first time
//! - `lesson_state` - The lesson panel changed state
//! - `curriculum_expanded` - A gap analysis finished
//! - `stats_updated` - Session counters changed
//! - `error` - A background call failed
//!
//! # Example
//!
//! ```no_run
//! use prostudy_orchestrator::websocket::{EventBroadcaster, StudyEvent};
//!
//! # async fn example() {
//! let broadcaster = EventBroadcaster::new(100);
//! let mut receiver = broadcaster.subscribe();
//!
//! broadcaster.send(StudyEvent::error("Curriculum expansion failed"));
//!
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::lesson::RequestState;
use crate::session::SessionSnapshot;
use crate::stats::SessionStats;

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The session as it is right now.
    pub session: SessionSnapshot,
}

/// Payload for the `topic_explored` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicExploredPayload {
    /// Id of the explored node.
    pub id: String,
    /// Explored count after this event.
    pub topics_explored: u64,
}

/// Payload for the `lesson_state` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonStatePayload {
    /// State name: idle, loading, success or error.
    pub status: String,
    /// Title the state refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Payload for the `curriculum_expanded` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumExpandedPayload {
    /// Number of nodes added.
    pub added: usize,
    /// Ids of the added nodes, in display order.
    pub ids: Vec<String>,
}

/// Payload for the `error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Human-readable error message.
    pub message: String,
    /// Whether repeating the same action may succeed.
    #[serde(default)]
    pub retryable: bool,
}

// ============================================================================
// Event Enum
// ============================================================================

/// WebSocket event types for session observation.
///
/// All events are serialized as JSON objects with "event" and "payload" fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StudyEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when a node is explored for the first time.
    TopicExplored(TopicExploredPayload),
    /// Sent when the lesson panel changes state.
    LessonState(LessonStatePayload),
    /// Sent when a gap analysis adds topics.
    CurriculumExpanded(CurriculumExpandedPayload),
    /// Sent when session counters change.
    StatsUpdated(SessionStats),
    /// Sent when an error occurs.
    Error(ErrorPayload),
}

impl StudyEvent {
    /// Creates a `Connected` event.
    #[must_use]
    pub const fn connected(session: SessionSnapshot) -> Self {
        Self::Connected(ConnectedPayload { session })
    }

    /// Creates a `TopicExplored` event.
    #[must_use]
    pub fn topic_explored(id: impl Into<String>, topics_explored: u64) -> Self {
        Self::TopicExplored(TopicExploredPayload {
            id: id.into(),
            topics_explored,
        })
    }

    /// Creates a `LessonState` event from the current request state.
    #[must_use]
    pub fn lesson_state(state: &RequestState) -> Self {
        Self::LessonState(LessonStatePayload {
            status: state.name().to_string(),
            title: state.title().map(ToString::to_string),
        })
    }

    /// Creates a `CurriculumExpanded` event.
    #[must_use]
    pub fn curriculum_expanded(ids: Vec<String>) -> Self {
        Self::CurriculumExpanded(CurriculumExpandedPayload {
            added: ids.len(),
            ids,
        })
    }

    /// Creates a `StatsUpdated` event.
    #[must_use]
    pub const fn stats_updated(stats: SessionStats) -> Self {
        Self::StatsUpdated(stats)
    }

    /// Creates an `Error` event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
            retryable: false,
        })
    }

    /// Creates an `Error` event for a failed action. `retryable` comes
    /// from [`crate::error::StudyError::is_transient`] on the cause.
    #[must_use]
    pub fn failure(message: impl Into<String>, retryable: bool) -> Self {
        Self::Error(ErrorPayload {
            message: message.into(),
            retryable,
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::TopicExplored(_) => "topic_explored",
            Self::LessonState(_) => "lesson_state",
            Self::CurriculumExpanded(_) => "curriculum_expanded",
            Self::StatsUpdated(_) => "stats_updated",
            Self::Error(_) => "error",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts session events to all connected WebSocket clients.
///
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StudyEvent>,
}

impl EventBroadcaster {
    /// Creates a broadcaster that buffers up to `capacity` events per
    /// subscriber before old events are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber. A subscriber that falls behind receives a
    /// `Lagged` error and misses some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StudyEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event. Returns the number of receivers; 0 means no
    /// client is connected.
    pub fn send(&self, event: StudyEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Handler
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::api::AppState;

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// Interval between heartbeat pings.
const HEARTBEAT: Duration = Duration::from_secs(30);

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("New WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handles a single WebSocket connection.
///
/// - Sends `connected` with a session snapshot immediately
/// - Forwards every broadcast event to the client
/// - Sends heartbeat pings every 30 seconds
/// - Closes connection after 3 missed pongs
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before snapshotting so nothing falls between the two
    let mut event_receiver = state.controller.broadcaster().subscribe();
    let snapshot = state.controller.snapshot().await;

    let connected_json = match serde_json::to_string(&StudyEvent::connected(snapshot)) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent session snapshot");

    let mut heartbeat_interval = interval(HEARTBEAT);
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        debug!("Ignoring data message from client");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            event = event_receiver.recv() => {
                match event {
                    Ok(study_event) => {
                        let json = match serde_json::to_string(&study_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::{LlmErrorKind, StudyError};
    use crate::lesson::GenerateRequest;
    use crate::session::Session;

    #[test]
    fn test_connected_event_serialization() {
        let event = StudyEvent::connected(Session::new().snapshot());

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event":"connected""#));
        assert!(json.contains(r#""lessonStatus":"idle""#));
        assert!(json.contains(r#""topicCount":37"#));
    }

    #[test]
    fn test_topic_explored_event_serialization() {
        let json =
            serde_json::to_string(&StudyEvent::topic_explored("anatomy-physiology", 1)).unwrap();
        assert_eq!(
            json,
            r#"{"event":"topic_explored","payload":{"id":"anatomy-physiology","topicsExplored":1}}"#
        );
    }

    #[test]
    fn test_lesson_state_event_serialization() {
        let state = RequestState::Loading {
            request: GenerateRequest::new("Daith", true),
        };
        let json = serde_json::to_string(&StudyEvent::lesson_state(&state)).unwrap();
        assert_eq!(
            json,
            r#"{"event":"lesson_state","payload":{"status":"loading","title":"Daith"}}"#
        );

        let json = serde_json::to_string(&StudyEvent::lesson_state(&RequestState::Idle)).unwrap();
        assert_eq!(json, r#"{"event":"lesson_state","payload":{"status":"idle"}}"#);
    }

    #[test]
    fn test_stats_and_expansion_serialization() {
        let json = serde_json::to_string(&StudyEvent::stats_updated(SessionStats {
            lessons_generated: 2,
            topics_explored: 5,
        }))
        .unwrap();
        assert!(json.contains(r#""lessonsGenerated":2"#));

        let json = serde_json::to_string(&StudyEvent::curriculum_expanded(vec![
            "a".to_string(),
            "b".to_string(),
        ]))
        .unwrap();
        assert!(json.contains(r#""added":2"#));
    }

    #[test]
    fn test_error_event_deserialization() {
        let json = r#"{"event":"error","payload":{"message":"Something went wrong"}}"#;

        let event: StudyEvent = serde_json::from_str(json).unwrap();
        let StudyEvent::Error(payload) = event else {
            unreachable!("error event expected");
        };
        assert_eq!(payload.message, "Something went wrong");
        assert!(!payload.retryable);
    }

    #[test]
    fn test_failure_event_marks_retryable_causes() {
        let rate_limited = StudyError::llm_api_error(LlmErrorKind::RateLimit, "slow down");
        let event = StudyEvent::failure("Daith failed", rate_limited.is_transient());
        let StudyEvent::Error(payload) = event else {
            unreachable!("error event expected");
        };
        assert!(payload.retryable);

        let rejected = StudyError::llm_api_error(LlmErrorKind::Authentication, "bad key");
        let event = StudyEvent::failure("Daith failed", rejected.is_transient());
        let StudyEvent::Error(payload) = event else {
            unreachable!("error event expected");
        };
        assert!(!payload.retryable);

        let json = serde_json::to_value(StudyEvent::failure("x", true)).unwrap();
        assert_eq!(json["payload"]["retryable"], true);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(
            StudyEvent::connected(Session::new().snapshot()).event_name(),
            "connected"
        );
        assert_eq!(StudyEvent::topic_explored("x", 1).event_name(), "topic_explored");
        assert_eq!(
            StudyEvent::lesson_state(&RequestState::Idle).event_name(),
            "lesson_state"
        );
        assert_eq!(
            StudyEvent::curriculum_expanded(Vec::new()).event_name(),
            "curriculum_expanded"
        );
        assert_eq!(
            StudyEvent::stats_updated(SessionStats::default()).event_name(),
            "stats_updated"
        );
        assert_eq!(StudyEvent::error("").event_name(), "error");
    }

    #[tokio::test]
    async fn test_broadcaster_multiple_subscribers() {
        let broadcaster = EventBroadcaster::new(10);
        let mut receiver1 = broadcaster.subscribe();
        let mut receiver2 = broadcaster.subscribe();

        let count = broadcaster.send(StudyEvent::error("test"));
        assert_eq!(count, 2);

        assert!(matches!(receiver1.recv().await.unwrap(), StudyEvent::Error(_)));
        assert!(matches!(receiver2.recv().await.unwrap(), StudyEvent::Error(_)));
    }

    #[test]
    fn test_broadcaster_no_subscribers() {
        let broadcaster = EventBroadcaster::default();
        assert_eq!(broadcaster.receiver_count(), 0);
        assert_eq!(broadcaster.send(StudyEvent::error("nobody")), 0);
    }
}
