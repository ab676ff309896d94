//! Integration tests for the WebSocket event stream.
//!
//! These tests drive the session through the HTTP API and check the events
//! every connected client receives.

use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::SinkExt;
use futures::StreamExt;
use prostudy_orchestrator::{
    create_router, AppState, LessonRecord, LessonService, StudyController, StudyError,
    StudyEvent, TopicNode,
};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::Message;

/// Answers every lesson except "Daith"; suggests nothing.
struct FixedService;

#[async_trait]
impl LessonService for FixedService {
    async fn generate_lesson(
        &self,
        title: &str,
        _deep_dive: bool,
    ) -> prostudy_orchestrator::Result<LessonRecord> {
        if title == "Daith" {
            return Err(StudyError::generation(title, "quota exhausted"));
        }
        Ok(LessonRecord {
            title: title.to_string(),
            overview: "Overview".to_string(),
            anatomy: "Anatomy".to_string(),
            tools: "Tools".to_string(),
            procedure: "Procedure".to_string(),
            aftercare: "Aftercare".to_string(),
            complications: "Complications".to_string(),
            ..LessonRecord::default()
        })
    }

    async fn suggest_topics(
        &self,
        _existing_titles: &[String],
    ) -> prostudy_orchestrator::Result<Vec<TopicNode>> {
        Ok(Vec::new())
    }
}

fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawns the test server and returns `(http_base, ws_url)`.
async fn spawn_test_server() -> (String, String) {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let controller = StudyController::new(Arc::new(FixedService));
    let router = create_router(AppState::new(controller));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    (format!("http://{addr}"), format!("ws://{addr}/ws"))
}

async fn connect_client(url: &str) -> WsClient {
    let (ws_stream, _) = connect_async(url)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Receives the next event, answering pings along the way.
async fn receive_event(client: &mut WsClient) -> StudyEvent {
    loop {
        let msg = timeout(Duration::from_secs(5), client.next())
            .await
            .expect("Timeout waiting for message")
            .expect("Stream ended")
            .expect("WebSocket error");

        match msg {
            Message::Text(text) => {
                return serde_json::from_str(&text).expect("Failed to parse event");
            }
            Message::Ping(data) => {
                client
                    .send(Message::Pong(data))
                    .await
                    .expect("Failed to send pong");
            }
            Message::Pong(_) => {}
            other => unreachable!("Expected text message, got: {other:?}"),
        }
    }
}

// ============================================================================
// Connection Tests
// ============================================================================

#[tokio::test]
async fn test_client_receives_connected_snapshot() {
    let (_, ws_url) = spawn_test_server().await;

    let mut client = connect_client(&ws_url).await;
    let event = receive_event(&mut client).await;

    let StudyEvent::Connected(payload) = event else {
        unreachable!("Expected Connected event, got: {event:?}");
    };
    assert_eq!(payload.session.lesson_status, "idle");
    assert_eq!(payload.session.stats.topics_explored, 0);
    assert!(!payload.session.expanding);
    assert!(payload.session.topic_count > 0);
}

#[tokio::test]
async fn test_multiple_clients_can_connect() {
    let (_, ws_url) = spawn_test_server().await;

    let mut client1 = connect_client(&ws_url).await;
    let mut client2 = connect_client(&ws_url).await;

    assert!(matches!(
        receive_event(&mut client1).await,
        StudyEvent::Connected(_)
    ));
    assert!(matches!(
        receive_event(&mut client2).await,
        StudyEvent::Connected(_)
    ));
}

// ============================================================================
// API-driven Events
// ============================================================================

#[tokio::test]
async fn test_first_toggle_broadcasts_topic_explored() {
    let (http, ws_url) = spawn_test_server().await;
    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    let http_client = reqwest::Client::new();
    let toggle = format!("{http}/api/topics/anatomy-physiology/toggle");
    for _ in 0..2 {
        let response = http_client.post(&toggle).send().await.unwrap();
        assert!(response.status().is_success());
    }

    let event = receive_event(&mut client).await;
    let StudyEvent::TopicExplored(payload) = event else {
        unreachable!("Expected TopicExplored event, got: {event:?}");
    };
    assert_eq!(payload.id, "anatomy-physiology");
    assert_eq!(payload.topics_explored, 1);

    let event = receive_event(&mut client).await;
    assert!(matches!(event, StudyEvent::StatsUpdated(stats) if stats.topics_explored == 1));

    // The collapse produced nothing; the next event comes from a new action.
    http_client
        .delete(format!("{http}/api/lesson"))
        .send()
        .await
        .unwrap();
    let event = receive_event(&mut client).await;
    assert!(matches!(event, StudyEvent::LessonState(ref p) if p.status == "idle"));
}

#[tokio::test]
async fn test_lesson_request_streams_loading_then_success() {
    let (http, ws_url) = spawn_test_server().await;
    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    let response = reqwest::Client::new()
        .post(format!("{http}/api/lessons"))
        .json(&serde_json::json!({"title": "Conch", "deepDive": false}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 202);

    let event = receive_event(&mut client).await;
    let StudyEvent::LessonState(loading) = event else {
        unreachable!("Expected LessonState event, got: {event:?}");
    };
    assert_eq!(loading.status, "loading");
    assert_eq!(loading.title.as_deref(), Some("Conch"));

    let event = receive_event(&mut client).await;
    let StudyEvent::LessonState(done) = event else {
        unreachable!("Expected LessonState event, got: {event:?}");
    };
    assert_eq!(done.status, "success");

    let event = receive_event(&mut client).await;
    assert!(matches!(event, StudyEvent::StatsUpdated(stats) if stats.lessons_generated == 1));
}

#[tokio::test]
async fn test_failed_lesson_streams_error() {
    let (http, ws_url) = spawn_test_server().await;
    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    reqwest::Client::new()
        .post(format!("{http}/api/lessons"))
        .json(&serde_json::json!({"title": "Daith", "deepDive": true}))
        .send()
        .await
        .unwrap();

    let loading = receive_event(&mut client).await;
    assert!(matches!(loading, StudyEvent::LessonState(ref p) if p.status == "loading"));

    let failed = receive_event(&mut client).await;
    assert!(matches!(failed, StudyEvent::LessonState(ref p) if p.status == "error"));

    let event = receive_event(&mut client).await;
    let StudyEvent::Error(payload) = event else {
        unreachable!("Expected Error event, got: {event:?}");
    };
    assert!(payload.message.contains("Daith"));
}

#[tokio::test]
async fn test_empty_expansion_reports_zero_added() {
    let (http, ws_url) = spawn_test_server().await;
    let mut client = connect_client(&ws_url).await;
    receive_event(&mut client).await;

    let response = reqwest::Client::new()
        .post(format!("{http}/api/curriculum/expand"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 202);

    let event = receive_event(&mut client).await;
    let StudyEvent::CurriculumExpanded(payload) = event else {
        unreachable!("Expected CurriculumExpanded event, got: {event:?}");
    };
    assert_eq!(payload.added, 0);
    assert!(payload.ids.is_empty());
}

// ============================================================================
// Disconnection Tests
// ============================================================================

#[tokio::test]
async fn test_server_continues_after_client_disconnect() {
    let (_, ws_url) = spawn_test_server().await;

    let mut client1 = connect_client(&ws_url).await;
    receive_event(&mut client1).await;
    client1.close(None).await.ok();
    drop(client1);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut client2 = connect_client(&ws_url).await;
    let event = receive_event(&mut client2).await;
    assert!(matches!(event, StudyEvent::Connected(_)));
}
