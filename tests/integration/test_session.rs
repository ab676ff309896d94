//! End-to-end session tests over a real HTTP listener.
//!
//! The lesson service is replaced by a scripted fake so the scenarios run
//! without network access to the generative-AI backend.

use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prostudy_orchestrator::{
    create_router, AppState, LessonRecord, LessonService, StudyController, StudyError,
    TopicNode,
};
use prostudy_report::LessonDocument;
use serde_json::{json, Value};
use tokio::time::sleep;

// ============================================================================
// Fixtures
// ============================================================================

/// Lesson service that answers from a script.
///
/// Titles in `failing` fail, titles in `delays` answer after the given delay,
/// everything else answers immediately with a complete basic lesson.
#[derive(Default)]
struct ScriptedService {
    failing: Vec<String>,
    delays: HashMap<String, Duration>,
    suggestion_delay: Duration,
}

impl ScriptedService {
    fn failing(mut self, title: &str) -> Self {
        self.failing.push(title.to_string());
        self
    }

    fn delayed(mut self, title: &str, delay: Duration) -> Self {
        self.delays.insert(title.to_string(), delay);
        self
    }

    const fn slow_suggestions(mut self, delay: Duration) -> Self {
        self.suggestion_delay = delay;
        self
    }
}

#[async_trait]
impl LessonService for ScriptedService {
    async fn generate_lesson(
        &self,
        title: &str,
        deep_dive: bool,
    ) -> prostudy_orchestrator::Result<LessonRecord> {
        if let Some(delay) = self.delays.get(title) {
            sleep(*delay).await;
        }
        if self.failing.iter().any(|t| t == title) {
            return Err(StudyError::generation(title, "service unavailable"));
        }

        let mut lesson = LessonRecord {
            title: title.to_string(),
            overview: format!("{title} overview"),
            anatomy: format!("{title} anatomy"),
            tools: "Needle, forceps".to_string(),
            procedure: "Mark, clamp, pierce".to_string(),
            aftercare: "Saline twice daily".to_string(),
            complications: "Irritation bumps".to_string(),
            ..LessonRecord::default()
        };
        if deep_dive {
            lesson.difficulty = Some("Advanced".to_string());
        }
        Ok(lesson)
    }

    async fn suggest_topics(
        &self,
        _existing_titles: &[String],
    ) -> prostudy_orchestrator::Result<Vec<TopicNode>> {
        sleep(self.suggestion_delay).await;
        Ok(vec![TopicNode::branch(
            "bloodborne-pathogens",
            "Bloodborne Pathogens",
            vec![TopicNode::leaf("bbp-exposure", "Exposure Response")],
        )])
    }
}

fn find_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind to port")
        .local_addr()
        .expect("Failed to get local addr")
        .port()
}

/// Spawns the server and returns its base URL.
async fn spawn_server(service: ScriptedService) -> String {
    let port = find_available_port();
    let addr = format!("127.0.0.1:{port}");

    let controller = StudyController::new(Arc::new(service));
    let router = create_router(AppState::new(controller));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    sleep(Duration::from_millis(50)).await;
    format!("http://{addr}")
}

async fn get_json(client: &reqwest::Client, url: &str) -> Value {
    client
        .get(url)
        .send()
        .await
        .expect("request failed")
        .json()
        .await
        .expect("invalid JSON")
}

async fn post_json(client: &reqwest::Client, url: &str, body: &Value) -> (u16, Value) {
    let response = client
        .post(url)
        .json(body)
        .send()
        .await
        .expect("request failed");
    let status = response.status().as_u16();
    let value = response.json().await.unwrap_or(Value::Null);
    (status, value)
}

/// Polls the lesson panel until it leaves the loading view.
async fn wait_for_settled_view(client: &reqwest::Client, base: &str) -> Value {
    for _ in 0..250 {
        let view = get_json(client, &format!("{base}/api/lesson")).await;
        if view["view"] != "loading" {
            return view;
        }
        sleep(Duration::from_millis(20)).await;
    }
    unreachable!("lesson never left the loading view");
}

fn root_ids(curriculum: &Value) -> Vec<String> {
    curriculum["roots"]
        .as_array()
        .expect("roots array")
        .iter()
        .filter_map(|root| root["id"].as_str().map(ToString::to_string))
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_exploring_anatomy_counts_once() {
    let base = spawn_server(ScriptedService::default()).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/api/topics/anatomy-physiology/toggle");

    let (_, first) = post_json(&client, &url, &json!({})).await;
    let (_, second) = post_json(&client, &url, &json!({})).await;
    let (_, third) = post_json(&client, &url, &json!({})).await;

    assert_eq!(first["expanded"], true);
    assert_eq!(first["explored"], true);
    assert_eq!(second["expanded"], false);
    assert_eq!(second["explored"], false);
    assert_eq!(third["explored"], false);

    let stats = get_json(&client, &format!("{base}/api/stats")).await;
    assert_eq!(stats["topicsExplored"], 1);
    assert_eq!(stats["lessonsGenerated"], 0);
}

#[tokio::test]
async fn test_unknown_topic_is_not_found() {
    let base = spawn_server(ScriptedService::default()).await;
    let client = reqwest::Client::new();

    let (status, body) = post_json(
        &client,
        &format!("{base}/api/topics/no-such-topic/toggle"),
        &json!({}),
    )
    .await;

    assert_eq!(status, 404);
    assert!(body["error"].as_str().unwrap().contains("no-such-topic"));
}

#[tokio::test]
async fn test_failed_deep_dive_leaves_counter_unchanged() {
    let base = spawn_server(ScriptedService::default().failing("Daith")).await;
    let client = reqwest::Client::new();

    let (status, started) = post_json(
        &client,
        &format!("{base}/api/lessons"),
        &json!({"title": "Daith", "deepDive": true}),
    )
    .await;
    assert_eq!(status, 202);
    assert_eq!(started["deepDive"], true);

    let view = wait_for_settled_view(&client, &base).await;
    assert_eq!(view["view"], "failed");

    let stats = get_json(&client, &format!("{base}/api/stats")).await;
    assert_eq!(stats["lessonsGenerated"], 0);
}

#[tokio::test]
async fn test_late_result_does_not_replace_newer_lesson() {
    let service = ScriptedService::default().delayed("Helix", Duration::from_millis(300));
    let base = spawn_server(service).await;
    let client = reqwest::Client::new();
    let lessons = format!("{base}/api/lessons");

    post_json(&client, &lessons, &json!({"title": "Helix", "deepDive": false})).await;
    post_json(&client, &lessons, &json!({"title": "Tragus", "deepDive": false})).await;

    let view = wait_for_settled_view(&client, &base).await;
    assert_eq!(view["view"], "ready");
    assert_eq!(view["title"], "Tragus");

    // Let the slow Helix reply land.
    sleep(Duration::from_millis(500)).await;

    let view = get_json(&client, &format!("{base}/api/lesson")).await;
    assert_eq!(view["title"], "Tragus");

    let stats = get_json(&client, &format!("{base}/api/stats")).await;
    assert_eq!(stats["lessonsGenerated"], 1);
}

#[tokio::test]
async fn test_export_downloads_displayed_lesson() {
    let base = spawn_server(ScriptedService::default()).await;
    let client = reqwest::Client::new();

    let export_url = format!("{base}/api/lesson/export");
    let response = client.get(&export_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 409);

    post_json(
        &client,
        &format!("{base}/api/lessons"),
        &json!({"title": "Industrial", "deepDive": false}),
    )
    .await;
    wait_for_settled_view(&client, &base).await;

    let response = client.get(&export_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(disposition.contains("industrial.md"));

    let body = response.text().await.unwrap();
    assert!(body.starts_with("# Industrial"));
    assert!(body.contains("Saline twice daily"));

    let response = client
        .get(format!("{export_url}?format=json"))
        .send()
        .await
        .unwrap();
    let document: LessonDocument = response.json().await.unwrap();
    assert_eq!(document.title, "Industrial");
    assert!(document
        .sections
        .iter()
        .any(|section| section.body.contains("Saline twice daily")));
}

#[tokio::test]
async fn test_custom_request_adds_masterclass_root() {
    let base = spawn_server(ScriptedService::default()).await;
    let client = reqwest::Client::new();
    let custom = format!("{base}/api/custom");

    let (status, blank) = post_json(&client, &custom, &json!({"request": "   "})).await;
    assert_eq!(status, 200);
    assert_eq!(blank["accepted"], false);

    let (status, accepted) =
        post_json(&client, &custom, &json!({"request": "Microdermal anchors"})).await;
    assert_eq!(status, 202);
    assert_eq!(accepted["accepted"], true);
    let topic_id = accepted["lesson"]["topicId"].as_str().unwrap().to_string();
    assert!(topic_id.starts_with("custom-"));
    assert_eq!(accepted["lesson"]["deepDive"], true);

    let masterclass = get_json(&client, &format!("{base}/api/curriculum?focus=masterclass")).await;
    assert!(root_ids(&masterclass).contains(&topic_id));

    let clinical = get_json(&client, &format!("{base}/api/curriculum?focus=clinical")).await;
    assert!(!root_ids(&clinical).contains(&topic_id));

    let view = wait_for_settled_view(&client, &base).await;
    assert_eq!(view["title"], "Microdermal anchors");
}

#[tokio::test]
async fn test_expansion_appends_topics_and_rejects_overlap() {
    let service = ScriptedService::default().slow_suggestions(Duration::from_millis(200));
    let base = spawn_server(service).await;
    let client = reqwest::Client::new();
    let expand = format!("{base}/api/curriculum/expand");

    let before = get_json(&client, &format!("{base}/api/curriculum")).await;
    let before_roots = root_ids(&before);

    let (status, _) = post_json(&client, &expand, &json!({})).await;
    assert_eq!(status, 202);
    let (status, _) = post_json(&client, &expand, &json!({})).await;
    assert_eq!(status, 409);

    let mut after = Vec::new();
    for _ in 0..100 {
        let curriculum = get_json(&client, &format!("{base}/api/curriculum")).await;
        if curriculum["expanding"] == false {
            after = root_ids(&curriculum);
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(after.len(), before_roots.len() + 1);
    assert_eq!(&after[..before_roots.len()], &before_roots[..]);
    assert_eq!(after.last().map(String::as_str), Some("bloodborne-pathogens"));
}

#[tokio::test]
async fn test_reset_clears_session() {
    let base = spawn_server(ScriptedService::default()).await;
    let client = reqwest::Client::new();

    post_json(
        &client,
        &format!("{base}/api/topics/health-safety/toggle"),
        &json!({}),
    )
    .await;
    post_json(
        &client,
        &format!("{base}/api/custom"),
        &json!({"request": "Surface bars"}),
    )
    .await;
    wait_for_settled_view(&client, &base).await;

    let (status, snapshot) =
        post_json(&client, &format!("{base}/api/session/reset"), &json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(snapshot["stats"]["topicsExplored"], 0);
    assert_eq!(snapshot["stats"]["lessonsGenerated"], 0);
    assert_eq!(snapshot["lessonStatus"], "idle");

    let curriculum = get_json(&client, &format!("{base}/api/curriculum")).await;
    assert!(root_ids(&curriculum)
        .iter()
        .all(|id| !id.starts_with("custom-")));
}
