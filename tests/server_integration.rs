//! HTTP tests: the router runs on an ephemeral port with an in-memory store
//! and a scripted model client.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use adaptiq::analysis::{DisabledClient, ModelClient};
use adaptiq::clock::ManualClock;
use adaptiq::progress::ProgressTracker;
use adaptiq::server::{build_router, AppState};
use adaptiq::store::MemoryStore;

/// Answers every prompt with the same text.
struct ScriptedModel {
    reply: String,
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        Ok(self.reply.clone())
    }
}

async fn start_server(model: Arc<dyn ModelClient>) -> String {
    let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let tracker = ProgressTracker::open(MemoryStore::new(), ManualClock::at_date(date), "test");
    let app = build_router(AppState::new(tracker, model));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn post(base: &str, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_and_tool_list() {
    let base = start_server(Arc::new(DisabledClient)).await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let list: Value = client
        .get(format!("{}/tools/list", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = list["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 15);
    assert!(names.contains(&"plan_session"));
    assert!(names.contains(&"detect_panic_level_ai"));
}

#[tokio::test]
async fn test_tool_call_wraps_result() {
    let base = start_server(Arc::new(DisabledClient)).await;

    let (status, body) = post(&base, "/tools/analyze_input", json!({ "input": "I have 2 hours" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["time"]["budget"], "deep");
    assert_eq!(body["result"]["time"]["minutes"], 120);
}

#[tokio::test]
async fn test_tool_errors_follow_contract() {
    let base = start_server(Arc::new(DisabledClient)).await;

    let (status, body) = post(&base, "/tools/nonexistent", json!({})).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = post(&base, "/tools/analyze_input", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
    assert!(body["error"]["message"].as_str().unwrap().contains("input"));

    let (status, body) = post(
        &base,
        "/tools/get_question_by_id",
        json!({ "id": "jee-9999" }),
    )
    .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_progress_shared_across_calls() {
    let base = start_server(Arc::new(DisabledClient)).await;

    for _ in 0..3 {
        let (status, _) = post(
            &base,
            "/tools/record_answer",
            json!({ "question_id": "jee-4", "selected_answer": "b", "mistake_type": "conceptual" }),
        )
        .await;
        assert_eq!(status, 200);
    }

    let (_, body) = post(&base, "/tools/get_progress", json!({})).await;
    let progress = &body["result"];
    assert_eq!(progress["totalAttempted"], 3);
    assert_eq!(progress["weakTopics"][0]["topic"], "Kinematics");
    assert_eq!(progress["mistakePattern"]["type"], "conceptual");
    assert_eq!(progress["mistakePattern"]["count"], 3);

    let (_, body) = post(&base, "/tools/plan_session", json!({ "input": "got some time" })).await;
    assert_eq!(body["result"]["suggestedTopics"][0], "Kinematics");
}

#[tokio::test]
async fn test_analyze_route_returns_model_json() {
    let model = ScriptedModel {
        reply: r#"{"message":"One step at a time.","suggestedAction":"Try two easy questions."}"#
            .to_string(),
    };
    let base = start_server(Arc::new(model)).await;

    let (status, body) = post(
        &base,
        "/api/analyze",
        json!({
            "type": "generateEncouragement",
            "data": { "accuracy": 45, "totalSolved": 12, "streak": 2 }
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "One step at a time.");
}

#[tokio::test]
async fn test_analyze_route_errors() {
    let base = start_server(Arc::new(DisabledClient)).await;

    let (status, body) = post(&base, "/api/analyze", json!({ "type": "predictScore", "data": {} })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Unknown analysis type");

    let (status, body) = post(
        &base,
        "/api/analyze",
        json!({ "type": "detectPanicLevel", "data": { "message": "help" } }),
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "Analysis failed");
    assert!(body["details"].as_str().unwrap().contains("disabled"));
}

#[tokio::test]
async fn test_ai_tool_uses_model_when_available() {
    let model = ScriptedModel {
        reply: "```json\n{\"panicLevel\":\"medium\",\"detectedEmotions\":[\"worry\"],\"needsIntervention\":false,\"suggestedApproach\":\"practical\",\"keyTriggers\":[\"time\"]}\n```".to_string(),
    };
    let base = start_server(Arc::new(model)).await;

    let (status, body) = post(
        &base,
        "/tools/detect_panic_level_ai",
        json!({ "message": "exam in 2 days and I'm behind" }),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["result"]["panicLevel"], "medium");
    assert_eq!(body["result"]["suggestedApproach"], "practical");
}

#[tokio::test]
async fn test_analyze_route_rejects_non_json_body() {
    let base = start_server(Arc::new(DisabledClient)).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/analyze", base))
        .header("content-type", "text/plain")
        .body("not json at all")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].is_string());
}
