//! End-to-end controller tests: send, dispatch, retry, auto-naming, and
//! session switching against a mock server.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mindforge_client::api::types::Session;
use mindforge_client::api::ApiClient;
use mindforge_client::controller::{ForgeController, Notice};
use mindforge_client::store::{OrbState, SessionStore, ThinkingPhase};

fn session(id: &str, name: &str) -> Session {
    Session {
        id: id.to_string(),
        name: name.to_string(),
        created_at: "2025-01-01 10:00:00".to_string(),
        updated_at: "2025-01-01 10:00:00".to_string(),
        completion_pct: 0.0,
        status: "active".to_string(),
        niche_type: None,
        current_phase: None,
    }
}

async fn controller_for(server: &MockServer) -> ForgeController {
    let store = Arc::new(SessionStore::new());
    ForgeController::new(ApiClient::new(server.uri()), store)
}

fn sse_body(frames: &[(&str, serde_json::Value)]) -> Vec<u8> {
    let mut body = String::new();
    for (event_type, data) in frames {
        body.push_str(&format!("event: {event_type}\ndata: {data}\n\n"));
    }
    body.into_bytes()
}

async fn mount_message_stream(server: &MockServer, session_id: &str, frames: &[(&str, serde_json::Value)]) {
    Mock::given(method("POST"))
        .and(path(format!("/brainstorm/{session_id}/message")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(frames), "text/event-stream"),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn first_message_scenario_builds_blocks_and_completion() {
    let server = MockServer::start().await;
    mount_message_stream(
        &server,
        "s1",
        &[
            ("status", json!({"status": "thinking"})),
            ("token", json!({"text": "Bak"})),
            ("token", json!({"text": "eries"})),
            ("analysis", json!({"content": "A bakery needs online ordering"})),
            ("completion", json!({"pct": 20})),
        ],
    )
    .await;
    // Auto-naming kicks in after the first message on a placeholder name.
    Mock::given(method("PATCH"))
        .and(path("/sessions/s1"))
        .and(body_json(json!({"name": "Build me a bakery website"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "s1",
            "name": "Build me a bakery website",
            "created_at": "2025-01-01 10:00:00",
            "updated_at": "2025-01-01 10:00:10",
            "completion_pct": 20.0,
            "status": "active"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.set_sessions(vec![session("s1", "Untitled Project")]).await;
    store
        .set_current_session(Some(session("s1", "Untitled Project")))
        .await;

    controller
        .send_message("Build me a bakery website", false, None)
        .await
        .unwrap();

    let blocks = store.thinking_blocks().await;
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].phase, ThinkingPhase::UserMessage);
    assert_eq!(blocks[0].content, "Build me a bakery website");
    assert_eq!(blocks[1].phase, ThinkingPhase::Analysis);

    assert_eq!(store.completion_pct().await, 20.0);
    assert_eq!(store.orb_state().await, OrbState::Idle);
    // The token accumulator was cleared by the analysis block and stream end.
    assert_eq!(store.streaming_text().await, "");
    // Rename round-tripped into the cached session list.
    assert_eq!(
        store.session_name("s1").await.as_deref(),
        Some("Build me a bakery website")
    );

    let history = store.conversation_history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, "user");
}

#[tokio::test]
async fn send_while_thinking_is_a_noop() {
    let server = MockServer::start().await;
    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.set_current_session(Some(session("s1", "Untitled Project"))).await;
    store.set_orb_state(OrbState::Thinking).await;

    controller.send_message("second thought", false, None).await.unwrap();

    // No block appended, no request issued (no mock mounted — a request
    // would have failed and set an error).
    assert!(store.thinking_blocks().await.is_empty());
    assert!(store.last_error().await.is_none());
    assert_eq!(store.orb_state().await, OrbState::Thinking);
}

#[tokio::test]
async fn stream_failure_sets_error_and_retry_resends_once() {
    let server = MockServer::start().await;
    // First attempt fails before any event; the retry succeeds.
    Mock::given(method("POST"))
        .and(path("/brainstorm/s1/message"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_message_stream(
        &server,
        "s1",
        &[
            ("analysis", json!({"content": "Looks like a portfolio site"})),
            ("completion", json!({"pct": 10})),
        ],
    )
    .await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.set_sessions(vec![session("s1", "My Project")]).await;
    store.set_current_session(Some(session("s1", "My Project"))).await;
    let mut notices = controller.subscribe_notices();

    controller
        .send_message("Show my photography portfolio", false, None)
        .await
        .unwrap();

    assert!(store.last_error().await.is_some());
    assert_eq!(store.orb_state().await, OrbState::Idle);
    assert_eq!(store.count_blocks(ThinkingPhase::UserMessage).await, 1);
    assert!(matches!(notices.recv().await.unwrap(), Notice::Error(_)));

    controller.retry().await.unwrap();

    // Net of the resend, exactly one user_message block remains.
    let blocks = store.thinking_blocks().await;
    assert_eq!(store.count_blocks(ThinkingPhase::UserMessage).await, 1);
    assert_eq!(blocks[0].content, "Show my photography portfolio");
    assert_eq!(blocks[1].phase, ThinkingPhase::Analysis);
    assert!(store.last_error().await.is_none());
    assert_eq!(store.completion_pct().await, 10.0);
}

#[tokio::test]
async fn niche_classification_updates_session_and_notifies() {
    let server = MockServer::start().await;
    mount_message_stream(
        &server,
        "s1",
        &[
            ("niche_classified", json!({"niche": "restaurant_food"})),
            ("completion", json!({"pct": 5})),
        ],
    )
    .await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.set_sessions(vec![session("s1", "My Project")]).await;
    store.set_current_session(Some(session("s1", "My Project"))).await;
    let mut notices = controller.subscribe_notices();

    controller.send_message("A cozy ramen shop", false, None).await.unwrap();

    assert_eq!(
        store.current_session().await.unwrap().niche_type.as_deref(),
        Some("restaurant_food")
    );
    match notices.recv().await.unwrap() {
        Notice::Info(message) => assert!(message.contains("restaurant_food")),
        other => panic!("unexpected notice: {other:?}"),
    }
}

#[tokio::test]
async fn whitepaper_update_event_sets_sections_and_block() {
    let server = MockServer::start().await;
    mount_message_stream(
        &server,
        "s1",
        &[(
            "whitepaper_update",
            json!({"core_features": "Online ordering", "design_direction": "Minimalist"}),
        )],
    )
    .await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.set_current_session(Some(session("s1", "My Project"))).await;

    controller.send_message("Add online ordering", false, None).await.unwrap();

    let sections = store.whitepaper_sections().await;
    assert_eq!(sections["core_features"], "Online ordering");
    assert_eq!(sections["design_direction"], "Minimalist");
    let blocks = store.thinking_blocks().await;
    assert_eq!(blocks.last().unwrap().phase, ThinkingPhase::WhitepaperUpdate);
}

#[tokio::test]
async fn select_session_restores_whitepaper_history_and_phase() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whitepaper/s2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s2",
            "sections": {"project_overview": "A bakery storefront"},
            "updated_at": "2025-01-01 10:00:00"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/brainstorm/s2/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s2",
            "turns": [
                {
                    "role": "user",
                    "cleaned_text": "Build me a bakery website",
                    "created_at": "2025-01-01 10:00:00"
                },
                {
                    "role": "assistant",
                    "analysis": "E-commerce with a storefront",
                    "questions": "Do you deliver?",
                    "created_at": "2025-01-01 10:00:05"
                }
            ]
        })))
        .mount(&server)
        .await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();

    let mut selected = session("s2", "Bakery");
    selected.completion_pct = 40.0;
    selected.current_phase = Some(3);
    controller.select_session(selected).await.unwrap();

    assert_eq!(store.completion_pct().await, 40.0);
    let phase = store.phase_info().await.unwrap();
    assert_eq!(phase.current_phase, 3);
    assert_eq!(phase.phase_name, "Structure");

    assert_eq!(
        store.whitepaper_sections().await["project_overview"],
        "A bakery storefront"
    );
    let blocks = store.thinking_blocks().await;
    let phases: Vec<_> = blocks.iter().map(|b| b.phase).collect();
    assert_eq!(
        phases,
        vec![
            ThinkingPhase::UserMessage,
            ThinkingPhase::Analysis,
            ThinkingPhase::Questions
        ]
    );
}

#[tokio::test]
async fn select_session_treats_missing_whitepaper_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/whitepaper/s2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/brainstorm/s2/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "s2",
            "turns": []
        })))
        .mount(&server)
        .await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.update_whitepaper_section("stale", "leftover").await;

    controller.select_session(session("s2", "Bakery")).await.unwrap();

    assert!(store.whitepaper_sections().await.is_empty());
    assert!(store.thinking_blocks().await.is_empty());
    assert!(store.last_error().await.is_none());
}

#[tokio::test]
async fn delete_active_session_clears_state() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deleted"})))
        .mount(&server)
        .await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store
        .set_sessions(vec![session("s1", "Bakery"), session("s2", "Portfolio")])
        .await;
    store.set_current_session(Some(session("s1", "Bakery"))).await;
    store.add_thinking_block(ThinkingPhase::UserMessage, "hello").await;
    store.set_completion_pct(60.0).await;

    controller.delete_session("s1").await.unwrap();

    let sessions = store.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "s2");
    assert!(store.current_session().await.is_none());
    assert!(store.thinking_blocks().await.is_empty());
    assert_eq!(store.completion_pct().await, 0.0);
}

#[tokio::test]
async fn voice_flow_walks_the_orb_state_machine() {
    let server = MockServer::start().await;
    mount_message_stream(&server, "s1", &[("completion", json!({"pct": 5}))]).await;

    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.set_current_session(Some(session("s1", "My Project"))).await;

    assert!(controller.begin_listening().await);
    assert_eq!(store.orb_state().await, OrbState::Listening);
    // Starting capture twice is rejected.
    assert!(!controller.begin_listening().await);

    controller.finish_listening("make it pink").await.unwrap();

    assert_eq!(store.orb_state().await, OrbState::Idle);
    let blocks = store.thinking_blocks().await;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].content, "make it pink");
    let last = store.last_message().await.unwrap();
    assert!(last.is_voice);
    assert_eq!(last.raw_transcript.as_deref(), Some("make it pink"));
}

#[tokio::test]
async fn blank_voice_transcript_returns_to_idle_without_sending() {
    let server = MockServer::start().await;
    let controller = controller_for(&server).await;
    let store = controller.store().clone();
    store.set_current_session(Some(session("s1", "My Project"))).await;

    assert!(controller.begin_listening().await);
    controller.finish_listening("   ").await.unwrap();

    assert_eq!(store.orb_state().await, OrbState::Idle);
    assert!(store.thinking_blocks().await.is_empty());
}
