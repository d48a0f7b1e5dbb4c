//! HTTP surface tests via tower oneshot

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use fns_common::config::TomlConfig;
use fns_common::events::EventBus;
use fns_nn::models::{NaturalizeParameters, NaturalizeRun};
use fns_nn::{build_router, AppState};

use helpers::{seed_record, test_pool, ScriptedClient};

async fn test_state() -> AppState {
    let pool = test_pool().await;
    AppState::new(pool, EventBus::new(64), TomlConfig::default())
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = build_router(test_state().await);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "fns-nn");
}

#[tokio::test]
async fn start_run_rejects_zero_limit() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(post_json("/naturalize/run", r#"{"limit": 0}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn start_run_conflicts_with_open_run() {
    let state = test_state().await;

    // An open (non-terminal) run is already persisted
    let open_run = NaturalizeRun::new(10, None, NaturalizeParameters::default());
    fns_nn::db::runs::save_run(&state.db, &open_run).await.unwrap();

    let app = build_router(state);
    let response = app
        .oneshot(post_json("/naturalize/run", r#"{"limit": 5}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_run_status_is_not_found() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(get(&format!("/naturalize/run/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_run_executes_to_completion_in_background() {
    let state = test_state().await;
    seed_record(&state.db, "Quebec Quarry LLC").await;

    let client = Arc::new(ScriptedClient::new(vec![Ok("1. Quebec Quarry".to_string())]));
    let state = state.with_generation_client(client);
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(post_json(
            "/naturalize/run",
            r#"{"limit": 10, "parameters": {"batch_pacing_ms": 0}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted = body_json(response).await;
    let run_id = accepted["run_id"].as_str().unwrap().to_string();
    assert_eq!(accepted["state"], "STARTED");

    // Poll the status endpoint until the background task finishes
    let mut last_state = String::new();
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(get(&format!("/naturalize/run/{}", run_id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        last_state = status["state"].as_str().unwrap().to_string();
        if last_state == "COMPLETED" {
            assert_eq!(status["stats"]["records_updated"], 1);
            assert_eq!(status["stats"]["api_calls"], 1);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(last_state, "COMPLETED");
}

#[tokio::test]
async fn generation_key_settings_roundtrip() {
    let app = build_router(test_state().await);

    let response = app
        .clone()
        .oneshot(get("/settings/generation-key"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["configured"], false);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/settings/generation-key")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"api_key": "sk-test-key"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/settings/generation-key"))
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["configured"], true);
}

#[tokio::test]
async fn blank_generation_key_is_rejected() {
    let app = build_router(test_state().await);

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/settings/generation-key")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"api_key": "   "}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
