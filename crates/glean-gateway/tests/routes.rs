#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use glean_core::{Capability, StrategyRegistry, TaskId, TaskRequest, WorkerId};
use glean_gateway::{AuthConfig, GatewayServer, RateLimiter};
use glean_memory::{InMemoryResultStore, LocalEmbedding};
use glean_orchestrator::{Orchestrator, OrchestratorConfig, PoolSizes};
use glean_workers::{AnalyzeExecutor, Worker};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn orchestrator() -> Arc<Orchestrator> {
    Arc::new(
        Orchestrator::new(
            OrchestratorConfig {
                pool_sizes: PoolSizes {
                    search: 0,
                    extract: 0,
                    analyze: 1,
                },
                idle_poll_interval_ms: 10,
                ..Default::default()
            },
            Arc::new(StrategyRegistry::default()),
            Arc::new(InMemoryResultStore::new()),
            Arc::new(LocalEmbedding::default()),
        )
        .unwrap()
        .with_executor(Arc::new(Worker::Analyze(AnalyzeExecutor::local()))),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
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
async fn submit_then_status() {
    let app = GatewayServer::build(orchestrator());

    let (status, body) = send(
        &app,
        post_json(
            "/tasks",
            json!({"capability": "analyze", "parameters": {"text": "Hello there."}, "priority": 90}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["task_id"].as_str().unwrap().to_string();

    let (status, view) = send(&app, get(&format!("/tasks/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["id"], id.as_str());
    assert_eq!(view["capability"], "analyze");
    assert_eq!(view["state"], "pending");
    assert_eq!(view["attempt_count"], 0);
}

#[tokio::test]
async fn invalid_submissions_are_400() {
    let app = GatewayServer::build(orchestrator());

    let (status, body) = send(
        &app,
        post_json("/tasks", json!({"capability": "extract", "parameters": {"url": "ftp://x"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_task");

    let (status, body) = send(&app, post_json("/tasks", json!({"capability": "teleport"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_task");
}

#[tokio::test]
async fn unknown_task_is_404() {
    let app = GatewayServer::build(orchestrator());

    let (status, body) = send(&app, get(&format!("/tasks/{}", TaskId::new()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");

    let (status, _) = send(&app, get("/tasks/not-a-uuid")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        post_json(&format!("/tasks/{}/cancel", TaskId::new()), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cancel_pending_task() {
    let orch = orchestrator();
    let app = GatewayServer::build(orch.clone());
    let id = orch
        .submit(TaskRequest::from_json(Capability::Analyze, json!({"text": "later"})))
        .unwrap();

    let (status, body) = send(&app, post_json(&format!("/tasks/{id}/cancel"), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);

    let (_, view) = send(&app, get(&format!("/tasks/{id}"))).await;
    assert_eq!(view["state"], "abandoned");
    assert_eq!(view["abandon_reason"], "cancelled");

    let (_, body) = send(&app, post_json(&format!("/tasks/{id}/cancel"), json!({}))).await;
    assert_eq!(body["accepted"], false);
}

#[tokio::test]
async fn bulk_returns_per_item_results() {
    let app = GatewayServer::build(orchestrator());

    let (status, body) = send(
        &app,
        post_json(
            "/tasks:bulk",
            json!({"tasks": [
                {"capability": "search", "parameters": {"query": "axum"}},
                {"capability": "search", "parameters": {}},
                {"capability": "nope"},
                {"capability": "analyze", "parameters": {"text": "ok"}}
            ]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 4);
    assert!(results[0]["task_id"].is_string());
    assert_eq!(results[1]["error"]["kind"], "invalid_task");
    assert_eq!(results[2]["error"]["kind"], "invalid_task");
    assert!(results[3]["task_id"].is_string());
}

#[tokio::test]
async fn metrics_and_health() {
    let orch = orchestrator();
    orch.register_worker(WorkerId::named("ext-1"), Capability::Search);
    orch.submit(TaskRequest::from_json(Capability::Search, json!({"query": "q"})))
        .unwrap();
    let app = GatewayServer::build(orch);

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capabilities"]["search"]["current_queue_depth"], 1);
    assert_eq!(body["capabilities"]["analyze"]["tasks_completed"], 0);
    assert_eq!(body["workers"][0]["id"], "ext-1");

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "glean");
}

#[tokio::test]
async fn auth_rejects_missing_and_wrong_keys() {
    let app = GatewayServer::build_with_middleware(
        orchestrator(),
        None,
        AuthConfig::new(vec!["secret".into()]),
    );

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "unauthorized");

    let wrong = Request::builder()
        .uri("/health")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, wrong).await.0, StatusCode::UNAUTHORIZED);

    let right = Request::builder()
        .uri("/health")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, right).await.0, StatusCode::OK);
    assert_eq!(send(&app, get("/health?api_key=secret")).await.0, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_applies_per_key() {
    let app = GatewayServer::build_with_middleware(
        orchestrator(),
        Some(Arc::new(RateLimiter::new(2.0, 0.01))),
        AuthConfig::new(vec!["alpha".into(), "beta".into()]),
    );

    assert_eq!(send(&app, get("/health?api_key=alpha")).await.0, StatusCode::OK);
    assert_eq!(send(&app, get("/health?api_key=alpha")).await.0, StatusCode::OK);
    let (status, body) = send(&app, get("/health?api_key=alpha")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["kind"], "rate_limited");

    assert_eq!(send(&app, get("/health?api_key=beta")).await.0, StatusCode::OK);

    let response = app.clone().oneshot(get("/health?api_key=alpha")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=3600).contains(&retry_after));
}

#[tokio::test]
async fn rotating_keys_share_anonymous_bucket() {
    let app = GatewayServer::build_with_middleware(
        orchestrator(),
        Some(Arc::new(RateLimiter::new(1.0, 0.01))),
        AuthConfig::default(),
    );

    let mut accepted = 0;
    for i in 0..50 {
        if send(&app, get(&format!("/health?api_key=rot{i}"))).await.0 == StatusCode::OK {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(send(&app, get("/health")).await.0, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn served_task_runs_to_completion() {
    let orch = orchestrator();
    orch.start().unwrap();
    let app = GatewayServer::build(orch.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/tasks"))
        .json(&json!({
            "capability": "analyze",
            "parameters": {"text": "Rust is fast. Rust is safe.", "analysis_type": "keywords"}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let id = resp.json::<Value>().await.unwrap()["task_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut view = Value::Null;
    for _ in 0..200 {
        view = client
            .get(format!("http://{addr}/tasks/{id}"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if view["state"] == "succeeded" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(view["state"], "succeeded");
    assert_eq!(view["attempt_count"], 1);
    assert!(view["last_outcome"]["quality_score"].as_f64().unwrap() > 0.0);

    orch.shutdown().await;
}
