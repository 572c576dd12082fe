use crate::error::ApiError;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use glean_core::{GleanError, TaskId, TaskRequest, TaskView};
use glean_orchestrator::{MetricsSnapshot, Orchestrator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Shared application state.
pub struct AppState {
    /// The orchestrator behind every route.
    pub orchestrator: Arc<Orchestrator>,
}

/// Response of a successful submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Id of the accepted task.
    pub task_id: TaskId,
}

/// Body of `POST /tasks:bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    /// Raw task requests; each is validated on its own.
    pub tasks: Vec<Value>,
}

/// Response of a cancellation request.
#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    /// `false` when the task had already finished.
    pub accepted: bool,
}

fn invalid_body(rejection: JsonRejection) -> ApiError {
    ApiError::from(GleanError::InvalidTask(rejection.body_text()))
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse::<TaskId>().map_err(ApiError::from)
}

/// `POST /tasks`
pub async fn submit_task(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(invalid_body)?;
    let task_id = state.orchestrator.submit(request)?;
    info!(task_id = %task_id, "Task accepted");
    Ok((StatusCode::CREATED, Json(SubmitResponse { task_id })))
}

/// `GET /tasks/{id}`
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskView>, ApiError> {
    let task_id = parse_task_id(&id)?;
    Ok(Json(state.orchestrator.status(task_id)?))
}

/// `POST /tasks/{id}/cancel`
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let task_id = parse_task_id(&id)?;
    let accepted = state.orchestrator.cancel(task_id)?;
    Ok(Json(CancelResponse { accepted }))
}

/// `POST /tasks:bulk`
///
/// Always answers 200 with one entry per input, in order: `{task_id}` or
/// `{error: {kind, message}}`.
pub async fn submit_bulk(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BulkRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(bulk) = body.map_err(invalid_body)?;

    let mut results: Vec<Option<Value>> = Vec::with_capacity(bulk.tasks.len());
    let mut positions = Vec::new();
    let mut requests = Vec::new();
    for (i, raw) in bulk.tasks.into_iter().enumerate() {
        match serde_json::from_value::<TaskRequest>(raw) {
            Ok(request) => {
                positions.push(i);
                requests.push(request);
                results.push(None);
            }
            Err(e) => {
                let err = GleanError::InvalidTask(format!("malformed task request: {e}"));
                results.push(Some(error_item(&err)));
            }
        }
    }

    for (i, result) in positions
        .into_iter()
        .zip(state.orchestrator.submit_bulk(requests))
    {
        results[i] = Some(match result {
            Ok(task_id) => json!({ "task_id": task_id }),
            Err(err) => error_item(&err),
        });
    }

    Ok(Json(json!({ "results": results })))
}

fn error_item(err: &GleanError) -> Value {
    ApiError::body(&err.kind().to_string(), &err.to_string())
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    Json(state.orchestrator.metrics())
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "glean",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
