/// Workflow management REST API endpoints
///
/// CRUD for workflow definitions plus manual runs and run history. Every route
/// is scoped to the caller's `X-User-Id`.

use crate::api::{auth::UserId, parse_json_body, AppState};
use crate::error::{Error, Result};
use crate::workflow::{
    service::RunOptions,
    types::{WorkflowDefinition, WorkflowInput, WorkflowRun},
};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct RunsQuery {
    pub limit: Option<u32>,
}

impl RunsQuery {
    /// Requested limit, with a malformed query string reported as a validation error
    pub(crate) fn limit(query: std::result::Result<Query<Self>, QueryRejection>) -> Result<Option<u32>> {
        let Query(query) = query
            .map_err(|e| Error::Validation(format!("Invalid query string: {}", e.body_text())))?;
        Ok(query.limit)
    }
}

pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/api/workflows", post(create_workflow).get(list_workflows))
        .route(
            "/api/workflows/{id}",
            get(get_workflow).put(update_workflow).delete(delete_workflow),
        )
        .route("/api/workflows/{id}/run", post(run_workflow))
        .route("/api/workflows/{id}/runs", get(list_runs))
        .route("/api/workflows/{id}/runs/{run_id}", get(get_run))
}

/// POST /api/workflows
async fn create_workflow(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    body: String,
) -> Result<(StatusCode, Json<WorkflowDefinition>)> {
    let input = WorkflowInput::from_json(parse_json_body(&body)?)?;
    let workflow = state.workflows.create(&user_id, input).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

/// GET /api/workflows
async fn list_workflows(State(state): State<AppState>, UserId(user_id): UserId) -> Result<Json<Value>> {
    let workflows = state.workflows.list(&user_id).await?;
    Ok(Json(json!({ "workflows": workflows })))
}

/// GET /api/workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<WorkflowDefinition>> {
    Ok(Json(state.workflows.get(&user_id, &id).await?))
}

/// PUT /api/workflows/{id}
async fn update_workflow(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<WorkflowDefinition>> {
    let input = WorkflowInput::from_json(parse_json_body(&body)?)?;
    Ok(Json(state.workflows.update(&user_id, &id, input).await?))
}

/// DELETE /api/workflows/{id}
async fn delete_workflow(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.workflows.remove(&user_id, &id).await?;
    Ok(Json(json!({ "message": "Workflow deleted successfully" })))
}

/// POST /api/workflows/{id}/run
///
/// Body is optional: `{ "triggerKind"?, "webhookSecret"? }`. The response is
/// the finished run record, including runs that ended in `error`.
async fn run_workflow(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<WorkflowRun>> {
    let options: RunOptions = if body.trim().is_empty() {
        RunOptions::default()
    } else {
        serde_json::from_value(parse_json_body(&body)?)
            .map_err(|e| Error::Validation(format!("Malformed run options: {}", e)))?
    };

    Ok(Json(state.workflows.run(&user_id, &id, options).await?))
}

/// GET /api/workflows/{id}/runs?limit=
async fn list_runs(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    query: std::result::Result<Query<RunsQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let runs = state.workflows.list_runs(&user_id, &id, RunsQuery::limit(query)?).await?;
    Ok(Json(json!({ "runs": runs })))
}

/// GET /api/workflows/{id}/runs/{run_id}
async fn get_run(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path((id, run_id)): Path<(String, String)>,
) -> Result<Json<WorkflowRun>> {
    Ok(Json(state.workflows.get_run(&user_id, &id, &run_id).await?))
}
