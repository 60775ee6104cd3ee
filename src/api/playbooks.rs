/// Playbook management REST API endpoints

use crate::api::{auth::UserId, parse_json_body, workflows::RunsQuery, AppState};
use crate::error::{Error, Result};
use crate::playbook::types::{PlaybookDefinition, PlaybookInput, PlaybookRun};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Default, Deserialize)]
struct RunPlaybookRequest {
    #[serde(default)]
    parameters: Map<String, Value>,
}

pub fn create_playbook_routes() -> Router<AppState> {
    Router::new()
        .route("/api/playbooks", post(create_playbook).get(list_playbooks))
        .route(
            "/api/playbooks/{id}",
            get(get_playbook).put(update_playbook).delete(delete_playbook),
        )
        .route("/api/playbooks/{id}/run", post(run_playbook))
        .route("/api/playbooks/{id}/runs", get(list_runs))
        .route("/api/playbooks/{id}/runs/{run_id}", get(get_run))
}

async fn create_playbook(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    body: String,
) -> Result<(StatusCode, Json<PlaybookDefinition>)> {
    let input = PlaybookInput::from_json(parse_json_body(&body)?)?;
    let playbook = state.playbooks.create(&user_id, input).await?;
    Ok((StatusCode::CREATED, Json(playbook)))
}

async fn list_playbooks(State(state): State<AppState>, UserId(user_id): UserId) -> Result<Json<Value>> {
    let playbooks = state.playbooks.list(&user_id).await?;
    Ok(Json(json!({ "playbooks": playbooks })))
}

async fn get_playbook(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<PlaybookDefinition>> {
    Ok(Json(state.playbooks.get(&user_id, &id).await?))
}

async fn update_playbook(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<PlaybookDefinition>> {
    let input = PlaybookInput::from_json(parse_json_body(&body)?)?;
    Ok(Json(state.playbooks.update(&user_id, &id, input).await?))
}

async fn delete_playbook(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.playbooks.remove(&user_id, &id).await?;
    Ok(Json(json!({ "message": "Playbook deleted successfully" })))
}

/// POST /api/playbooks/{id}/run with `{ "parameters": { ... } }`
async fn run_playbook(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    body: String,
) -> Result<Json<PlaybookRun>> {
    let request: RunPlaybookRequest = if body.trim().is_empty() {
        RunPlaybookRequest::default()
    } else {
        serde_json::from_value(parse_json_body(&body)?)
            .map_err(|e| Error::Validation(format!("Malformed run request: {}", e)))?
    };

    Ok(Json(state.playbooks.run(&user_id, &id, request.parameters).await?))
}

async fn list_runs(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(id): Path<String>,
    query: std::result::Result<Query<RunsQuery>, QueryRejection>,
) -> Result<Json<Value>> {
    let runs = state.playbooks.list_runs(&user_id, &id, RunsQuery::limit(query)?).await?;
    Ok(Json(json!({ "runs": runs })))
}

async fn get_run(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path((id, run_id)): Path<(String, String)>,
) -> Result<Json<PlaybookRun>> {
    Ok(Json(state.playbooks.get_run(&user_id, &id, &run_id).await?))
}
