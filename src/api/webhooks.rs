/// Webhook trigger endpoint
///
/// `POST /webhook/{workflow_id}` runs a webhook-triggered workflow as its owner.
/// The secret travels in the `X-Webhook-Secret` header or the `secret` query
/// parameter; no user header is involved.

use crate::api::AppState;
use crate::error::Result;
use crate::workflow::types::WorkflowRun;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json,
    routing::post,
    Router,
};
use serde::Deserialize;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Default, Deserialize)]
pub struct WebhookQuery {
    pub secret: Option<String>,
}

pub fn create_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook/{workflow_id}", post(execute_webhook))
}

async fn execute_webhook(
    State(state): State<AppState>,
    Path(workflow_id): Path<String>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
) -> Result<Json<WorkflowRun>> {
    tracing::info!("📥 Webhook request received for workflow {}", workflow_id);

    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or(query.secret)
        .unwrap_or_default();

    let run = state.workflows.trigger_webhook(&workflow_id, &secret).await?;
    tracing::info!(
        "🎉 Webhook run {} for {} ended {}",
        run.id,
        workflow_id,
        run.status.as_str()
    );

    Ok(Json(run))
}
