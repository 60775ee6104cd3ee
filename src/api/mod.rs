/// HTTP API Layer
///
/// REST endpoints for workflow and playbook management plus the webhook
/// trigger. Handlers are thin: they extract the caller, parse the body and
/// delegate to the services, letting `Error` render the failure response.

// Caller identity and API token middleware
pub mod auth;

// Workflow management endpoints
pub mod workflows;

// Playbook management endpoints
pub mod playbooks;

// Webhook trigger endpoint
pub mod webhooks;

use crate::error::{Error, Result};
use crate::playbook::service::PlaybookService;
use crate::workflow::service::WorkflowService;
use serde_json::Value;

pub use playbooks::create_playbook_routes;
pub use webhooks::create_webhook_routes;
pub use workflows::create_workflow_routes;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub workflows: WorkflowService,
    pub playbooks: PlaybookService,
}

/// Parse a request body as JSON, reporting syntax errors as validation failures
pub(crate) fn parse_json_body(body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| Error::Validation(format!("Invalid JSON body: {}", e)))
}
