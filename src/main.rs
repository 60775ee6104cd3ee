/// stepwise: workflow and playbook execution server
///
/// Reads configuration from the environment and serves:
/// - Workflow management and runs at /api/workflows/*
/// - Playbook management and runs at /api/playbooks/*
/// - Webhook triggers at /webhook/{workflow_id}
/// - Health check at /healthz

use stepwise::{config::Config, server::start_server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::default();
    start_server(config).await
}
