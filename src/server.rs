/// Server setup and initialization
///
/// Wires together storage, collaborators, services, the schedule ticker and
/// HTTP routes.

use crate::{
    api::{
        auth::{require_api_token, ApiToken},
        create_playbook_routes, create_webhook_routes, create_workflow_routes, AppState,
    },
    config::Config,
    db::Database,
    playbook::{service::PlaybookService, storage::PlaybookStorage},
    runtime::{
        agent::{agent_from_config, AgentCompletion},
        playbook::PlaybookRunner,
        runner::WorkflowStepRunner,
        scheduler::ScheduleTicker,
        tools::ToolRegistry,
    },
    workflow::{service::WorkflowService, storage::WorkflowStorage},
};
use anyhow::Result;
use axum::{middleware, response::Json, routing::get, Router};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePool;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Router plus the background ticker that must live as long as it
pub struct App {
    pub router: Router,
    pub ticker: Option<Arc<ScheduleTicker>>,
}

/// Build services over one database pool and the given collaborators
pub fn build_state(
    pool: SqlitePool,
    agent: Arc<dyn AgentCompletion>,
    tools: Arc<ToolRegistry>,
) -> (AppState, WorkflowStorage) {
    let workflow_storage = WorkflowStorage::new(pool.clone());
    let step_runner = Arc::new(WorkflowStepRunner::new(Arc::clone(&agent), tools));
    let playbook_runner = Arc::new(PlaybookRunner::new(agent, Arc::clone(&step_runner)));

    let state = AppState {
        workflows: WorkflowService::new(workflow_storage.clone(), step_runner),
        playbooks: PlaybookService::new(PlaybookStorage::new(pool), playbook_runner),
    };

    (state, workflow_storage)
}

/// Assemble the HTTP routes
///
/// `/api/*` sits behind the optional bearer token; `/healthz` and the webhook
/// endpoint do not.
pub fn build_router(state: AppState, api_token: ApiToken) -> Router {
    let api_routes = Router::new()
        .merge(create_workflow_routes())
        .merge(create_playbook_routes())
        .route_layer(middleware::from_fn_with_state(api_token, require_api_token));

    Router::new()
        .route("/healthz", get(health_check))
        .merge(api_routes)
        .merge(create_webhook_routes())
        .with_state(state)
}

/// Create the application from configuration
///
/// Opens the database, builds the collaborators and services, and starts the
/// schedule ticker unless it is disabled.
pub async fn create_app(config: &Config) -> Result<App> {
    let db_path = config.database.database_path();
    tracing::info!("📁 Opening database at {}", db_path.display());
    let db = Database::connect(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;

    let agent = agent_from_config(&config.agent);
    let tools = Arc::new(ToolRegistry::with_builtins(Duration::from_secs(config.agent.timeout_secs)));
    tracing::info!("🧰 Registered tools: {}", tools.names().join(", "));

    let (state, workflow_storage) = build_state(db.pool().clone(), agent, tools);

    let ticker = if config.scheduler.enabled {
        let ticker = Arc::new(
            ScheduleTicker::new(
                workflow_storage,
                state.workflows.clone(),
                config.scheduler.tick_cron.clone(),
            )
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize schedule ticker: {}", e))?,
        );
        ticker.start().await?;
        Some(ticker)
    } else {
        tracing::info!("⏸️ Schedule ticker disabled");
        None
    };

    let router = build_router(state, ApiToken::new(config.api.bearer_token.clone()));
    tracing::info!("✅ Application initialized successfully");

    Ok(App { router, ticker })
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting stepwise server...");

    let app = create_app(&config).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(ticker) = app.ticker {
        ticker.stop().await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown signal received");
}

/// GET /healthz
async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true, "time": chrono::Utc::now().to_rfc3339() }))
}
