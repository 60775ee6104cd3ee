/// Configuration management for the stepwise engine
///
/// Handles server binding, storage location, API access, the agent-completion
/// endpoint and the schedule ticker. Every value can be overridden through
/// `STEPWISE_*` environment variables for container deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// API access configuration
    pub api: ApiConfig,
    /// Agent-completion collaborator configuration
    pub agent: AgentConfig,
    /// Background schedule ticker configuration
    pub scheduler: SchedulerConfig,
    /// Tracing env-filter directive (e.g. "info", "stepwise=debug")
    pub log_filter: String,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding stepwise.db (default: "data")
    pub data_dir: String,
}

impl DatabaseConfig {
    /// Full path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("stepwise.db")
    }
}

/// API access configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Shared bearer token required on /api/* when set
    pub bearer_token: Option<String>,
}

/// Agent-completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Completion endpoint; no endpoint means agent steps fail with a clear error
    pub completion_url: Option<String>,
    /// Bearer key sent to the completion endpoint
    pub api_key: Option<String>,
    /// Timeout applied to agent and outbound tool HTTP calls
    pub timeout_secs: u64,
}

/// Schedule ticker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first) for the due-schedule scan
    pub tick_cron: String,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("STEPWISE_HOST", "0.0.0.0"),
                port: env_or("STEPWISE_PORT", "3004").parse().unwrap_or(3004),
            },
            database: DatabaseConfig {
                data_dir: env_or("STEPWISE_DATA_DIR", "data"),
            },
            api: ApiConfig {
                bearer_token: env_opt("STEPWISE_API_TOKEN"),
            },
            agent: AgentConfig {
                completion_url: env_opt("STEPWISE_AGENT_URL"),
                api_key: env_opt("STEPWISE_AGENT_API_KEY"),
                timeout_secs: env_or("STEPWISE_AGENT_TIMEOUT_SECS", "120")
                    .parse()
                    .unwrap_or(120),
            },
            scheduler: SchedulerConfig {
                enabled: parse_bool(&env_or("STEPWISE_SCHEDULER_ENABLED", "true")),
                tick_cron: env_or("STEPWISE_SCHEDULER_CRON", "0 * * * * *"),
            },
            log_filter: env_or("STEPWISE_LOG", "info"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank variables are both treated as absent
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
