/// Agent-completion collaborator
///
/// `agent_prompt` steps and prompt playbooks hand their rendered prompt to an
/// `AgentCompletion` implementation. The production implementation talks to a
/// completion service over HTTP; failures are folded into the reply so callers
/// only ever deal with `{ text, error? }`.

use crate::config::AgentConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reply from the completion service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentReply {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait AgentCompletion: Send + Sync {
    async fn complete(&self, prompt: &str) -> AgentReply;
}

/// Build the collaborator described by the configuration
pub fn agent_from_config(config: &AgentConfig) -> std::sync::Arc<dyn AgentCompletion> {
    match &config.completion_url {
        Some(url) => std::sync::Arc::new(HttpAgentClient::new(
            url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )),
        None => {
            tracing::warn!("⚠️ No agent completion endpoint configured; agent_prompt steps will fail");
            std::sync::Arc::new(UnconfiguredAgent)
        }
    }
}

/// HTTP client for a completion service speaking `{prompt}` -> `{text, error?}`
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    client: reqwest::Client,
    completion_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
}

impl HttpAgentClient {
    pub fn new(completion_url: String, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            completion_url,
            api_key,
        }
    }
}

#[async_trait]
impl AgentCompletion for HttpAgentClient {
    async fn complete(&self, prompt: &str) -> AgentReply {
        tracing::debug!("🤖 Calling agent completion: {} ({} chars)", self.completion_url, prompt.len());

        let mut request = self
            .client
            .post(&self.completion_url)
            .json(&CompletionRequest { prompt });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("❌ Agent completion request failed: {}", e);
                return AgentReply::failure(format!("Agent request failed: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("❌ Agent completion returned {}: {}", status, body);
            return AgentReply::failure(format!(
                "Agent service returned {}: {}",
                status.as_u16(),
                body.trim()
            ));
        }

        match response.json::<AgentReply>().await {
            Ok(reply) => reply,
            Err(e) => AgentReply::failure(format!("Invalid agent response: {}", e)),
        }
    }
}

/// Stand-in used when no completion endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredAgent;

#[async_trait]
impl AgentCompletion for UnconfiguredAgent {
    async fn complete(&self, _prompt: &str) -> AgentReply {
        AgentReply::failure("Agent completion service is not configured (set STEPWISE_AGENT_URL)")
    }
}
