/// Tool registry
///
/// `tool_call` steps look their tool up by name in an explicit registry that is
/// built once at startup and injected into the step runner.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc, time::Duration};

/// Outcome of a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    /// Name steps refer to in `toolName`
    fn name(&self) -> &str;

    async fn execute(&self, input: &Value, user_id: &str) -> ToolResult;
}

/// Name -> tool map
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in tools
    pub fn with_builtins(http_timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(CurrentTimeTool));
        registry.register(Arc::new(HttpRequestTool::new(http_timeout)));
        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run a tool by name; unknown names are a failed result, not a panic
    pub async fn execute(&self, name: &str, input: &Value, user_id: &str) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.execute(input, user_id).await,
            None => ToolResult::failure(format!("Unknown tool: {}", name)),
        }
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

/// Returns its input unchanged
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, input: &Value, _user_id: &str) -> ToolResult {
        ToolResult::ok(input.clone())
    }
}

/// Current UTC time as RFC 3339
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    async fn execute(&self, _input: &Value, _user_id: &str) -> ToolResult {
        ToolResult::ok(Value::String(chrono::Utc::now().to_rfc3339()))
    }
}

/// Outbound HTTP call
///
/// Input: `{ "url": "...", "method": "GET", "headers": {...}, "body": <json> }`.
/// Output: `{ "status": 200, "body": <json or text> }`. Non-2xx responses fail.
pub struct HttpRequestTool {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HttpRequestInput {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl HttpRequestTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

#[async_trait]
impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    async fn execute(&self, input: &Value, user_id: &str) -> ToolResult {
        let request: HttpRequestInput = match serde_json::from_value(input.clone()) {
            Ok(request) => request,
            Err(e) => return ToolResult::failure(format!("Invalid http_request input: {}", e)),
        };

        let method = match reqwest::Method::from_bytes(request.method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => return ToolResult::failure(format!("Unsupported HTTP method: {}", request.method)),
        };

        tracing::info!("🌐 http_request {} {} (user: {})", method, request.url, user_id);

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return ToolResult::failure(format!("HTTP request failed: {}", e)),
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return ToolResult {
                success: false,
                output: json!({ "status": status.as_u16(), "body": body }),
                error: Some(format!("HTTP request returned status {}", status.as_u16())),
            };
        }

        ToolResult::ok(json!({ "status": status.as_u16(), "body": body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_tool_reports_its_name() {
        let registry = ToolRegistry::new();
        let result = registry.execute("missing_tool", &json!({}), "u1").await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: missing_tool"));
    }

    #[tokio::test]
    async fn echo_returns_input() {
        let registry = ToolRegistry::with_builtins(Duration::from_secs(1));
        let result = registry.execute("echo", &json!({ "a": [1, 2] }), "u1").await;
        assert!(result.success);
        assert_eq!(result.output, json!({ "a": [1, 2] }));
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ToolRegistry::with_builtins(Duration::from_secs(1));
        assert_eq!(registry.names(), vec!["current_time", "echo", "http_request"]);
        assert!(registry.has("echo"));
        assert!(!registry.has("teleport"));
    }

    #[tokio::test]
    async fn http_request_rejects_bad_input() {
        let tool = HttpRequestTool::new(Duration::from_secs(1));
        let result = tool.execute(&json!({ "method": "GET" }), "u1").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Invalid http_request input"));
    }

    #[tokio::test]
    async fn register_replaces_same_name() {
        struct Fixed;

        #[async_trait]
        impl Tool for Fixed {
            fn name(&self) -> &str {
                "echo"
            }

            async fn execute(&self, _input: &Value, _user_id: &str) -> ToolResult {
                ToolResult::ok(json!("fixed"))
            }
        }

        let mut registry = ToolRegistry::with_builtins(Duration::from_secs(1));
        registry.register(Arc::new(Fixed));
        let result = registry.execute("echo", &json!({ "ignored": true }), "u1").await;
        assert_eq!(result.output, json!("fixed"));
    }
}
