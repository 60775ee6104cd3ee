/// Playbook type definitions
///
/// A playbook is a parameterized prompt or workflow template. Running it
/// substitutes user-supplied values into the template and produces a
/// `PlaybookRun` with the same `running -> done | error` lifecycle as workflow
/// runs.

use crate::error::{Error, Result};
use crate::workflow::types::{normalize_steps, RunStatus, StepRunResult, WorkflowStep};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookDefinition {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub target_kind: TargetKind,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub workflow_template: Option<WorkflowTemplate>,
    /// Declared parameters, in display order
    #[serde(default)]
    pub parameter_schema: Vec<PlaybookParameter>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
}

/// What a playbook run delegates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    AgentPrompt,
    Workflow,
}

/// Embedded step list of a workflow-target playbook
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookParameter {
    /// Name used in `{{key}}` placeholders
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    String,
    Number,
    Boolean,
}

impl ParameterKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParameterKind::String => value.is_string(),
            ParameterKind::Number => value.is_number(),
            ParameterKind::Boolean => value.is_boolean(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
        }
    }
}

/// One execution of a playbook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookRun {
    pub id: String,
    pub playbook_id: String,
    pub user_id: String,
    pub target_kind: TargetKind,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// Parameter values after defaults were applied
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub rendered_prompt: Option<String>,
    #[serde(default)]
    pub output_summary: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Step results of workflow targets; empty for prompt targets
    #[serde(default)]
    pub step_results: Vec<StepRunResult>,
}

/// Create/update payload for playbooks
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybookInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub target_kind: TargetKind,
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default)]
    pub workflow_template: Option<WorkflowTemplate>,
    #[serde(default)]
    pub parameter_schema: Vec<PlaybookParameter>,
}

fn default_enabled() -> bool {
    true
}

impl PlaybookInput {
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Validation(format!("Malformed playbook definition: {}", e)))
    }

    pub fn validate(&mut self) -> Result<()> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(Error::Validation("Playbook name is required".to_string()));
        }

        match self.target_kind {
            TargetKind::AgentPrompt => {
                let has_prompt = self
                    .prompt_template
                    .as_deref()
                    .is_some_and(|t| !t.trim().is_empty());
                if !has_prompt {
                    return Err(Error::Validation(
                        "agent_prompt playbooks need a promptTemplate".to_string(),
                    ));
                }
            }
            TargetKind::Workflow => match self.workflow_template.as_mut() {
                Some(template) if !template.steps.is_empty() => normalize_steps(&mut template.steps)?,
                _ => {
                    return Err(Error::Validation(
                        "workflow playbooks need a workflowTemplate with at least one step".to_string(),
                    ));
                }
            },
        }

        let mut keys = HashSet::new();
        for param in &self.parameter_schema {
            if param.key.is_empty()
                || !param
                    .key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
            {
                return Err(Error::Validation(format!("Invalid parameter key: '{}'", param.key)));
            }
            if !keys.insert(param.key.as_str()) {
                return Err(Error::Validation(format!("Duplicate parameter key: {}", param.key)));
            }
            if let Some(default) = &param.default {
                if !default.is_null() && !param.kind.accepts(default) {
                    return Err(Error::Validation(format!(
                        "Default for parameter '{}' must be a {}",
                        param.key,
                        param.kind.as_str()
                    )));
                }
            }
        }

        Ok(())
    }
}
