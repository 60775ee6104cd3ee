/// Core workflow type definitions
///
/// Workflow definitions, their steps and trigger metadata, and the run records
/// produced by executing them. Everything serializes as camelCase JSON, which is
/// both the API contract and the storage format.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Longest accepted schedule interval (one year)
pub const MAX_EVERY_MINUTES: u32 = 525_600;

/// A workflow owned by one user: an ordered step list plus how it gets triggered
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: String,
    /// Owning user; every lookup is scoped to it
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub trigger: WorkflowTrigger,
    /// Execution order is array order
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_run_at: Option<DateTime<Utc>>,
}

/// How a workflow gets started
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowTrigger {
    /// Only started explicitly by its owner
    #[default]
    Manual,
    /// Started by the schedule ticker every `every_minutes`
    Schedule {
        #[serde(rename = "everyMinutes")]
        every_minutes: u32,
    },
    /// Started by a webhook call carrying this secret
    Webhook { secret: String },
}

impl WorkflowTrigger {
    /// When the next scheduled run is due, for schedule triggers only
    pub fn next_run_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            WorkflowTrigger::Schedule { every_minutes } => {
                Some(from + Duration::minutes(i64::from(*every_minutes)))
            }
            _ => None,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            WorkflowTrigger::Manual => "manual",
            WorkflowTrigger::Schedule { .. } => "schedule",
            WorkflowTrigger::Webhook { .. } => "webhook",
        }
    }
}

/// One step of a workflow
///
/// The `type` field of the JSON selects the action; `id` and `label` are shared
/// by every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub action: StepAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Send a prompt to the agent-completion service
    AgentPrompt { prompt: String },
    /// Execute a registered tool with JSON input
    ToolCall {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(default = "empty_object")]
        input: Value,
    },
    /// Suspend this run for a number of milliseconds
    Delay {
        #[serde(rename = "delayMs")]
        delay_ms: u64,
    },
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl StepAction {
    pub fn step_type(&self) -> StepType {
        match self {
            StepAction::AgentPrompt { .. } => StepType::AgentPrompt,
            StepAction::ToolCall { .. } => StepType::ToolCall,
            StepAction::Delay { .. } => StepType::Delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    AgentPrompt,
    ToolCall,
    Delay,
}

/// What started a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    #[default]
    Manual,
    Schedule,
    Webhook,
    /// Step list came from a playbook's workflow template
    Playbook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Done,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Error,
}

/// Outcome of one executed step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRunResult {
    pub step_id: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One execution of a workflow (or of a playbook's workflow template)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: String,
    /// Workflow id, or the playbook id for playbook-driven runs
    pub workflow_id: String,
    pub user_id: String,
    pub trigger_kind: TriggerKind,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
    pub step_results: Vec<StepRunResult>,
}

impl WorkflowRun {
    /// Fresh run record in `running` state with a new id
    pub fn start(workflow_id: &str, user_id: &str, trigger_kind: TriggerKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            user_id: user_id.to_string(),
            trigger_kind,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            step_results: Vec::new(),
        }
    }
}

/// Create/update payload for workflow definitions
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub trigger: WorkflowTrigger,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

fn default_enabled() -> bool {
    true
}

impl WorkflowInput {
    /// Parse a request body, reporting shape problems (unknown step types,
    /// wrong field types) as validation errors
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::Validation(format!("Malformed workflow definition: {}", e)))
    }

    /// Check field constraints and assign missing step ids
    pub fn validate(&mut self) -> Result<()> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(Error::Validation("Workflow name is required".to_string()));
        }

        match &self.trigger {
            WorkflowTrigger::Schedule { every_minutes }
                if !(1..=MAX_EVERY_MINUTES).contains(every_minutes) =>
            {
                return Err(Error::Validation(format!(
                    "Schedule trigger needs everyMinutes between 1 and {}",
                    MAX_EVERY_MINUTES
                )));
            }
            WorkflowTrigger::Webhook { secret } if secret.trim().is_empty() => {
                return Err(Error::Validation(
                    "Webhook trigger needs a non-empty secret".to_string(),
                ));
            }
            _ => {}
        }

        normalize_steps(&mut self.steps)
    }
}

/// Validate step fields, fill in missing ids and reject duplicate ids
///
/// Shared by workflow definitions and playbook workflow templates.
pub fn normalize_steps(steps: &mut [WorkflowStep]) -> Result<()> {
    let mut seen = HashSet::new();

    for (index, step) in steps.iter_mut().enumerate() {
        match &step.action {
            StepAction::AgentPrompt { prompt } if prompt.trim().is_empty() => {
                return Err(Error::Validation(format!(
                    "Step {} (agent_prompt) has an empty prompt",
                    index + 1
                )));
            }
            StepAction::ToolCall { tool_name, .. } if tool_name.trim().is_empty() => {
                return Err(Error::Validation(format!(
                    "Step {} (tool_call) has an empty toolName",
                    index + 1
                )));
            }
            _ => {}
        }

        if step.id.trim().is_empty() {
            step.id = uuid::Uuid::new_v4().to_string();
        }
        if !seen.insert(step.id.clone()) {
            return Err(Error::Validation(format!("Duplicate step id: {}", step.id)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn steps_parse_from_tagged_json() {
        let steps: Vec<WorkflowStep> = serde_json::from_value(json!([
            { "id": "s1", "label": "Ask", "type": "agent_prompt", "prompt": "Summarize" },
            { "type": "tool_call", "toolName": "echo", "input": { "x": 1 } },
            { "type": "delay", "delayMs": 10 }
        ]))
        .unwrap();

        assert_eq!(steps[0].id, "s1");
        assert_eq!(
            steps[0].action,
            StepAction::AgentPrompt { prompt: "Summarize".to_string() }
        );
        assert_eq!(steps[1].action.step_type(), StepType::ToolCall);
        assert_eq!(steps[1].label, "");
        assert_eq!(steps[2].action, StepAction::Delay { delay_ms: 10 });
    }

    #[test]
    fn tool_call_input_defaults_to_empty_object() {
        let step: WorkflowStep =
            serde_json::from_value(json!({ "type": "tool_call", "toolName": "echo" })).unwrap();
        match step.action {
            StepAction::ToolCall { input, .. } => assert_eq!(input, json!({})),
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn step_serializes_with_type_tag() {
        let step = WorkflowStep {
            id: "d".to_string(),
            label: "Pause".to_string(),
            action: StepAction::Delay { delay_ms: 5 },
        };
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value, json!({ "id": "d", "label": "Pause", "type": "delay", "delayMs": 5 }));
    }

    #[test]
    fn unknown_step_type_is_a_validation_error() {
        let err = WorkflowInput::from_json(json!({
            "name": "bad",
            "steps": [{ "type": "teleport" }]
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn trigger_parses_by_kind() {
        let trigger: WorkflowTrigger =
            serde_json::from_value(json!({ "kind": "schedule", "everyMinutes": 15 })).unwrap();
        assert_eq!(trigger, WorkflowTrigger::Schedule { every_minutes: 15 });

        let trigger: WorkflowTrigger =
            serde_json::from_value(json!({ "kind": "webhook", "secret": "s3cret" })).unwrap();
        assert_eq!(trigger.kind_str(), "webhook");
    }

    #[test]
    fn next_run_only_for_schedules() {
        let now = Utc::now();
        let schedule = WorkflowTrigger::Schedule { every_minutes: 5 };
        assert_eq!(schedule.next_run_after(now), Some(now + Duration::minutes(5)));
        assert_eq!(WorkflowTrigger::Manual.next_run_after(now), None);
    }

    #[test]
    fn validate_assigns_ids_and_rejects_bad_triggers() {
        let mut input = WorkflowInput::from_json(json!({
            "name": "  demo  ",
            "steps": [{ "type": "delay", "delayMs": 1 }, { "type": "delay", "delayMs": 2 }]
        }))
        .unwrap();
        input.validate().unwrap();
        assert_eq!(input.name, "demo");
        assert!(input.enabled);
        assert!(!input.steps[0].id.is_empty());
        assert_ne!(input.steps[0].id, input.steps[1].id);

        let mut zero = WorkflowInput::from_json(json!({
            "name": "tick",
            "trigger": { "kind": "schedule", "everyMinutes": 0 }
        }))
        .unwrap();
        assert!(matches!(zero.validate(), Err(Error::Validation(_))));

        let mut endless = WorkflowInput::from_json(json!({
            "name": "tick",
            "trigger": { "kind": "schedule", "everyMinutes": u32::MAX }
        }))
        .unwrap();
        assert!(matches!(endless.validate(), Err(Error::Validation(_))));

        let mut open = WorkflowInput::from_json(json!({
            "name": "hook",
            "trigger": { "kind": "webhook", "secret": " " }
        }))
        .unwrap();
        assert!(matches!(open.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn duplicate_step_ids_are_rejected() {
        let mut steps: Vec<WorkflowStep> = serde_json::from_value(json!([
            { "id": "a", "type": "delay", "delayMs": 1 },
            { "id": "a", "type": "delay", "delayMs": 1 }
        ]))
        .unwrap();
        assert!(matches!(normalize_steps(&mut steps), Err(Error::Validation(_))));
    }

    #[test]
    fn new_runs_have_distinct_ids() {
        let a = WorkflowRun::start("wf", "u1", TriggerKind::Manual);
        let b = WorkflowRun::start("wf", "u1", TriggerKind::Manual);
        assert_ne!(a.id, b.id);
        assert_eq!(a.status, RunStatus::Running);
        assert!(a.step_results.is_empty());
    }
}
