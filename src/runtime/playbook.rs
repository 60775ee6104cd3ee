/// Playbook runner
///
/// Resolves a playbook's parameters, renders its template and delegates either
/// to the agent collaborator (prompt targets) or to the step runner (workflow
/// targets). Workflow targets reuse the playbook run id for the embedded run.

use crate::error::{Error, Result};
use crate::playbook::template::{
    render_steps, render_template, resolve_parameters, truncate_summary, OUTPUT_SUMMARY_CHARS,
};
use crate::playbook::types::{PlaybookDefinition, PlaybookRun, TargetKind};
use crate::runtime::agent::AgentCompletion;
use crate::runtime::runner::{NoopRecorder, RunRecorder, WorkflowStepRunner};
use crate::workflow::types::{RunStatus, StepStatus, TriggerKind, WorkflowRun};
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

pub struct PlaybookRunner {
    agent: Arc<dyn AgentCompletion>,
    step_runner: Arc<WorkflowStepRunner>,
}

impl PlaybookRunner {
    pub fn new(agent: Arc<dyn AgentCompletion>, step_runner: Arc<WorkflowStepRunner>) -> Self {
        Self { agent, step_runner }
    }

    /// Build the `running` record for a run, or reject the request
    ///
    /// Parameter and template problems surface here, before anything executes.
    pub fn prepare(playbook: &PlaybookDefinition, supplied: &Map<String, Value>) -> Result<PlaybookRun> {
        let parameters = resolve_parameters(&playbook.parameter_schema, supplied)?;

        let rendered_prompt = match playbook.target_kind {
            TargetKind::AgentPrompt => {
                let template = playbook.prompt_template.as_deref().ok_or_else(|| {
                    Error::Validation(format!("Playbook {} has no prompt template", playbook.id))
                })?;
                Some(render_template(template, &parameters))
            }
            TargetKind::Workflow => {
                if playbook.workflow_template.is_none() {
                    return Err(Error::Validation(format!(
                        "Playbook {} has no workflow template",
                        playbook.id
                    )));
                }
                None
            }
        };

        Ok(PlaybookRun {
            id: uuid::Uuid::new_v4().to_string(),
            playbook_id: playbook.id.clone(),
            user_id: playbook.user_id.clone(),
            target_kind: playbook.target_kind,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            parameters,
            rendered_prompt,
            output_summary: None,
            error: None,
            step_results: Vec::new(),
        })
    }

    /// Drive a prepared run to a terminal state
    ///
    /// `recorder` observes the embedded workflow run of workflow targets.
    pub async fn execute(
        &self,
        mut run: PlaybookRun,
        playbook: &PlaybookDefinition,
        recorder: &dyn RunRecorder,
    ) -> PlaybookRun {
        tracing::info!(
            "🚀 Starting playbook run {} for {} (target: {:?})",
            run.id,
            run.playbook_id,
            run.target_kind
        );

        match (run.target_kind, &playbook.workflow_template) {
            (TargetKind::AgentPrompt, _) => {
                let prompt = run.rendered_prompt.clone().unwrap_or_default();
                let reply = self.agent.complete(&prompt).await;
                match reply.error {
                    Some(error) => {
                        run.status = RunStatus::Error;
                        run.error = Some(error);
                    }
                    None => {
                        run.status = RunStatus::Done;
                        run.output_summary = Some(truncate_summary(&reply.text, OUTPUT_SUMMARY_CHARS));
                    }
                }
            }
            (TargetKind::Workflow, Some(template)) => {
                let steps = render_steps(&template.steps, &run.parameters);

                let mut embedded = WorkflowRun::start(&run.playbook_id, &run.user_id, TriggerKind::Playbook);
                embedded.id = run.id.clone();
                embedded.started_at = run.started_at;

                let embedded = self.step_runner.execute(embedded, &steps, recorder).await;

                run.status = embedded.status;
                run.error = embedded.error;
                run.output_summary = embedded
                    .step_results
                    .last()
                    .filter(|result| result.status == StepStatus::Done)
                    .and_then(|result| result.output.as_deref())
                    .map(|output| truncate_summary(output, OUTPUT_SUMMARY_CHARS));
                run.step_results = embedded.step_results;
            }
            (TargetKind::Workflow, None) => {
                run.status = RunStatus::Error;
                run.error = Some(format!("Playbook {} has no workflow template", playbook.id));
            }
        }

        run.finished_at = Some(Utc::now());

        match &run.error {
            None => tracing::info!("✅ Playbook run {} done", run.id),
            Some(e) => tracing::warn!("❌ Playbook run {} failed: {}", run.id, e),
        }

        run
    }

    /// Prepare and execute without observing progress
    pub async fn run(&self, playbook: &PlaybookDefinition, supplied: &Map<String, Value>) -> Result<PlaybookRun> {
        let prepared = Self::prepare(playbook, supplied)?;
        Ok(self.execute(prepared, playbook, &NoopRecorder).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::agent::AgentReply;
    use crate::runtime::tools::ToolRegistry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingAgent {
        prompts: Mutex<Vec<String>>,
        reply: Option<String>,
    }

    #[async_trait]
    impl AgentCompletion for RecordingAgent {
        async fn complete(&self, prompt: &str) -> AgentReply {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.reply {
                Some(text) => AgentReply::text(text.clone()),
                None => AgentReply::failure("agent offline"),
            }
        }
    }

    fn runner(agent: Arc<RecordingAgent>) -> PlaybookRunner {
        let steps = WorkflowStepRunner::new(
            agent.clone(),
            Arc::new(ToolRegistry::with_builtins(Duration::from_secs(1))),
        );
        PlaybookRunner::new(agent, Arc::new(steps))
    }

    fn playbook(value: Value) -> PlaybookDefinition {
        let mut base = json!({
            "id": "pb-1",
            "userId": "alice",
            "name": "brief",
            "enabled": true,
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        });
        base.as_object_mut()
            .unwrap()
            .extend(value.as_object().unwrap().clone());
        serde_json::from_value(base).unwrap()
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn prompt_target_renders_defaults_and_summarizes() {
        let agent = Arc::new(RecordingAgent {
            reply: Some("x".repeat(600)),
            ..Default::default()
        });
        let pb = playbook(json!({
            "targetKind": "agent_prompt",
            "promptTemplate": "Summarize {{topic}} for {{audience}}",
            "parameterSchema": [
                { "key": "topic", "required": true },
                { "key": "audience", "default": "engineers" }
            ]
        }));

        let run = runner(agent.clone())
            .run(&pb, &params(json!({ "topic": "billing" })))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Done);
        assert_eq!(run.rendered_prompt.as_deref(), Some("Summarize billing for engineers"));
        assert_eq!(*agent.prompts.lock().unwrap(), vec!["Summarize billing for engineers"]);
        let summary = run.output_summary.unwrap();
        assert_eq!(summary.chars().count(), OUTPUT_SUMMARY_CHARS + 1);
        assert!(summary.ends_with('…'));
        assert!(run.finished_at.is_some());
    }

    #[tokio::test]
    async fn missing_parameters_reject_before_agent_call() {
        let agent = Arc::new(RecordingAgent::default());
        let pb = playbook(json!({
            "targetKind": "agent_prompt",
            "promptTemplate": "{{a}} {{b}}",
            "parameterSchema": [
                { "key": "a", "required": true },
                { "key": "b", "required": true }
            ]
        }));

        let err = runner(agent.clone()).run(&pb, &Map::new()).await.unwrap_err();
        match err {
            Error::MissingParameters(keys) => assert_eq!(keys, vec!["a", "b"]),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(agent.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn agent_failure_ends_run_in_error() {
        let agent = Arc::new(RecordingAgent::default());
        let pb = playbook(json!({ "targetKind": "agent_prompt", "promptTemplate": "hello" }));

        let run = runner(agent).run(&pb, &Map::new()).await.unwrap();
        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.error.as_deref(), Some("agent offline"));
        assert!(run.output_summary.is_none());
    }

    #[tokio::test]
    async fn workflow_target_runs_rendered_steps() {
        let agent = Arc::new(RecordingAgent {
            reply: Some("researched".to_string()),
            ..Default::default()
        });
        let pb = playbook(json!({
            "targetKind": "workflow",
            "workflowTemplate": { "steps": [
                { "id": "ask", "type": "agent_prompt", "prompt": "Research {{topic}}" },
                { "id": "note", "type": "tool_call", "toolName": "echo", "input": { "topic": "{{topic}}" } }
            ]},
            "parameterSchema": [{ "key": "topic", "required": true }]
        }));

        let run = runner(agent.clone())
            .run(&pb, &params(json!({ "topic": "queues" })))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Done);
        assert!(run.rendered_prompt.is_none());
        assert_eq!(*agent.prompts.lock().unwrap(), vec!["Research queues"]);
        assert_eq!(run.step_results.len(), 2);
        assert_eq!(run.output_summary.as_deref(), Some(r#"{"topic":"queues"}"#));
    }

    #[tokio::test]
    async fn workflow_target_failure_is_mirrored() {
        let agent = Arc::new(RecordingAgent::default());
        let pb = playbook(json!({
            "targetKind": "workflow",
            "workflowTemplate": { "steps": [
                { "id": "wait", "type": "delay", "delayMs": 1 },
                { "id": "call", "type": "tool_call", "toolName": "{{tool}}" }
            ]}
        }));

        let run = runner(agent)
            .run(&pb, &params(json!({ "tool": "missing_tool" })))
            .await
            .unwrap();

        assert_eq!(run.status, RunStatus::Error);
        assert_eq!(run.error.as_deref(), Some("Unknown tool: missing_tool"));
        assert_eq!(run.step_results.len(), 2);
        assert!(run.output_summary.is_none());
    }
}
