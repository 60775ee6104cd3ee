/// Sequential step runner
///
/// Executes a copied step list for one run: in array order, one step at a time,
/// stopping at the first failure. There are no retries and no rollback of the
/// side effects of steps that already completed.

use crate::runtime::{agent::AgentCompletion, tools::ToolRegistry};
use crate::workflow::types::{
    RunStatus, StepAction, StepRunResult, StepStatus, WorkflowRun, WorkflowStep,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::{sync::Arc, time::Duration};

/// Receives the run record after it starts and after every appended step result
#[async_trait]
pub trait RunRecorder: Send + Sync {
    async fn record(&self, run: &WorkflowRun) -> anyhow::Result<()>;
}

/// Recorder for runs nobody needs to observe mid-flight
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

#[async_trait]
impl RunRecorder for NoopRecorder {
    async fn record(&self, _run: &WorkflowRun) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Runs workflow steps against injected agent and tool collaborators
///
/// Holds no per-workflow state: concurrent runs of the same definition are
/// independent and the caller decides whether to allow them.
pub struct WorkflowStepRunner {
    agent: Arc<dyn AgentCompletion>,
    tools: Arc<ToolRegistry>,
}

/// What a single step produced before it is stamped into a `StepRunResult`
enum StepOutcome {
    Done(String),
    Failed(String),
}

impl WorkflowStepRunner {
    pub fn new(agent: Arc<dyn AgentCompletion>, tools: Arc<ToolRegistry>) -> Self {
        Self { agent, tools }
    }

    /// Execute `steps` for `run` and return the terminal run record
    ///
    /// Step failures never escape as errors: they end the run with
    /// `status = error` and the failing step's message as the run error.
    pub async fn execute(
        &self,
        mut run: WorkflowRun,
        steps: &[WorkflowStep],
        recorder: &dyn RunRecorder,
    ) -> WorkflowRun {
        let run_start = std::time::Instant::now();
        tracing::info!(
            "🚀 Starting run {} for {} ({} steps, trigger: {:?})",
            run.id,
            run.workflow_id,
            steps.len(),
            run.trigger_kind
        );

        run.status = RunStatus::Running;
        run.step_results.clear();
        Self::record(recorder, &run).await;

        for (index, step) in steps.iter().enumerate() {
            let started_at = Utc::now();
            let step_start = std::time::Instant::now();

            let outcome = self.execute_step(step, &run.user_id).await;

            let (status, output, error) = match outcome {
                StepOutcome::Done(output) => (StepStatus::Done, Some(output), None),
                StepOutcome::Failed(error) => (StepStatus::Error, None, Some(error)),
            };

            match &error {
                None => tracing::info!(
                    "✅ Step {}/{} ({}) done in {:?}",
                    index + 1,
                    steps.len(),
                    step.id,
                    step_start.elapsed()
                ),
                Some(e) => tracing::warn!(
                    "❌ Step {}/{} ({}) failed in {:?}: {}",
                    index + 1,
                    steps.len(),
                    step.id,
                    step_start.elapsed(),
                    e
                ),
            }

            run.step_results.push(StepRunResult {
                step_id: step.id.clone(),
                step_type: step.action.step_type(),
                status,
                started_at,
                finished_at: Utc::now(),
                output,
                error: error.clone(),
            });

            if let Some(message) = error {
                run.status = RunStatus::Error;
                run.error = Some(message);
                break;
            }

            Self::record(recorder, &run).await;
        }

        if run.status == RunStatus::Running {
            run.status = RunStatus::Done;
        }
        run.finished_at = Some(Utc::now());
        Self::record(recorder, &run).await;

        tracing::info!(
            "🏁 Run {} finished with status {} after {:?} ({} of {} steps executed)",
            run.id,
            run.status.as_str(),
            run_start.elapsed(),
            run.step_results.len(),
            steps.len()
        );

        run
    }

    async fn execute_step(&self, step: &WorkflowStep, user_id: &str) -> StepOutcome {
        match &step.action {
            StepAction::AgentPrompt { prompt } => {
                let reply = self.agent.complete(prompt).await;
                match reply.error {
                    Some(error) => StepOutcome::Failed(error),
                    None => StepOutcome::Done(reply.text),
                }
            }
            StepAction::ToolCall { tool_name, input } => {
                let result = self.tools.execute(tool_name, input, user_id).await;
                if result.success {
                    StepOutcome::Done(stringify_output(&result.output))
                } else {
                    StepOutcome::Failed(
                        result
                            .error
                            .unwrap_or_else(|| format!("Tool {} failed", tool_name)),
                    )
                }
            }
            StepAction::Delay { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                StepOutcome::Done(format!("waited {}ms", delay_ms))
            }
        }
    }

    async fn record(recorder: &dyn RunRecorder, run: &WorkflowRun) {
        if let Err(e) = recorder.record(run).await {
            tracing::warn!("⚠️ Failed to record progress of run {}: {}", run.id, e);
        }
    }
}

/// Strings verbatim, everything else as compact JSON
pub fn stringify_output(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
