/// Workflow definition CRUD and run entry points
///
/// Wraps `WorkflowStorage` and the step runner behind the operations the API,
/// the webhook endpoint and the schedule ticker call.

use crate::error::{Error, Result};
use crate::runtime::runner::WorkflowStepRunner;
use crate::workflow::{
    storage::WorkflowStorage,
    types::{TriggerKind, WorkflowDefinition, WorkflowInput, WorkflowRun, WorkflowTrigger},
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Default and maximum number of runs returned by `list_runs`
pub const DEFAULT_RUN_LIMIT: u32 = 20;
pub const MAX_RUN_LIMIT: u32 = 100;

/// Options for starting a run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    /// Defaults to `manual`
    #[serde(default)]
    pub trigger_kind: Option<TriggerKind>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Clone)]
pub struct WorkflowService {
    storage: WorkflowStorage,
    runner: Arc<WorkflowStepRunner>,
}

impl WorkflowService {
    pub fn new(storage: WorkflowStorage, runner: Arc<WorkflowStepRunner>) -> Self {
        Self { storage, runner }
    }

    pub async fn create(&self, user_id: &str, mut input: WorkflowInput) -> Result<WorkflowDefinition> {
        input.validate()?;
        let now = Utc::now();

        let workflow = WorkflowDefinition {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: input.name,
            description: input.description,
            enabled: input.enabled,
            next_run_at: input.trigger.next_run_after(now),
            trigger: input.trigger,
            steps: input.steps,
            created_at: now,
            updated_at: now,
            last_run_at: None,
        };

        self.storage.save_workflow(&workflow).await?;
        tracing::info!("📋 Created workflow {} ({}) for user {}", workflow.id, workflow.name, user_id);
        Ok(workflow)
    }

    /// Replace a definition's editable fields
    ///
    /// The schedule is re-armed only when the trigger itself changes.
    pub async fn update(&self, user_id: &str, id: &str, mut input: WorkflowInput) -> Result<WorkflowDefinition> {
        input.validate()?;
        let mut workflow = self.get(user_id, id).await?;
        let now = Utc::now();

        if workflow.trigger != input.trigger {
            workflow.next_run_at = input.trigger.next_run_after(now);
        }
        workflow.name = input.name;
        workflow.description = input.description;
        workflow.enabled = input.enabled;
        workflow.trigger = input.trigger;
        workflow.steps = input.steps;
        workflow.updated_at = now;

        self.storage.save_workflow(&workflow).await?;
        tracing::info!("🔥 Updated workflow {} ({})", workflow.id, workflow.name);
        Ok(workflow)
    }

    pub async fn remove(&self, user_id: &str, id: &str) -> Result<()> {
        if self.storage.delete_workflow(user_id, id).await? {
            tracing::info!("🗑️ Deleted workflow {}", id);
            Ok(())
        } else {
            Err(Error::NotFound(format!("Workflow {}", id)))
        }
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<WorkflowDefinition> {
        self.storage
            .get_workflow(user_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Workflow {}", id)))
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<WorkflowDefinition>> {
        self.storage.list_workflows(user_id).await
    }

    /// Run a workflow owned by `user_id`
    pub async fn run(&self, user_id: &str, id: &str, options: RunOptions) -> Result<WorkflowRun> {
        let workflow = self.get(user_id, id).await?;
        self.start_run(workflow, options).await
    }

    /// Webhook entry point: resolve the workflow by id alone and run it as its owner
    pub async fn trigger_webhook(&self, id: &str, secret: &str) -> Result<WorkflowRun> {
        let workflow = self
            .storage
            .get_workflow_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Workflow {}", id)))?;

        self.start_run(
            workflow,
            RunOptions {
                trigger_kind: Some(TriggerKind::Webhook),
                webhook_secret: Some(secret.to_string()),
            },
        )
        .await
    }

    pub async fn list_runs(&self, user_id: &str, id: &str, limit: Option<u32>) -> Result<Vec<WorkflowRun>> {
        // Existence check so unknown workflows are 404 rather than an empty list
        self.get(user_id, id).await?;
        let limit = limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);
        self.storage.list_runs(user_id, id, limit).await
    }

    pub async fn get_run(&self, user_id: &str, id: &str, run_id: &str) -> Result<WorkflowRun> {
        self.storage
            .get_run(user_id, id, run_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Run {}", run_id)))
    }

    /// Shared run path for manual, webhook and schedule triggers
    ///
    /// Every rejection happens before the run record is created.
    async fn start_run(&self, workflow: WorkflowDefinition, options: RunOptions) -> Result<WorkflowRun> {
        let trigger_kind = options.trigger_kind.unwrap_or_default();

        match trigger_kind {
            TriggerKind::Webhook => {
                let supplied = options.webhook_secret.as_deref().unwrap_or_default();
                if !webhook_secret_matches(&workflow.trigger, supplied) {
                    tracing::warn!("🚫 Webhook secret mismatch for workflow {}", workflow.id);
                    return Err(Error::WebhookAuth);
                }
                if !workflow.enabled {
                    return Err(Error::Validation(format!("Workflow {} is disabled", workflow.id)));
                }
            }
            TriggerKind::Schedule => {
                if !matches!(workflow.trigger, WorkflowTrigger::Schedule { .. }) {
                    return Err(Error::Validation(format!(
                        "Workflow {} has no schedule trigger",
                        workflow.id
                    )));
                }
                if !workflow.enabled {
                    return Err(Error::Validation(format!("Workflow {} is disabled", workflow.id)));
                }
                let next = workflow.trigger.next_run_after(Utc::now());
                self.storage.set_next_run_at(&workflow.id, next).await?;
            }
            TriggerKind::Playbook => {
                return Err(Error::Validation(
                    "Playbook runs are started through the playbook endpoints".to_string(),
                ));
            }
            TriggerKind::Manual => {}
        }

        // The run works on its own copy of the steps
        let steps = workflow.steps.clone();
        let run = WorkflowRun::start(&workflow.id, &workflow.user_id, trigger_kind);
        let run = self.runner.execute(run, &steps, &self.storage).await;

        if let Some(finished_at) = run.finished_at {
            self.storage.set_last_run_at(&workflow.id, finished_at).await?;
        }

        Ok(run)
    }
}

/// Constant-time comparison against the configured webhook secret
fn webhook_secret_matches(trigger: &WorkflowTrigger, supplied: &str) -> bool {
    match trigger {
        WorkflowTrigger::Webhook { secret } if !secret.is_empty() => {
            secret.as_bytes().ct_eq(supplied.as_bytes()).into()
        }
        _ => false,
    }
}
