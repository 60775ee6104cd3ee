/// Playbook CRUD and run entry points

use crate::error::{Error, Result};
use crate::playbook::{
    storage::PlaybookStorage,
    types::{PlaybookDefinition, PlaybookInput, PlaybookRun},
};
use crate::runtime::playbook::PlaybookRunner;
use crate::runtime::runner::RunRecorder;
use crate::workflow::service::{DEFAULT_RUN_LIMIT, MAX_RUN_LIMIT};
use crate::workflow::types::WorkflowRun;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Clone)]
pub struct PlaybookService {
    storage: PlaybookStorage,
    runner: Arc<PlaybookRunner>,
}

/// Persists step progress of a workflow-target run into its playbook run record
struct PlaybookProgress<'a> {
    storage: &'a PlaybookStorage,
    run: &'a PlaybookRun,
}

#[async_trait]
impl<'a> RunRecorder for PlaybookProgress<'a> {
    async fn record(&self, embedded: &WorkflowRun) -> anyhow::Result<()> {
        let mut snapshot = self.run.clone();
        snapshot.step_results = embedded.step_results.clone();
        self.storage.save_run(&snapshot).await?;
        Ok(())
    }
}

impl PlaybookService {
    pub fn new(storage: PlaybookStorage, runner: Arc<PlaybookRunner>) -> Self {
        Self { storage, runner }
    }

    pub async fn create(&self, user_id: &str, mut input: PlaybookInput) -> Result<PlaybookDefinition> {
        input.validate()?;
        let now = Utc::now();

        let playbook = PlaybookDefinition {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: input.name,
            description: input.description,
            enabled: input.enabled,
            target_kind: input.target_kind,
            prompt_template: input.prompt_template,
            workflow_template: input.workflow_template,
            parameter_schema: input.parameter_schema,
            created_at: now,
            updated_at: now,
            last_run_at: None,
        };

        self.storage.save_playbook(&playbook).await?;
        tracing::info!("📋 Created playbook {} ({}) for user {}", playbook.id, playbook.name, user_id);
        Ok(playbook)
    }

    pub async fn update(&self, user_id: &str, id: &str, mut input: PlaybookInput) -> Result<PlaybookDefinition> {
        input.validate()?;
        let mut playbook = self.get(user_id, id).await?;

        playbook.name = input.name;
        playbook.description = input.description;
        playbook.enabled = input.enabled;
        playbook.target_kind = input.target_kind;
        playbook.prompt_template = input.prompt_template;
        playbook.workflow_template = input.workflow_template;
        playbook.parameter_schema = input.parameter_schema;
        playbook.updated_at = Utc::now();

        self.storage.save_playbook(&playbook).await?;
        tracing::info!("🔥 Updated playbook {} ({})", playbook.id, playbook.name);
        Ok(playbook)
    }

    pub async fn remove(&self, user_id: &str, id: &str) -> Result<()> {
        if self.storage.delete_playbook(user_id, id).await? {
            tracing::info!("🗑️ Deleted playbook {}", id);
            Ok(())
        } else {
            Err(Error::NotFound(format!("Playbook {}", id)))
        }
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<PlaybookDefinition> {
        self.storage
            .get_playbook(user_id, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Playbook {}", id)))
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<PlaybookDefinition>> {
        self.storage.list_playbooks(user_id).await
    }

    /// Run a playbook with the supplied parameter values
    ///
    /// Disabled playbooks and parameter problems are rejected before a run
    /// record exists.
    pub async fn run(&self, user_id: &str, id: &str, parameters: Map<String, Value>) -> Result<PlaybookRun> {
        let playbook = self.get(user_id, id).await?;
        if !playbook.enabled {
            return Err(Error::Validation(format!("Playbook {} is disabled", playbook.id)));
        }

        let prepared = PlaybookRunner::prepare(&playbook, &parameters)?;
        self.storage.save_run(&prepared).await?;

        let progress = PlaybookProgress {
            storage: &self.storage,
            run: &prepared,
        };
        let run = self
            .runner
            .execute(prepared.clone(), &playbook, &progress)
            .await;

        self.storage.save_run(&run).await?;
        if let Some(finished_at) = run.finished_at {
            self.storage.set_last_run_at(&playbook.id, finished_at).await?;
        }

        Ok(run)
    }

    pub async fn list_runs(&self, user_id: &str, id: &str, limit: Option<u32>) -> Result<Vec<PlaybookRun>> {
        self.get(user_id, id).await?;
        let limit = limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);
        self.storage.list_runs(user_id, id, limit).await
    }

    pub async fn get_run(&self, user_id: &str, id: &str, run_id: &str) -> Result<PlaybookRun> {
        self.storage
            .get_run(user_id, id, run_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Run {}", run_id)))
    }
}
