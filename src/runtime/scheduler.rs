/// Background schedule ticker
///
/// Uses tokio-cron-scheduler to wake up on a fixed cron expression, then runs
/// every enabled `schedule` workflow whose `nextRunAt` has passed. Each due
/// workflow advances its own `nextRunAt` when its run starts, so a slow run is
/// never picked up twice.

use crate::workflow::{
    service::{RunOptions, WorkflowService},
    storage::WorkflowStorage,
    types::TriggerKind,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::{sync::RwLock, task::JoinSet};
use tokio_cron_scheduler::{Job, JobScheduler};

pub struct ScheduleTicker {
    scheduler: Arc<RwLock<JobScheduler>>,
    storage: WorkflowStorage,
    workflows: WorkflowService,
    tick_cron: String,
}

impl ScheduleTicker {
    pub async fn new(storage: WorkflowStorage, workflows: WorkflowService, tick_cron: String) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler: Arc::new(RwLock::new(scheduler)),
            storage,
            workflows,
            tick_cron,
        })
    }

    /// Register the tick job and start the scheduler
    pub async fn start(&self) -> Result<()> {
        tracing::info!("⏰ Starting schedule ticker ({})", self.tick_cron);

        let storage = self.storage.clone();
        let workflows = self.workflows.clone();

        let job = Job::new_async(self.tick_cron.as_str(), move |_uuid, _l| {
            let storage = storage.clone();
            let workflows = workflows.clone();

            Box::pin(async move {
                match run_due(&storage, &workflows, Utc::now()).await {
                    Ok(0) => tracing::debug!("⏭️ No scheduled workflows due"),
                    Ok(count) => tracing::info!("✅ Ran {} scheduled workflow(s)", count),
                    Err(e) => tracing::error!("❌ Schedule tick failed: {}", e),
                }
            })
        })?;

        {
            let scheduler = self.scheduler.write().await;
            scheduler.add(job).await?;
            scheduler.start().await?;
        }

        tracing::info!("✅ Schedule ticker started");
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        tracing::info!("⏹️ Stopping schedule ticker");
        let mut scheduler = self.scheduler.write().await;
        scheduler.shutdown().await?;
        Ok(())
    }
}

/// Run every schedule workflow due at `now` concurrently and wait for them
///
/// Returns how many runs were started. Rejected or failed runs are logged and
/// do not stop the others.
pub async fn run_due(storage: &WorkflowStorage, workflows: &WorkflowService, now: DateTime<Utc>) -> Result<usize> {
    let due = storage.list_due_schedules(now).await?;
    let mut runs = JoinSet::new();

    for workflow in due {
        let workflows = workflows.clone();
        runs.spawn(async move {
            tracing::info!("🔔 Schedule due for workflow {} ({})", workflow.id, workflow.name);
            let options = RunOptions {
                trigger_kind: Some(TriggerKind::Schedule),
                webhook_secret: None,
            };
            match workflows.run(&workflow.user_id, &workflow.id, options).await {
                Ok(run) => {
                    tracing::info!("🏁 Scheduled run {} of {} ended {}", run.id, workflow.id, run.status.as_str());
                    true
                }
                Err(e) => {
                    tracing::warn!("⚠️ Scheduled run of {} rejected: {}", workflow.id, e);
                    false
                }
            }
        });
    }

    let mut started = 0;
    while let Some(result) = runs.join_next().await {
        match result {
            Ok(true) => started += 1,
            Ok(false) => {}
            Err(e) => tracing::error!("❌ Scheduled run task panicked: {}", e),
        }
    }

    Ok(started)
}
