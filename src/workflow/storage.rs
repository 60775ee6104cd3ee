/// SQLite persistence layer for workflow storage
///
/// Handles workflow definition CRUD and run records. Definitions and runs are
/// stored as JSON documents alongside indexed lookup columns; every query is
/// scoped by the owning user id except the webhook lookup and the schedule scan.

use crate::db::sortable_timestamp;
use crate::error::Result;
use crate::runtime::runner::RunRecorder;
use crate::workflow::types::{WorkflowDefinition, WorkflowRun};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

/// SQLite-based workflow storage manager
#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    /// SQLite connection pool
    pool: SqlitePool,
}

impl WorkflowStorage {
    /// Create new storage instance with database connection
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a new workflow or update existing one
    ///
    /// Uses UPSERT to handle both create and update operations atomically.
    pub async fn save_workflow(&self, workflow: &WorkflowDefinition) -> Result<()> {
        let definition_json = serde_json::to_string(workflow)?;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, user_id, name, enabled, trigger_kind, next_run_at, definition, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                enabled = excluded.enabled,
                trigger_kind = excluded.trigger_kind,
                next_run_at = excluded.next_run_at,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&workflow.id)
        .bind(&workflow.user_id)
        .bind(&workflow.name)
        .bind(workflow.enabled)
        .bind(workflow.trigger.kind_str())
        .bind(workflow.next_run_at.as_ref().map(sortable_timestamp))
        .bind(&definition_json)
        .bind(sortable_timestamp(&workflow.created_at))
        .bind(sortable_timestamp(&workflow.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Retrieve a workflow owned by `user_id`
    pub async fn get_workflow(&self, user_id: &str, id: &str) -> Result<Option<WorkflowDefinition>> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_definition(&row)).transpose()
    }

    /// Retrieve a workflow regardless of owner (webhook entry point)
    pub async fn get_workflow_by_id(&self, id: &str) -> Result<Option<WorkflowDefinition>> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_definition(&row)).transpose()
    }

    /// List a user's workflows, most recently updated first
    pub async fn list_workflows(&self, user_id: &str) -> Result<Vec<WorkflowDefinition>> {
        let rows = sqlx::query(
            "SELECT definition FROM workflows WHERE user_id = ? ORDER BY updated_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_definition).collect()
    }

    /// Delete a workflow and its run history
    pub async fn delete_workflow(&self, user_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM workflow_runs WHERE workflow_id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }

    /// Enabled schedule workflows whose next run is due at `now`
    pub async fn list_due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<WorkflowDefinition>> {
        let rows = sqlx::query(
            r#"
            SELECT definition FROM workflows
            WHERE trigger_kind = 'schedule' AND enabled = 1
              AND next_run_at IS NOT NULL AND next_run_at <= ?
            ORDER BY next_run_at ASC
            "#,
        )
        .bind(sortable_timestamp(&now))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_definition).collect()
    }

    /// Overwrite `nextRunAt` (last write wins)
    pub async fn set_next_run_at(&self, id: &str, next_run_at: Option<DateTime<Utc>>) -> Result<()> {
        let ts = next_run_at.as_ref().map(sortable_timestamp);
        sqlx::query(
            "UPDATE workflows SET next_run_at = ?, definition = json_set(definition, '$.nextRunAt', ?) WHERE id = ?",
        )
        .bind(&ts)
        .bind(&ts)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Overwrite `lastRunAt` (last write wins)
    pub async fn set_last_run_at(&self, id: &str, last_run_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE workflows SET definition = json_set(definition, '$.lastRunAt', ?) WHERE id = ?")
            .bind(sortable_timestamp(&last_run_at))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert or replace a run record
    ///
    /// Nothing is written once the owning workflow is gone, so a run still in
    /// flight during a delete leaves no orphaned rows behind.
    pub async fn save_run(&self, run: &WorkflowRun) -> Result<()> {
        let data = serde_json::to_string(run)?;

        let result = sqlx::query(
            r#"
            INSERT INTO workflow_runs (id, workflow_id, user_id, status, started_at, data)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM workflows WHERE id = ? AND user_id = ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                data = excluded.data
            "#,
        )
        .bind(&run.id)
        .bind(&run.workflow_id)
        .bind(&run.user_id)
        .bind(run.status.as_str())
        .bind(sortable_timestamp(&run.started_at))
        .bind(&data)
        .bind(&run.workflow_id)
        .bind(&run.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("🗑️ Dropped progress of run {}: workflow {} is gone", run.id, run.workflow_id);
        }

        Ok(())
    }

    pub async fn get_run(&self, user_id: &str, workflow_id: &str, run_id: &str) -> Result<Option<WorkflowRun>> {
        let row = sqlx::query(
            "SELECT data FROM workflow_runs WHERE id = ? AND workflow_id = ? AND user_id = ?",
        )
        .bind(run_id)
        .bind(workflow_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| decode_run(&row)).transpose()
    }

    /// Newest runs of one workflow
    pub async fn list_runs(&self, user_id: &str, workflow_id: &str, limit: u32) -> Result<Vec<WorkflowRun>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM workflow_runs
            WHERE workflow_id = ? AND user_id = ?
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(workflow_id)
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(decode_run).collect()
    }
}

#[async_trait]
impl RunRecorder for WorkflowStorage {
    async fn record(&self, run: &WorkflowRun) -> anyhow::Result<()> {
        self.save_run(run).await?;
        Ok(())
    }
}

fn decode_definition(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowDefinition> {
    let definition_json: String = row.try_get("definition")?;
    Ok(serde_json::from_str(&definition_json)?)
}

fn decode_run(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowRun> {
    let data: String = row.try_get("data")?;
    Ok(serde_json::from_str(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::workflow::types::{RunStatus, TriggerKind, WorkflowTrigger, MAX_EVERY_MINUTES};
    use chrono::Duration;

    async fn storage() -> WorkflowStorage {
        let db = Database::in_memory().await.unwrap();
        WorkflowStorage::new(db.pool().clone())
    }

    fn definition(id: &str, user_id: &str, trigger: WorkflowTrigger) -> WorkflowDefinition {
        let now = Utc::now();
        WorkflowDefinition {
            id: id.to_string(),
            user_id: user_id.to_string(),
            name: format!("workflow {}", id),
            description: String::new(),
            enabled: true,
            next_run_at: trigger.next_run_after(now),
            trigger,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
            last_run_at: None,
        }
    }

    #[tokio::test]
    async fn lookups_are_scoped_to_owner() {
        let storage = storage().await;
        storage
            .save_workflow(&definition("wf-1", "alice", WorkflowTrigger::Manual))
            .await
            .unwrap();

        assert!(storage.get_workflow("alice", "wf-1").await.unwrap().is_some());
        assert!(storage.get_workflow("bob", "wf-1").await.unwrap().is_none());
        assert!(storage.get_workflow_by_id("wf-1").await.unwrap().is_some());
        assert_eq!(storage.list_workflows("alice").await.unwrap().len(), 1);
        assert!(storage.list_workflows("bob").await.unwrap().is_empty());

        assert!(!storage.delete_workflow("bob", "wf-1").await.unwrap());
        assert!(storage.delete_workflow("alice", "wf-1").await.unwrap());
        assert!(storage.get_workflow("alice", "wf-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn timestamps_update_in_place() {
        let storage = storage().await;
        let wf = definition("wf-1", "alice", WorkflowTrigger::Manual);
        storage.save_workflow(&wf).await.unwrap();

        let finished = Utc::now();
        storage.set_last_run_at("wf-1", finished).await.unwrap();
        let next = finished + Duration::minutes(10);
        storage.set_next_run_at("wf-1", Some(next)).await.unwrap();

        let loaded = storage.get_workflow("alice", "wf-1").await.unwrap().unwrap();
        assert_eq!(
            loaded.last_run_at.map(|t| t.timestamp_micros()),
            Some(finished.timestamp_micros())
        );
        assert_eq!(
            loaded.next_run_at.map(|t| t.timestamp_micros()),
            Some(next.timestamp_micros())
        );

        storage.set_next_run_at("wf-1", None).await.unwrap();
        let loaded = storage.get_workflow("alice", "wf-1").await.unwrap().unwrap();
        assert!(loaded.next_run_at.is_none());
    }

    #[tokio::test]
    async fn due_scan_only_returns_enabled_due_schedules() {
        let storage = storage().await;
        let now = Utc::now();

        let mut due = definition("due", "alice", WorkflowTrigger::Schedule { every_minutes: 5 });
        due.next_run_at = Some(now - Duration::minutes(1));
        storage.save_workflow(&due).await.unwrap();

        let mut later = definition("later", "alice", WorkflowTrigger::Schedule { every_minutes: 5 });
        later.next_run_at = Some(now + Duration::minutes(4));
        storage.save_workflow(&later).await.unwrap();

        let mut disabled = definition("off", "alice", WorkflowTrigger::Schedule { every_minutes: 5 });
        disabled.enabled = false;
        disabled.next_run_at = Some(now - Duration::minutes(1));
        storage.save_workflow(&disabled).await.unwrap();

        storage
            .save_workflow(&definition("manual", "alice", WorkflowTrigger::Manual))
            .await
            .unwrap();

        let found: Vec<String> = storage
            .list_due_schedules(now)
            .await
            .unwrap()
            .into_iter()
            .map(|wf| wf.id)
            .collect();
        assert_eq!(found, vec!["due"]);
    }

    #[tokio::test]
    async fn longest_schedule_is_not_due() {
        let storage = storage().await;
        let now = Utc::now();

        let yearly = definition(
            "yearly",
            "alice",
            WorkflowTrigger::Schedule { every_minutes: MAX_EVERY_MINUTES },
        );
        storage.save_workflow(&yearly).await.unwrap();

        assert!(storage.list_due_schedules(now).await.unwrap().is_empty());
        assert!(storage
            .list_due_schedules(now + Duration::minutes(1))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn runs_list_newest_first_with_limit() {
        let storage = storage().await;
        storage
            .save_workflow(&definition("wf-1", "alice", WorkflowTrigger::Manual))
            .await
            .unwrap();
        let mut ids = Vec::new();
        for offset in 0..3 {
            let mut run = WorkflowRun::start("wf-1", "alice", TriggerKind::Manual);
            run.started_at = Utc::now() + Duration::seconds(offset);
            run.status = RunStatus::Done;
            storage.save_run(&run).await.unwrap();
            ids.push(run.id);
        }

        let runs = storage.list_runs("alice", "wf-1", 2).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, ids[2]);
        assert_eq!(runs[1].id, ids[1]);

        assert!(storage.list_runs("bob", "wf-1", 10).await.unwrap().is_empty());
        assert!(storage.get_run("alice", "wf-1", &ids[0]).await.unwrap().is_some());
        assert!(storage.get_run("alice", "wf-2", &ids[0]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recorder_upserts_progress() {
        let storage = storage().await;
        storage
            .save_workflow(&definition("wf-1", "alice", WorkflowTrigger::Manual))
            .await
            .unwrap();
        let mut run = WorkflowRun::start("wf-1", "alice", TriggerKind::Manual);
        storage.record(&run).await.unwrap();

        run.status = RunStatus::Error;
        run.error = Some("boom".to_string());
        storage.record(&run).await.unwrap();

        let runs = storage.list_runs("alice", "wf-1", 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Error);
        assert_eq!(runs[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn progress_after_delete_leaves_no_rows() {
        let storage = storage().await;
        storage
            .save_workflow(&definition("wf-1", "alice", WorkflowTrigger::Manual))
            .await
            .unwrap();

        let mut run = WorkflowRun::start("wf-1", "alice", TriggerKind::Manual);
        storage.record(&run).await.unwrap();
        assert!(storage.delete_workflow("alice", "wf-1").await.unwrap());

        run.status = RunStatus::Done;
        storage.record(&run).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM workflow_runs")
            .fetch_one(&storage.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
