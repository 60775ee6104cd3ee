/// SQLite connection management
///
/// A single database file holds every tenant's records; isolation is enforced by
/// keying every query on the owning user id. Definitions and runs are stored as
/// JSON documents next to the indexed columns used for lookups.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;

/// Owner of the connection pool and schema
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database file and initialize the schema
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("Failed to create data directory '{}': {}", parent.display(), e)
            })?;
        }

        tracing::info!("🗄️ Opening database: {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Private in-memory database
    ///
    /// Every connection to `sqlite::memory:` is a separate database, so the pool
    /// is pinned to one connection that never expires.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes (safe to call repeatedly)
    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                enabled INTEGER NOT NULL,
                trigger_kind TEXT NOT NULL,
                next_run_at TEXT,
                definition JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_runs (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                data JSON NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS playbooks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                definition JSON NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS playbook_runs (
                id TEXT PRIMARY KEY,
                playbook_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                data JSON NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes for tenant listings, run history and the schedule scan
        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_workflows_user ON workflows(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_workflows_due ON workflows(trigger_kind, enabled, next_run_at)",
            "CREATE INDEX IF NOT EXISTS idx_workflow_runs_wf ON workflow_runs(workflow_id, started_at)",
            "CREATE INDEX IF NOT EXISTS idx_playbooks_user ON playbooks(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_playbook_runs_pb ON playbook_runs(playbook_id, started_at)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }
}

/// Timestamp format used in indexed columns
///
/// Fixed-width UTC so lexical order in SQLite equals chronological order.
pub fn sortable_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stepwise.db");

        let db = Database::connect(&path).await.unwrap();
        assert!(path.exists());

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
             ('workflows', 'workflow_runs', 'playbooks', 'playbook_runs')",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(count, 4);

        // Reopening an existing file keeps working
        Database::connect(&path).await.unwrap();
    }

    #[test]
    fn sortable_timestamps_order_lexically() {
        let earlier = chrono::Utc::now();
        let later = earlier + chrono::Duration::milliseconds(5);
        assert!(sortable_timestamp(&earlier) < sortable_timestamp(&later));
        assert!(sortable_timestamp(&earlier).ends_with('Z'));
    }
}
