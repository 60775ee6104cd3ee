/// SQLite persistence for playbooks and playbook runs

use crate::db::sortable_timestamp;
use crate::error::Result;
use crate::playbook::types::{PlaybookDefinition, PlaybookRun};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

#[derive(Debug, Clone)]
pub struct PlaybookStorage {
    pool: SqlitePool,
}

impl PlaybookStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save_playbook(&self, playbook: &PlaybookDefinition) -> Result<()> {
        let definition_json = serde_json::to_string(playbook)?;

        sqlx::query(
            r#"
            INSERT INTO playbooks (id, user_id, name, definition, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&playbook.id)
        .bind(&playbook.user_id)
        .bind(&playbook.name)
        .bind(&definition_json)
        .bind(sortable_timestamp(&playbook.created_at))
        .bind(sortable_timestamp(&playbook.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_playbook(&self, user_id: &str, id: &str) -> Result<Option<PlaybookDefinition>> {
        let row = sqlx::query("SELECT definition FROM playbooks WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| decode_json(&row, "definition")).transpose()
    }

    pub async fn list_playbooks(&self, user_id: &str) -> Result<Vec<PlaybookDefinition>> {
        let rows = sqlx::query(
            "SELECT definition FROM playbooks WHERE user_id = ? ORDER BY updated_at DESC, rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| decode_json(row, "definition")).collect()
    }

    /// Delete a playbook and its runs
    pub async fn delete_playbook(&self, user_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playbooks WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("DELETE FROM playbook_runs WHERE playbook_id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(true)
    }

    pub async fn set_last_run_at(&self, id: &str, last_run_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE playbooks SET definition = json_set(definition, '$.lastRunAt', ?) WHERE id = ?")
            .bind(sortable_timestamp(&last_run_at))
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Insert or replace a run record while its playbook still exists
    pub async fn save_run(&self, run: &PlaybookRun) -> Result<()> {
        let data = serde_json::to_string(run)?;

        sqlx::query(
            r#"
            INSERT INTO playbook_runs (id, playbook_id, user_id, status, started_at, data)
            SELECT ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM playbooks WHERE id = ? AND user_id = ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                data = excluded.data
            "#,
        )
        .bind(&run.id)
        .bind(&run.playbook_id)
        .bind(&run.user_id)
        .bind(run.status.as_str())
        .bind(sortable_timestamp(&run.started_at))
        .bind(&data)
        .bind(&run.playbook_id)
        .bind(&run.user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_run(&self, user_id: &str, playbook_id: &str, run_id: &str) -> Result<Option<PlaybookRun>> {
        let row = sqlx::query(
            "SELECT data FROM playbook_runs WHERE id = ? AND playbook_id = ? AND user_id = ?",
        )
        .bind(run_id)
        .bind(playbook_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| decode_json(&row, "data")).transpose()
    }

    /// Newest runs of one playbook
    pub async fn list_runs(&self, user_id: &str, playbook_id: &str, limit: u32) -> Result<Vec<PlaybookRun>> {
        let rows = sqlx::query(
            r#"
            SELECT data FROM playbook_runs
            WHERE playbook_id = ? AND user_id = ?
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(playbook_id)
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(|row| decode_json(row, "data")).collect()
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<T> {
    let json: String = row.try_get(column)?;
    Ok(serde_json::from_str(&json)?)
}
