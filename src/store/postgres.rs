use std::str::FromStr;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;

use crate::error::Result;
use crate::language::Language;
use crate::store::TaskStore;
use crate::task::{DocumentType, TaskStatus, TranslationTask};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS translation_tasks (
    task_id             TEXT PRIMARY KEY,
    document_type       TEXT NOT NULL,
    document_id         TEXT NOT NULL,
    fields_to_translate TEXT[] NOT NULL,
    source_language     TEXT NOT NULL,
    target_languages    TEXT[] NOT NULL,
    status              TEXT NOT NULL,
    error               TEXT,
    created_at          TIMESTAMPTZ NOT NULL,
    updated_at          TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS translation_tasks_document_idx
    ON translation_tasks (document_id, document_type);
"#;

/// Durable task store over Postgres.
///
/// Explicitly constructed with its own connection lifecycle so the web
/// process and the worker process can each hold a client against the same
/// records; no module-level connection state.
#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(StdDuration::from_secs(30))
            .connect(url)
            .await?;
        info!("Connected task store pool ({} max connections)", max_connections);
        Ok(PgTaskStore { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        PgTaskStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the task table and index if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn codes(languages: &[Language]) -> Vec<String> {
    languages.iter().map(|l| l.code().to_string()).collect()
}

fn row_to_task(row: &PgRow) -> Result<TranslationTask> {
    let source_language: String = row.try_get("source_language")?;
    let target_languages: Vec<String> = row.try_get("target_languages")?;
    let document_type: String = row.try_get("document_type")?;
    let status: String = row.try_get("status")?;

    Ok(TranslationTask {
        task_id: row.try_get("task_id")?,
        document_type: DocumentType::from_str(&document_type)?,
        document_id: row.try_get("document_id")?,
        fields_to_translate: row.try_get("fields_to_translate")?,
        source_language: Language::from_str(&source_language)?,
        target_languages: target_languages
            .iter()
            .map(|code| Language::from_str(code))
            .collect::<std::result::Result<_, _>>()?,
        status: TaskStatus::from_str(&status)?,
        error: row.try_get("error")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn create(&self, task: &TranslationTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO translation_tasks
                (task_id, document_type, document_id, fields_to_translate,
                 source_language, target_languages, status, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&task.task_id)
        .bind(task.document_type.as_str())
        .bind(&task.document_id)
        .bind(&task.fields_to_translate)
        .bind(task.source_language.code())
        .bind(codes(&task.target_languages))
        .bind(task.status.as_str())
        .bind(&task.error)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<TranslationTask>> {
        let row = sqlx::query("SELECT * FROM translation_tasks WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_task).transpose()
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE translation_tasks SET status = $2, error = $3, updated_at = $4 WHERE task_id = $1",
        )
        .bind(task_id)
        .bind(status.as_str())
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(crate::error::TaskError::StoreError(format!(
                "task {} not found",
                task_id
            )));
        }
        Ok(())
    }

    async fn cancel_all(&self, document_id: &str, document_type: DocumentType) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE translation_tasks
            SET status = 'CANCELED', updated_at = $3
            WHERE document_id = $1
              AND document_type = $2
              AND status IN ('PENDING', 'IN_PROGRESS')
            "#,
        )
        .bind(document_id)
        .bind(document_type.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_stale(&self, older_than: Duration) -> Result<Vec<TranslationTask>> {
        let cutoff = Utc::now() - older_than;
        let rows = sqlx::query(
            r#"
            SELECT * FROM translation_tasks
            WHERE status IN ('PENDING', 'IN_PROGRESS') AND updated_at < $1
            ORDER BY updated_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_task).collect()
    }
}
