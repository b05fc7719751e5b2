use async_trait::async_trait;
use chrono::Duration;

use crate::error::Result;
use crate::task::{DocumentType, TaskStatus, TranslationTask};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryTaskStore;
pub use postgres::PgTaskStore;

/// Persistence seam for translation task records.
///
/// The producer owns creation and the PENDING -> CANCELED transition (via
/// [`cancel_all`](TaskStore::cancel_all), called from the service layer); the
/// worker owns IN_PROGRESS -> COMPLETED/FAILED. Records are never deleted;
/// they remain as the audit and idempotency trail.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new task record. The producer calls this before publishing
    /// the queue message, so a crashed publish leaves a visible PENDING row
    /// instead of a message with no record.
    async fn create(&self, task: &TranslationTask) -> Result<()>;

    async fn get(&self, task_id: &str) -> Result<Option<TranslationTask>>;

    /// Writes `status` (and the optional error message) and bumps
    /// `updated_at`. Errors if the task does not exist.
    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()>;

    /// Marks every PENDING or IN_PROGRESS task for the document as CANCELED.
    /// Terminal tasks are left untouched. Returns the number of tasks
    /// canceled.
    async fn cancel_all(&self, document_id: &str, document_type: DocumentType) -> Result<u64>;

    /// Point-in-time cancellation check used by the worker. A missing record
    /// reads as not-canceled; the worker treats absence separately.
    async fn is_canceled(&self, task_id: &str) -> Result<bool> {
        Ok(self
            .get(task_id)
            .await?
            .map(|task| task.status == TaskStatus::Canceled)
            .unwrap_or(false))
    }

    /// Tasks still PENDING or IN_PROGRESS whose last update is older than
    /// `older_than`. Feeds the sweeper that requeues orphaned work.
    async fn find_stale(&self, older_than: Duration) -> Result<Vec<TranslationTask>>;
}
