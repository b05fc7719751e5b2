use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::error::{Result, TaskError};
use crate::store::TaskStore;
use crate::task::{DocumentType, TaskStatus, TranslationTask};

/// Task store backed by a process-local map.
///
/// Serves tests and single-process embeddings; durable deployments use
/// [`PgTaskStore`](crate::store::PgTaskStore) so cancellation written by the
/// web process is visible to the worker process.
#[derive(Debug, Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, TranslationTask>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, across all statuses.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: &TranslationTask) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.task_id) {
            return Err(TaskError::StoreError(format!(
                "task {} already exists",
                task.task_id
            )));
        }
        tasks.insert(task.task_id.clone(), task.clone());
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<TranslationTask>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        error: Option<String>,
    ) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskError::StoreError(format!("task {} not found", task_id)))?;
        task.status = status;
        task.error = error;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel_all(&self, document_id: &str, document_type: DocumentType) -> Result<u64> {
        let mut tasks = self.tasks.write().await;
        let mut canceled = 0u64;
        for task in tasks.values_mut() {
            if task.document_id == document_id
                && task.document_type == document_type
                && !task.status.is_terminal()
            {
                task.status = TaskStatus::Canceled;
                task.updated_at = Utc::now();
                canceled += 1;
            }
        }
        Ok(canceled)
    }

    async fn find_stale(&self, older_than: Duration) -> Result<Vec<TranslationTask>> {
        let cutoff = Utc::now() - older_than;
        Ok(self
            .tasks
            .read()
            .await
            .values()
            .filter(|task| !task.status.is_terminal() && task.updated_at < cutoff)
            .cloned()
            .collect())
    }
}
