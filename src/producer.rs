use std::sync::Arc;

use tracing::{error, info, instrument};

use crate::error::Result;
use crate::language::Language;
use crate::metrics::{
    TASKS_CANCELED_TOTAL, TASKS_QUEUED_TOTAL, TASK_PUBLISHING_DURATION_SECONDS,
    TASK_PUBLISH_ERRORS_TOTAL,
};
use crate::queue::TaskPublisher;
use crate::store::TaskStore;
use crate::task::{DocumentType, TaskMessage, TranslationTask};

/// Registers translation tasks on behalf of the document write services.
///
/// Constructed once per process with its store and publisher injected; the
/// create/update handlers call it inline after their own write has committed.
pub struct TaskProducer {
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn TaskPublisher>,
}

impl TaskProducer {
    pub fn new(store: Arc<dyn TaskStore>, publisher: Arc<dyn TaskPublisher>) -> Self {
        TaskProducer { store, publisher }
    }

    /// Persists a PENDING task record, then publishes the queue message and
    /// awaits broker confirmation. Returns the new task id.
    ///
    /// Target languages are every supported language except the source,
    /// unconditionally, even when a prior task already translated some of
    /// them. The record is written first: if the publish fails afterwards,
    /// the orphaned PENDING record stays visible (and is picked up by the
    /// sweeper where enabled), whereas a message without a record would be
    /// dropped by the worker.
    ///
    /// The document write has already committed when this runs, so callers on
    /// the request path should log a returned error and carry on rather than
    /// failing the request.
    #[instrument(skip(self, fields_to_translate))]
    pub async fn queue_translation_task(
        &self,
        document_type: DocumentType,
        document_id: &str,
        fields_to_translate: Vec<String>,
        source_language: Language,
    ) -> Result<String> {
        let task = TranslationTask::new(
            document_type,
            document_id,
            fields_to_translate,
            source_language,
        );

        self.store.create(&task).await?;

        let message = TaskMessage::from(&task);
        let publish_timer = TASK_PUBLISHING_DURATION_SECONDS.start_timer();
        let published = self.publisher.publish(&message).await;
        publish_timer.observe_duration();

        if let Err(e) = published {
            TASK_PUBLISH_ERRORS_TOTAL.inc();
            error!(
                task_id = %task.task_id,
                error = %e,
                "Failed to publish translation task; PENDING record is orphaned until swept"
            );
            return Err(e);
        }

        TASKS_QUEUED_TOTAL.inc();
        info!(
            task_id = %task.task_id,
            targets = task.target_languages.len(),
            "Queued translation task"
        );
        Ok(task.task_id)
    }

    /// Cancels every live task for the document. Update and delete services
    /// call this before queuing a replacement (or before discarding a deleted
    /// document's pending work) so a stale translation cannot overwrite a
    /// newer edit. Returns the number of tasks canceled.
    pub async fn cancel_active_tasks(
        &self,
        document_id: &str,
        document_type: DocumentType,
    ) -> Result<u64> {
        let canceled = self.store.cancel_all(document_id, document_type).await?;
        if canceled > 0 {
            TASKS_CANCELED_TOTAL.inc_by(canceled as f64);
            info!(
                document_id = %document_id,
                document_type = %document_type,
                canceled,
                "Canceled superseded translation tasks"
            );
        }
        Ok(canceled)
    }

    /// The update-flow convenience: cancel whatever is still live for the
    /// document, then queue the replacement task.
    pub async fn requeue_for_update(
        &self,
        document_type: DocumentType,
        document_id: &str,
        fields_to_translate: Vec<String>,
        source_language: Language,
    ) -> Result<String> {
        self.cancel_active_tasks(document_id, document_type).await?;
        self.queue_translation_task(document_type, document_id, fields_to_translate, source_language)
            .await
    }
}
