use std::sync::Arc;

use futures::future::try_join_all;
use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use lapin::Consumer;
use tracing::{debug, error, info, warn};

use crate::documents::{DocumentStore, TranslationUpdate};
use crate::error::{Result, TaskError};
use crate::language::Language;
use crate::localized::LocalizedValue;
use crate::metrics::{
    ACTIVE_PROCESSING_TASKS, TASKS_COMPLETED_TOTAL, TASKS_DROPPED_TOTAL, TASKS_FAILED_TOTAL,
    TASK_DESERIALIZATION_ERRORS_TOTAL, TASK_PROCESSING_DURATION_SECONDS,
};
use crate::provider::TranslationProvider;
use crate::store::TaskStore;
use crate::task::{TaskMessage, TaskStatus};

/// Everything the per-message handler needs, injected so tests can run it
/// against in-memory fakes.
#[derive(Clone)]
pub struct WorkerContext {
    pub tasks: Arc<dyn TaskStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub provider: Arc<dyn TranslationProvider>,
}

/// Why a delivery was acknowledged without doing any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The body did not parse as a task message.
    MalformedMessage,
    /// No task record for the message's id; the record is the source of
    /// truth, so there is nothing to do.
    UnknownTask,
    /// The service layer canceled the task before we picked it up.
    Canceled,
    /// Redelivery of a task that already reached COMPLETED or FAILED.
    AlreadyFinished,
}

/// What the consume loop should do with the delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Translations written, task COMPLETED. Ack.
    Completed,
    /// Nothing done, nothing to retry. Ack.
    Dropped(DropReason),
    /// Task marked FAILED with this message. Nack without requeue; failed
    /// translations are terminal and manually inspectable, not retried.
    Failed(String),
}

/// Handles one delivered message end to end.
///
/// The CANCELED check runs once, here, before the task is marked
/// IN_PROGRESS. A cancellation that lands after this point loses the race
/// and the stale translation is still written; that window is accepted
/// behavior, not something to close with locking.
pub async fn handle_task_message(data: &[u8], ctx: &WorkerContext) -> TaskOutcome {
    let message = match serde_json::from_slice::<TaskMessage>(data) {
        Ok(message) => message,
        Err(e) => {
            error!(
                error = %e,
                payload = %String::from_utf8_lossy(data),
                "Failed to deserialize task message"
            );
            TASK_DESERIALIZATION_ERRORS_TOTAL.inc();
            return TaskOutcome::Dropped(DropReason::MalformedMessage);
        }
    };

    let record = match ctx.tasks.get(&message.task_id).await {
        Ok(record) => record,
        Err(e) => {
            error!(task_id = %message.task_id, error = %e, "Failed to load task record");
            return TaskOutcome::Failed(e.to_string());
        }
    };

    let Some(record) = record else {
        warn!(task_id = %message.task_id, "No record for delivered task, dropping");
        TASKS_DROPPED_TOTAL.inc();
        return TaskOutcome::Dropped(DropReason::UnknownTask);
    };

    if record.status == TaskStatus::Canceled {
        info!(task_id = %message.task_id, "Task was canceled before processing, dropping");
        TASKS_DROPPED_TOTAL.inc();
        return TaskOutcome::Dropped(DropReason::Canceled);
    }

    // At-least-once delivery: a redelivered message for a task that already
    // finished must not hit the provider or the document again.
    if record.status.is_terminal() {
        info!(
            task_id = %message.task_id,
            status = %record.status,
            "Task already finished, dropping redelivery"
        );
        TASKS_DROPPED_TOTAL.inc();
        return TaskOutcome::Dropped(DropReason::AlreadyFinished);
    }

    if let Err(e) = ctx
        .tasks
        .update_status(&message.task_id, TaskStatus::InProgress, None)
        .await
    {
        error!(task_id = %message.task_id, error = %e, "Failed to mark task IN_PROGRESS");
        return TaskOutcome::Failed(e.to_string());
    }

    match translate_document(&message, ctx).await {
        Ok(()) => {
            if let Err(e) = ctx
                .tasks
                .update_status(&message.task_id, TaskStatus::Completed, None)
                .await
            {
                error!(task_id = %message.task_id, error = %e, "Failed to mark task COMPLETED");
                return TaskOutcome::Failed(e.to_string());
            }
            info!(task_id = %message.task_id, "Translation task completed");
            TASKS_COMPLETED_TOTAL.inc();
            TaskOutcome::Completed
        }
        Err(e) => {
            let reason = e.to_string();
            error!(task_id = %message.task_id, error = %reason, "Translation task failed");
            TASKS_FAILED_TOTAL.inc();
            // Best effort: the nack is what keeps the message from looping.
            if let Err(store_err) = ctx
                .tasks
                .update_status(&message.task_id, TaskStatus::Failed, Some(reason.clone()))
                .await
            {
                error!(task_id = %message.task_id, error = %store_err, "Failed to record task failure");
            }
            TaskOutcome::Failed(reason)
        }
    }
}

/// Fetches the document, translates every requested field into every target
/// language and applies the accumulated key-level update.
async fn translate_document(message: &TaskMessage, ctx: &WorkerContext) -> Result<()> {
    let fields = ctx
        .documents
        .localized_fields(
            message.document_type,
            &message.document_id,
            &message.fields_to_translate,
        )
        .await?;

    let mut update = TranslationUpdate::new();
    for field in &message.fields_to_translate {
        let Some(map) = fields.get(field) else {
            debug!(field = %field, "Field absent on document, skipping");
            continue;
        };
        let Some(source_value) = map.get(message.source_language.code()) else {
            debug!(field = %field, "No source-language entry, nothing to translate");
            continue;
        };
        if source_value.is_empty() {
            debug!(field = %field, "Source-language entry is empty, skipping");
            continue;
        }

        // The source entry is written back unchanged alongside the targets.
        update.set(field, message.source_language, source_value.clone());

        let translated = translate_value(
            ctx.provider.as_ref(),
            source_value,
            message.source_language,
            &message.target_languages,
        )
        .await?;
        for (language, value) in translated {
            update.set(field, language, value);
        }
    }

    if update.is_empty() {
        debug!(task_id = %message.task_id, "No translatable content found");
        return Ok(());
    }

    ctx.documents
        .apply_translations(message.document_type, &message.document_id, &update)
        .await
}

/// Translates one value into each target language. Target languages are
/// independent, so their provider calls run concurrently; list entries are
/// translated element by element and reassembled in order.
async fn translate_value(
    provider: &dyn TranslationProvider,
    value: &LocalizedValue,
    source: Language,
    targets: &[Language],
) -> Result<Vec<(Language, LocalizedValue)>> {
    let per_target = targets.iter().map(|&target| async move {
        let translated = match value {
            LocalizedValue::Text(text) => {
                LocalizedValue::Text(provider.translate(text, source, target).await?)
            }
            LocalizedValue::Lines(lines) => {
                let per_line = lines.iter().map(|line| provider.translate(line, source, target));
                LocalizedValue::Lines(try_join_all(per_line).await?)
            }
        };
        Ok::<_, TaskError>((target, translated))
    });
    try_join_all(per_target).await
}

/// The worker's consume loop: one message at a time, ack on completion or
/// drop, nack without requeue on failure. Errors never escape a single
/// message's handling; only a broken consumer stream ends the loop.
pub async fn run_worker(mut consumer: Consumer, ctx: WorkerContext) -> Result<()> {
    info!("Worker started consuming tasks. Waiting for messages...");

    while let Some(delivery_result) = consumer.next().await {
        match delivery_result {
            Ok(delivery) => {
                ACTIVE_PROCESSING_TASKS.inc();
                let processing_timer = TASK_PROCESSING_DURATION_SECONDS.start_timer();

                let outcome = handle_task_message(&delivery.data, &ctx).await;

                match &outcome {
                    TaskOutcome::Completed | TaskOutcome::Dropped(_) => {
                        if let Err(ack_err) = delivery.ack(BasicAckOptions::default()).await {
                            error!(error = %ack_err, "Failed to ack task message");
                        }
                    }
                    TaskOutcome::Failed(_) => {
                        // One-shot task: reject without requeue.
                        let nack = BasicNackOptions {
                            requeue: false,
                            ..Default::default()
                        };
                        if let Err(nack_err) = delivery.nack(nack).await {
                            error!(error = %nack_err, "Failed to nack task message");
                        }
                    }
                }

                processing_timer.observe_duration();
                ACTIVE_PROCESSING_TASKS.dec();
            }
            Err(e) => {
                error!(error = %e, "Error receiving task message from consumer stream. Worker will stop.");
                return Err(TaskError::QueueError(format!(
                    "consumer stream error: {}",
                    e
                )));
            }
        }
    }

    info!("Consumer stream ended.");
    Ok(())
}
