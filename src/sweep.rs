use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{error, info, warn};

use crate::config::SweepConfig;
use crate::error::Result;
use crate::metrics::STALE_TASKS_REQUEUED_TOTAL;
use crate::queue::TaskPublisher;
use crate::store::TaskStore;
use crate::task::{TaskMessage, TaskStatus};

/// Requeues tasks stuck in PENDING or IN_PROGRESS for longer than
/// `older_than`: the record is reset to PENDING first (same record-then-
/// publish ordering as the producer), then its message is republished.
///
/// Covers the two failure modes the pipeline itself cannot see: a producer
/// that wrote the record but died before publishing, and a worker that died
/// mid-task. A task canceled or finished between the query and the reset is
/// skipped by the worker's own status checks, so requeuing here is safe.
pub async fn requeue_stale_tasks(
    store: &dyn TaskStore,
    publisher: &dyn TaskPublisher,
    older_than: Duration,
) -> Result<u64> {
    let stale = store.find_stale(older_than).await?;
    if stale.is_empty() {
        return Ok(0);
    }
    info!(count = stale.len(), "Requeuing stale translation tasks");

    let mut requeued = 0u64;
    for task in stale {
        if let Err(e) = store
            .update_status(&task.task_id, TaskStatus::Pending, None)
            .await
        {
            warn!(task_id = %task.task_id, error = %e, "Failed to reset stale task, skipping");
            continue;
        }
        let message = TaskMessage::from(&task);
        match publisher.publish(&message).await {
            Ok(()) => {
                STALE_TASKS_REQUEUED_TOTAL.inc();
                requeued += 1;
            }
            Err(e) => {
                // Still PENDING; the next sweep picks it up again.
                warn!(task_id = %task.task_id, error = %e, "Failed to republish stale task");
            }
        }
    }
    Ok(requeued)
}

/// Periodic sweep loop, spawned by the worker binary when configured.
pub async fn run_sweeper(
    store: Arc<dyn TaskStore>,
    publisher: Arc<dyn TaskPublisher>,
    config: SweepConfig,
) {
    let older_than = Duration::seconds(config.stale_after_secs as i64);
    let mut interval = tokio::time::interval(StdDuration::from_secs(config.interval_secs));
    info!(
        interval_secs = config.interval_secs,
        stale_after_secs = config.stale_after_secs,
        "Stale-task sweeper running"
    );

    loop {
        interval.tick().await;
        match requeue_stale_tasks(store.as_ref(), publisher.as_ref(), older_than).await {
            Ok(0) => {}
            Ok(requeued) => info!(requeued, "Sweep requeued stale tasks"),
            Err(e) => error!(error = %e, "Stale-task sweep failed"),
        }
    }
}
