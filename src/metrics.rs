use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_gauge, register_histogram, Counter, Encoder, Gauge, Histogram,
    TextEncoder,
};
use tracing::{error, info};

use crate::error::Result;

// Producer side
pub static TASKS_QUEUED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "producer_translation_tasks_queued_total",
        "Total number of translation tasks queued."
    )
    .expect("Failed to register TASKS_QUEUED_TOTAL counter")
});

pub static TASK_PUBLISH_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "producer_task_publish_errors_total",
        "Total number of publish failures after the task record was written (orphaned PENDING records)."
    )
    .expect("Failed to register TASK_PUBLISH_ERRORS_TOTAL counter")
});

pub static TASKS_CANCELED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "producer_translation_tasks_canceled_total",
        "Total number of tasks canceled because a newer document write superseded them."
    )
    .expect("Failed to register TASKS_CANCELED_TOTAL counter")
});

pub static TASK_PUBLISHING_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "producer_task_publishing_duration_seconds",
        "Histogram of task publishing latencies (from send to broker confirmation)."
    )
    .expect("Failed to register TASK_PUBLISHING_DURATION_SECONDS histogram")
});

// Worker side
pub static TASKS_COMPLETED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_translation_tasks_completed_total",
        "Total number of translation tasks completed by the worker."
    )
    .expect("Failed to register TASKS_COMPLETED_TOTAL counter")
});

pub static TASKS_FAILED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_translation_tasks_failed_total",
        "Total number of translation tasks that ended FAILED."
    )
    .expect("Failed to register TASKS_FAILED_TOTAL counter")
});

pub static TASKS_DROPPED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_translation_tasks_dropped_total",
        "Total number of deliveries dropped without side effects (canceled, unknown or already-terminal tasks)."
    )
    .expect("Failed to register TASKS_DROPPED_TOTAL counter")
});

pub static TASK_DESERIALIZATION_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "worker_task_deserialization_errors_total",
        "Total number of errors deserializing incoming task messages."
    )
    .expect("Failed to register TASK_DESERIALIZATION_ERRORS_TOTAL counter")
});

pub static TASK_PROCESSING_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "worker_task_processing_duration_seconds",
        "Histogram of task processing durations (from message receipt to ack/nack)."
    )
    .expect("Failed to register TASK_PROCESSING_DURATION_SECONDS histogram")
});

pub static ACTIVE_PROCESSING_TASKS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "worker_active_processing_tasks",
        "Number of tasks currently being processed."
    )
    .expect("Failed to register ACTIVE_PROCESSING_TASKS gauge")
});

// Translation provider
pub static PROVIDER_CALLS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "provider_translation_calls_total",
        "Total number of calls to the external translation provider."
    )
    .expect("Failed to register PROVIDER_CALLS_TOTAL counter")
});

pub static PROVIDER_ERRORS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "provider_translation_errors_total",
        "Total number of failed calls to the external translation provider."
    )
    .expect("Failed to register PROVIDER_ERRORS_TOTAL counter")
});

pub static PROVIDER_CALL_DURATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "provider_translation_call_duration_seconds",
        "Histogram of translation provider call latencies."
    )
    .expect("Failed to register PROVIDER_CALL_DURATION_SECONDS histogram")
});

// Sweeper
pub static STALE_TASKS_REQUEUED_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "sweeper_stale_tasks_requeued_total",
        "Total number of stale PENDING/IN_PROGRESS tasks republished by the sweeper."
    )
    .expect("Failed to register STALE_TASKS_REQUEUED_TOTAL counter")
});

async fn metrics_handler() -> (axum::http::StatusCode, String) {
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!("Could not encode prometheus metrics: {}", e);
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not encode prometheus metrics: {}", e),
        );
    }
    match String::from_utf8(buffer) {
        Ok(s) => (axum::http::StatusCode::OK, s),
        Err(e) => {
            error!("Prometheus metrics UTF-8 error: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Prometheus metrics UTF-8 error: {}", e),
            )
        }
    }
}

/// Starts the /metrics endpoint on the given port, if one was configured.
pub async fn setup_metrics_endpoint(port: Option<u16>) -> Result<()> {
    let Some(port) = port else {
        return Ok(());
    };

    let app = axum::Router::new().route("/metrics", axum::routing::get(metrics_handler));
    let listener_addr = format!("0.0.0.0:{}", port);
    info!(
        "Metrics endpoint will be available at http://{}/metrics",
        listener_addr
    );

    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(&listener_addr).await {
            Ok(listener) => {
                if let Err(e) = axum::serve(listener, app).await {
                    error!("Metrics server error: {}", e);
                }
            }
            Err(e) => {
                error!("Failed to bind metrics server to {}: {}", listener_addr, e);
            }
        }
    });

    Ok(())
}
