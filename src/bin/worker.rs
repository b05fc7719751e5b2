// src/bin/worker.rs

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use FitLingo::config::worker::Args;
use FitLingo::config::load_worker_config;
use FitLingo::documents::PgDocumentStore;
use FitLingo::error::Result;
use FitLingo::metrics::setup_metrics_endpoint;
use FitLingo::provider::HttpTranslationProvider;
use FitLingo::queue::{connect_rabbitmq, TaskQueue};
use FitLingo::store::PgTaskStore;
use FitLingo::sweep::run_sweeper;
use FitLingo::worker::{run_worker, WorkerContext};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(filter).init();

    setup_metrics_endpoint(args.metrics_port).await?;

    info!("Translation worker starting.");
    info!(
        "Consuming from queue '{}' @ {} (prefetch {})",
        args.task_queue, args.amqp_addr, args.prefetch_count
    );
    info!(
        "Loading worker configuration from: {}",
        args.worker_config.display()
    );

    let config = load_worker_config(&args.worker_config)?;

    // Stores share one pool; both ends of the pipeline see the same records.
    let task_store = PgTaskStore::connect(&args.database_url, 5).await?;
    task_store.ensure_schema().await?;
    let document_store = PgDocumentStore::from_pool(task_store.pool().clone());
    document_store.ensure_schema().await?;

    let provider = HttpTranslationProvider::new(&config.provider)?;

    let conn = connect_rabbitmq(&args.amqp_addr).await?;
    let queue = TaskQueue::open(&conn, &args.task_queue).await?;
    let consumer = queue.consumer(args.prefetch_count, "translation-worker").await?;

    let ctx = WorkerContext {
        tasks: Arc::new(task_store.clone()),
        documents: Arc::new(document_store),
        provider: Arc::new(provider),
    };

    if let Some(sweep_config) = config.sweep.clone() {
        tokio::spawn(run_sweeper(
            Arc::new(task_store.clone()),
            Arc::new(queue.clone()),
            sweep_config,
        ));
    }

    let result = run_worker(consumer, ctx).await;

    info!("Worker stopped consuming tasks.");
    task_store.close().await;
    result
}
