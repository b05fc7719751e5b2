use std::time::Duration;

use async_trait::async_trait;
use lapin::{
    options::{
        BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions,
        QueueDeclareOptions,
    },
    protocol::basic::AMQPProperties,
    types::FieldTable,
    Channel, Connection, ConnectionProperties, Consumer,
};
use tokio::time::sleep;
use tracing::{error, info};

use crate::error::{Result, TaskError};
use crate::task::TaskMessage;

/// Connects to RabbitMQ with a bounded retry.
pub async fn connect_rabbitmq(addr: &str) -> Result<Connection> {
    let options = ConnectionProperties::default()
        .with_executor(tokio_executor_trait::Tokio::current())
        .with_reactor(tokio_reactor_trait::Tokio);

    let mut attempts = 0;
    loop {
        match Connection::connect(addr, options.clone()).await {
            Ok(conn) => {
                info!("Successfully connected to RabbitMQ at {}", addr);
                return Ok(conn);
            }
            Err(e) => {
                attempts += 1;
                error!(
                    attempt = attempts,
                    error = %e,
                    "Failed to connect to RabbitMQ. Retrying in 5 seconds..."
                );
                if attempts >= 5 {
                    return Err(e.into());
                }
                sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Publish seam so the producer and sweeper can be exercised without a
/// broker.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    /// Publishes the message durably and resolves once the broker has
    /// confirmed it. Callers can rely on the task being queued when this
    /// returns Ok.
    async fn publish(&self, message: &TaskMessage) -> Result<()>;
}

/// One durable queue on one channel, publisher-confirm mode enabled.
#[derive(Clone)]
pub struct TaskQueue {
    channel: Channel,
    queue_name: String,
}

impl TaskQueue {
    /// Creates a channel, declares the durable queue and enables publisher
    /// confirms. Producers and the worker must agree on the queue name;
    /// durability has to match on every declaration.
    pub async fn open(conn: &Connection, queue_name: &str) -> Result<Self> {
        let channel = conn.create_channel().await.map_err(|e| {
            TaskError::QueueError(format!("failed to create channel: {}", e))
        })?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| TaskError::QueueError(format!("failed to enable confirms: {}", e)))?;

        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                TaskError::QueueError(format!("failed to declare queue '{}': {}", queue_name, e))
            })?;
        info!("Declared durable task queue '{}'", queue_name);

        Ok(TaskQueue {
            channel,
            queue_name: queue_name.to_string(),
        })
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Sets QoS and starts consuming with manual acknowledgement.
    pub async fn consumer(&self, prefetch_count: u16, tag_prefix: &str) -> Result<Consumer> {
        self.channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| TaskError::QueueError(format!("failed to set QoS: {}", e)))?;

        let consumer_tag = format!(
            "{}-{}-{}",
            tag_prefix,
            std::process::id(),
            chrono::Utc::now().timestamp()
        );
        let consumer = self
            .channel
            .basic_consume(
                &self.queue_name,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| TaskError::QueueError(format!("failed to start consuming: {}", e)))?;
        info!(consumer_tag = %consumer_tag, "Consuming from queue '{}'", self.queue_name);

        Ok(consumer)
    }
}

#[async_trait]
impl TaskPublisher for TaskQueue {
    async fn publish(&self, message: &TaskMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                &payload,
                AMQPProperties::default().with_delivery_mode(2), // Persistent
            )
            .await?
            .await // Wait for broker confirmation
            .map_err(|e| {
                TaskError::QueueError(format!(
                    "publish confirmation failed for task {}: {}",
                    message.task_id, e
                ))
            })?;
        Ok(())
    }
}
