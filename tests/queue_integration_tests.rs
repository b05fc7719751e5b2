// tests/queue_integration_tests.rs
//
// End-to-end transport tests against a real RabbitMQ broker. Run with
// `cargo test -- --ignored` when Docker is available.

use futures::StreamExt;
use lapin::{options::BasicAckOptions, Connection, ConnectionProperties};
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};
use uuid::Uuid;
use FitLingo::language::Language;
use FitLingo::queue::{TaskPublisher, TaskQueue};
use FitLingo::task::{DocumentType, TaskMessage, TranslationTask};

async fn start_rabbitmq_container() -> (ContainerAsync<GenericImage>, Connection, String) {
    let image = GenericImage::new("rabbitmq", "3.13-management")
        .with_wait_for(WaitFor::message_on_stdout(
            "Server startup complete".to_string(),
        ))
        .with_exposed_port(5672.tcp());

    let container = image
        .start()
        .await
        .expect("Failed to start RabbitMQ container");

    let host_ip = container
        .get_host()
        .await
        .expect("Failed to get container host IP");
    let host_port = container
        .get_host_port_ipv4(5672)
        .await
        .expect("Failed to get mapped port");

    let amqp_addr = format!("amqp://guest:guest@{}:{}/%2f", host_ip, host_port);
    let conn = Connection::connect(&amqp_addr, ConnectionProperties::default())
        .await
        .expect("connection failed");

    let queue_name = format!("test_translation_tasks_{}", Uuid::new_v4());

    (container, conn, queue_name)
}

#[ignore]
#[tokio::test]
async fn published_message_round_trips_through_the_broker() {
    let (_container, conn, queue_name) = start_rabbitmq_container().await;
    let queue = TaskQueue::open(&conn, &queue_name).await.unwrap();

    let task = TranslationTask::new(
        DocumentType::Program,
        "prog-1",
        vec!["name".into()],
        Language::En,
    );
    queue.publish(&TaskMessage::from(&task)).await.unwrap();

    let mut consumer = queue.consumer(1, "test-consumer").await.unwrap();
    let delivery = consumer
        .next()
        .await
        .expect("consumer stream closed")
        .expect("delivery error");

    let value: serde_json::Value = serde_json::from_slice(&delivery.data).unwrap();
    assert_eq!(value["taskId"], task.task_id);
    assert_eq!(value["documentType"], "PROGRAM");
    assert_eq!(value["sourceLanguage"], "en");
    assert_eq!(
        value["targetLanguages"],
        serde_json::json!(["es", "de", "fr"])
    );

    delivery.ack(BasicAckOptions::default()).await.unwrap();
}

#[ignore]
#[tokio::test]
async fn messages_are_delivered_in_publish_order() {
    let (_container, conn, queue_name) = start_rabbitmq_container().await;
    let queue = TaskQueue::open(&conn, &queue_name).await.unwrap();

    let mut task_ids = Vec::new();
    for i in 0..3 {
        let task = TranslationTask::new(
            DocumentType::Exercise,
            format!("ex-{}", i),
            vec!["name".into()],
            Language::En,
        );
        queue.publish(&TaskMessage::from(&task)).await.unwrap();
        task_ids.push(task.task_id);
    }

    let mut consumer = queue.consumer(10, "test-consumer").await.unwrap();
    for expected_id in &task_ids {
        let delivery = consumer
            .next()
            .await
            .expect("consumer stream closed")
            .expect("delivery error");
        let message: TaskMessage = serde_json::from_slice(&delivery.data).unwrap();
        assert_eq!(&message.task_id, expected_id);
        delivery.ack(BasicAckOptions::default()).await.unwrap();
    }
}
