// tests/producer_tests.rs

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use FitLingo::error::{Result, TaskError};
use FitLingo::language::Language;
use FitLingo::producer::TaskProducer;
use FitLingo::queue::TaskPublisher;
use FitLingo::store::{InMemoryTaskStore, TaskStore};
use FitLingo::task::{DocumentType, TaskMessage, TaskStatus};

/// Publisher fake that records every message and can be told to fail.
#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<TaskMessage>>,
    fail: bool,
}

impl RecordingPublisher {
    fn failing() -> Self {
        RecordingPublisher {
            published: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    async fn messages(&self) -> Vec<TaskMessage> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl TaskPublisher for RecordingPublisher {
    async fn publish(&self, message: &TaskMessage) -> Result<()> {
        if self.fail {
            return Err(TaskError::QueueError("broker unavailable".to_string()));
        }
        self.published.lock().await.push(message.clone());
        Ok(())
    }
}

fn producer_with(
    store: Arc<InMemoryTaskStore>,
    publisher: Arc<RecordingPublisher>,
) -> TaskProducer {
    TaskProducer::new(store, publisher)
}

#[tokio::test]
async fn queue_task_computes_targets_as_all_languages_minus_source() {
    let store = Arc::new(InMemoryTaskStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let producer = producer_with(store.clone(), publisher.clone());

    let task_id = producer
        .queue_translation_task(
            DocumentType::Program,
            "prog-1",
            vec!["name".into()],
            Language::Es,
        )
        .await
        .unwrap();

    let record = store.get(&task_id).await.unwrap().unwrap();
    assert_eq!(record.source_language, Language::Es);
    assert_eq!(
        record.target_languages,
        vec![Language::En, Language::De, Language::Fr]
    );
    assert!(!record.target_languages.contains(&Language::Es));
}

#[tokio::test]
async fn queue_task_persists_pending_record_and_publishes_matching_message() {
    let store = Arc::new(InMemoryTaskStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let producer = producer_with(store.clone(), publisher.clone());

    let task_id = producer
        .queue_translation_task(
            DocumentType::WorkoutPrototype,
            "workout-7",
            vec!["name".into(), "description".into()],
            Language::En,
        )
        .await
        .unwrap();

    let record = store.get(&task_id).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Pending);
    assert_eq!(record.document_id, "workout-7");

    let messages = publisher.messages().await;
    assert_eq!(messages.len(), 1);
    let message = &messages[0];
    // The message duplicates the record so the worker can act without a lookup.
    assert_eq!(message.task_id, task_id);
    assert_eq!(message.document_type, DocumentType::WorkoutPrototype);
    assert_eq!(message.document_id, "workout-7");
    assert_eq!(
        message.fields_to_translate,
        vec!["name".to_string(), "description".to_string()]
    );
    assert_eq!(message.source_language, Language::En);
    assert_eq!(message.target_languages, record.target_languages);
}

#[tokio::test]
async fn publish_failure_leaves_an_orphaned_pending_record() {
    let store = Arc::new(InMemoryTaskStore::new());
    let publisher = Arc::new(RecordingPublisher::failing());
    let producer = producer_with(store.clone(), publisher.clone());

    let result = producer
        .queue_translation_task(
            DocumentType::Program,
            "prog-1",
            vec!["name".into()],
            Language::En,
        )
        .await;
    assert!(result.is_err());

    // Record-then-publish ordering: the record exists even though nothing was
    // published.
    assert_eq!(store.len().await, 1);
    assert!(publisher.messages().await.is_empty());
}

#[tokio::test]
async fn each_queued_task_gets_a_fresh_id() {
    let store = Arc::new(InMemoryTaskStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let producer = producer_with(store.clone(), publisher.clone());

    let first = producer
        .queue_translation_task(DocumentType::Program, "p", vec!["name".into()], Language::En)
        .await
        .unwrap();
    let second = producer
        .queue_translation_task(DocumentType::Program, "p", vec!["name".into()], Language::En)
        .await
        .unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn cancel_active_tasks_marks_live_tasks_canceled() {
    let store = Arc::new(InMemoryTaskStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let producer = producer_with(store.clone(), publisher.clone());

    let task_id = producer
        .queue_translation_task(DocumentType::Program, "p1", vec!["name".into()], Language::En)
        .await
        .unwrap();

    let canceled = producer
        .cancel_active_tasks("p1", DocumentType::Program)
        .await
        .unwrap();
    assert_eq!(canceled, 1);
    assert_eq!(
        store.get(&task_id).await.unwrap().unwrap().status,
        TaskStatus::Canceled
    );
}

#[tokio::test]
async fn requeue_for_update_supersedes_the_previous_task() {
    let store = Arc::new(InMemoryTaskStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let producer = producer_with(store.clone(), publisher.clone());

    let original = producer
        .queue_translation_task(DocumentType::Program, "p1", vec!["name".into()], Language::En)
        .await
        .unwrap();

    let replacement = producer
        .requeue_for_update(DocumentType::Program, "p1", vec!["name".into()], Language::En)
        .await
        .unwrap();

    assert_ne!(original, replacement);
    assert_eq!(
        store.get(&original).await.unwrap().unwrap().status,
        TaskStatus::Canceled
    );
    assert_eq!(
        store.get(&replacement).await.unwrap().unwrap().status,
        TaskStatus::Pending
    );
    assert_eq!(publisher.messages().await.len(), 2);
}

#[tokio::test]
async fn cancel_does_not_touch_other_documents_or_types() {
    let store = Arc::new(InMemoryTaskStore::new());
    let publisher = Arc::new(RecordingPublisher::default());
    let producer = producer_with(store.clone(), publisher.clone());

    let program_task = producer
        .queue_translation_task(DocumentType::Program, "x", vec!["name".into()], Language::En)
        .await
        .unwrap();
    let exercise_task = producer
        .queue_translation_task(DocumentType::Exercise, "x", vec!["name".into()], Language::En)
        .await
        .unwrap();

    let canceled = producer
        .cancel_active_tasks("x", DocumentType::Program)
        .await
        .unwrap();
    assert_eq!(canceled, 1);
    assert_eq!(
        store.get(&program_task).await.unwrap().unwrap().status,
        TaskStatus::Canceled
    );
    assert_eq!(
        store.get(&exercise_task).await.unwrap().unwrap().status,
        TaskStatus::Pending
    );
}
