use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;
use crate::language::Language;

/// The document collections that own translatable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "PROGRAM")]
    Program,
    #[serde(rename = "EXERCISE")]
    Exercise,
    #[serde(rename = "WORKOUT-PROTOTYPE")]
    WorkoutPrototype,
    #[serde(rename = "ANNOUNCEMENT")]
    Announcement,
    #[serde(rename = "NOTIFICATION")]
    Notification,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Program => "PROGRAM",
            DocumentType::Exercise => "EXERCISE",
            DocumentType::WorkoutPrototype => "WORKOUT-PROTOTYPE",
            DocumentType::Announcement => "ANNOUNCEMENT",
            DocumentType::Notification => "NOTIFICATION",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROGRAM" => Ok(DocumentType::Program),
            "EXERCISE" => Ok(DocumentType::Exercise),
            "WORKOUT-PROTOTYPE" => Ok(DocumentType::WorkoutPrototype),
            "ANNOUNCEMENT" => Ok(DocumentType::Announcement),
            "NOTIFICATION" => Ok(DocumentType::Notification),
            other => Err(TaskError::Unexpected(format!(
                "unknown document type '{}'",
                other
            ))),
        }
    }
}

/// Task lifecycle states.
///
/// PENDING is set by the producer, IN_PROGRESS/COMPLETED/FAILED by the
/// worker, CANCELED by the service layer when a newer edit supersedes the
/// task. COMPLETED, CANCELED and FAILED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Canceled,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Canceled => "CANCELED",
            TaskStatus::Failed => "FAILED",
        }
    }

    /// No operation moves a task out of a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Canceled | TaskStatus::Failed
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TaskStatus::Pending),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "CANCELED" => Ok(TaskStatus::Canceled),
            "FAILED" => Ok(TaskStatus::Failed),
            other => Err(TaskError::Unexpected(format!(
                "unknown task status '{}'",
                other
            ))),
        }
    }
}

/// One in-flight request to populate the non-original language entries of a
/// set of fields on one document.
///
/// The record outlives the queue message: it stays behind as the audit and
/// idempotency trail and is never deleted by this pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationTask {
    pub task_id: String,
    pub document_type: DocumentType,
    pub document_id: String,
    pub fields_to_translate: Vec<String>,
    pub source_language: Language,
    pub target_languages: Vec<Language>,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TranslationTask {
    /// Builds a fresh PENDING task with a random id and all supported
    /// languages except the source as targets.
    pub fn new(
        document_type: DocumentType,
        document_id: impl Into<String>,
        fields_to_translate: Vec<String>,
        source_language: Language,
    ) -> Self {
        let now = Utc::now();
        TranslationTask {
            task_id: Uuid::new_v4().to_string(),
            document_type,
            document_id: document_id.into(),
            fields_to_translate,
            source_language,
            target_languages: Language::targets_for(source_language),
            status: TaskStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The queue message body. Duplicates the persisted record so the worker
/// knows what to do without a lookup; the record is still consulted for the
/// cancellation check.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMessage {
    pub task_id: String,
    pub document_type: DocumentType,
    pub document_id: String,
    pub fields_to_translate: Vec<String>,
    pub source_language: Language,
    pub target_languages: Vec<Language>,
}

impl From<&TranslationTask> for TaskMessage {
    fn from(task: &TranslationTask) -> Self {
        TaskMessage {
            task_id: task.task_id.clone(),
            document_type: task.document_type,
            document_id: task.document_id.clone(),
            fields_to_translate: task.fields_to_translate.clone(),
            source_language: task.source_language,
            target_languages: task.target_languages.clone(),
        }
    }
}
