use crate::task::DocumentType;
use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, TaskError>;

/// The error type for translation pipeline operations.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Configuration validation error: {0}")]
    ConfigValidationError(String),

    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Queueing system error: {0}")]
    QueueError(String),

    #[error("Task store error: {0}")]
    StoreError(String),

    #[error("Translation provider error: {0}")]
    ProviderError(String),

    #[error("Document {document_id} of type {document_type} not found")]
    DocumentNotFound {
        document_type: DocumentType,
        document_id: String,
    },

    #[error("Unsupported language code '{0}'")]
    UnsupportedLanguage(String),

    #[error("Serialization/Deserialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

// lapin and sqlx errors are mapped to string variants where they occur; the
// blanket conversions below cover the common paths.
impl From<lapin::Error> for TaskError {
    fn from(err: lapin::Error) -> Self {
        TaskError::QueueError(err.to_string())
    }
}

impl From<sqlx::Error> for TaskError {
    fn from(err: sqlx::Error) -> Self {
        TaskError::StoreError(err.to_string())
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        TaskError::ProviderError(err.to_string())
    }
}
