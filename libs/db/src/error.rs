//! Storage-layer error type.

use thiserror::Error;

/// Errors raised by a `WorkflowStore` or `RunStore` implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(glyph_domain::WorkflowId),

    #[error("run not found: {0}")]
    RunNotFound(glyph_domain::RunId),

    #[error("database error")]
    Database(#[source] sqlx::Error),

    #[error("serialization error")]
    Serialization(#[source] serde_json::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}
