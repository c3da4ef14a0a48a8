use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid field descriptor, category definition or query input shape.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A mapped value disagrees with its field descriptor.
    #[error("Schema violation on field '{field}': {reason}")]
    SchemaViolation { field: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index not ready: {0}")]
    IndexNotReady(String),

    #[error("A rebuild is already in progress")]
    RebuildInProgress,

    #[error("Document source failed: {0}")]
    Source(String),

    #[error("Persistence failed: {0}")]
    Persistence(String),

    #[error("Index operation failed: {0}")]
    Index(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn violation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaViolation { field: field.into(), reason: reason.into() }
    }

    /// Configuration errors are fatal and must reach the caller unchanged.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
