use thiserror::Error;

use crate::domain::PartitionKey;

/// Failure raised by an index engine (I/O, corruption, disk full, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Malformed row data detected while building terms or documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("column `{column}` cannot be indexed: {reason}")]
    Column { column: String, reason: String },

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum IndexError {
    /// Submission after `shutdown()` / `close()`.
    #[error("index queue is closed")]
    Closed,

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("mapping error in partition {key}: {source}")]
    Mapping {
        key: PartitionKey,
        #[source]
        source: MappingError,
    },

    #[error("row source error: {0}")]
    Source(String),

    #[error("operation `{kind}` panicked")]
    Panicked { kind: &'static str },
}

impl IndexError {
    pub fn is_closed(&self) -> bool {
        matches!(self, IndexError::Closed)
    }
}
