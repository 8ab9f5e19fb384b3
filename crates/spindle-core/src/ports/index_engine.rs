//! IndexEngine port - the durable document store behind search.

use async_trait::async_trait;

use crate::domain::{Document, Term};
use crate::error::EngineError;

/// Index engine contract.
///
/// Implementations must tolerate calls for different partitions running
/// concurrently; the task queue guarantees that operations on one partition
/// never overlap. Nothing outside the task queue calls the mutating methods.
#[async_trait]
pub trait IndexEngine: Send + Sync {
    /// Replace every document matching `term` with `document`.
    async fn upsert(&self, term: Term, document: Document) -> Result<(), EngineError>;

    /// Remove every document matching `term`.
    async fn delete(&self, term: Term) -> Result<(), EngineError>;

    /// Make all previous writes durable.
    async fn commit(&self) -> Result<(), EngineError>;

    /// Remove every document.
    async fn truncate(&self) -> Result<(), EngineError>;

    /// Release the engine. Later calls fail.
    async fn close(&self) -> Result<(), EngineError>;
}
