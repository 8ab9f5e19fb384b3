//! spindle-core
//!
//! Keeps a secondary index in step with a partitioned row store.
//!
//! # Modules
//! - **domain**: domain model (ids, partition, row, document, op, mutation)
//! - **ports**: collaborator traits (IndexEngine, RowMapper, RowSource, Clock)
//! - **queue**: key-ordered task queue (TaskQueue)
//! - **app**: indexing orchestration (IndexService, builder, options)
//! - **impls**: in-memory implementations for development and tests
//! - **observability**: queue state snapshots (QueueStats)
//! - **error**: error types

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;

pub use app::{BuildError, IndexOptions, IndexService, IndexServiceBuilder};
pub use domain::{
    BarrierId, Cell, Clustering, Document, IndexOp, Mutation, MutationReport, PartitionKey, Row,
    TaskId, Term,
};
pub use error::{EngineError, IndexError, MappingError};
pub use observability::QueueStats;
pub use ports::{Clock, IndexEngine, RowMapper, RowSource};
pub use queue::{QueueKey, TaskQueue};
