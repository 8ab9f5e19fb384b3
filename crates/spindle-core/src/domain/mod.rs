//! Domain model: partitions, rows, terms, documents and the index operations
//! derived from them.

pub mod document;
pub mod ids;
pub mod mutation;
pub mod op;
pub mod partition;
pub mod row;

pub use document::{Document, Term};
pub use ids::{BarrierId, TaskId};
pub use mutation::{Mutation, MutationReport};
pub use op::IndexOp;
pub use partition::{Clustering, PartitionKey};
pub use row::{Cell, Row};
