//! Index operations implied by a row, and the pure function deciding them.

use serde::Serialize;

use super::{Document, PartitionKey, Row, Term};
use crate::error::{EngineError, MappingError};
use crate::ports::{IndexEngine, RowMapper};

/// A single index mutation, decided but not yet applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum IndexOp {
    Upsert { term: Term, document: Document },
    Delete { term: Term },
}

impl IndexOp {
    /// Decide what `row` means for the index as of `now`.
    ///
    /// Live rows are upserted under their row term; rows without live data
    /// are deleted by the same term.
    pub fn classify(
        mapper: &dyn RowMapper,
        key: &PartitionKey,
        row: &Row,
        now: i64,
    ) -> Result<Self, MappingError> {
        let term = mapper.row_term(key, row);
        if row.has_live_data(now) {
            let document = mapper.document(key, row, now)?;
            Ok(IndexOp::Upsert { term, document })
        } else {
            Ok(IndexOp::Delete { term })
        }
    }

    /// Delete of every document of the partition.
    pub fn delete_partition(mapper: &dyn RowMapper, key: &PartitionKey) -> Self {
        IndexOp::Delete {
            term: mapper.partition_term(key),
        }
    }

    /// Label used in logs and task metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            IndexOp::Upsert { .. } => "upsert",
            IndexOp::Delete { .. } => "delete",
        }
    }

    pub fn term(&self) -> &Term {
        match self {
            IndexOp::Upsert { term, .. } | IndexOp::Delete { term } => term,
        }
    }

    pub async fn apply(self, engine: &dyn IndexEngine) -> Result<(), EngineError> {
        match self {
            IndexOp::Upsert { term, document } => engine.upsert(term, document).await,
            IndexOp::Delete { term } => engine.delete(term).await,
        }
    }
}
