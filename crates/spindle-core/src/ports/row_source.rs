use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::{Clustering, PartitionKey, Row};
use crate::error::IndexError;

/// Read path of the row store.
///
/// A mutation only carries the written delta; the row source returns the
/// merged current state of those rows so the indexer sees every column.
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Current rows of `key` for `clusterings` as of `now`, in clustering order.
    ///
    /// Clusterings with no remaining data may be omitted.
    async fn read_rows(
        &self,
        key: &PartitionKey,
        clusterings: &BTreeSet<Clustering>,
        now: i64,
    ) -> Result<Vec<Row>, IndexError>;
}
