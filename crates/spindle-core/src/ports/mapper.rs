use crate::domain::{Document, PartitionKey, Row, Term};
use crate::error::MappingError;

/// Row/document mapper: pure translation from store rows to index terms and
/// documents.
pub trait RowMapper: Send + Sync {
    /// Term matching every document of a partition.
    fn partition_term(&self, key: &PartitionKey) -> Term;

    /// Term matching the single document of one row.
    fn row_term(&self, key: &PartitionKey, row: &Row) -> Term;

    /// Document for a live row, built from the cells visible as of `now`.
    fn document(&self, key: &PartitionKey, row: &Row, now: i64) -> Result<Document, MappingError>;
}
