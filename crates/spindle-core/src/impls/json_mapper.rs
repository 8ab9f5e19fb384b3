//! JsonMapper - maps rows to documents field by field.
//!
//! Every document gets two reserved string fields:
//! - `_partition_key`: the partition key, target of partition deletes
//! - `_primary_key`: partition key plus clustering, target of row upserts
//!   and row deletes
//!
//! Live cells become fields under their column name. Column names may not be
//! empty or start with `_`.

use std::collections::BTreeSet;

use crate::domain::{Document, PartitionKey, Row, Term};
use crate::error::MappingError;
use crate::ports::RowMapper;

pub const PARTITION_KEY_FIELD: &str = "_partition_key";
pub const PRIMARY_KEY_FIELD: &str = "_primary_key";

#[derive(Debug, Clone, Default)]
pub struct JsonMapper {
    /// Indexed columns. `None` indexes every column.
    columns: Option<BTreeSet<String>>,
}

impl JsonMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only index the given columns; other cells are ignored.
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
        }
    }

    fn is_indexed(&self, column: &str) -> bool {
        self.columns
            .as_ref()
            .is_none_or(|columns| columns.contains(column))
    }

    fn primary_key(key: &PartitionKey, row: &Row) -> String {
        if row.clustering.is_empty() {
            key.to_string()
        } else {
            format!("{key}/{}", row.clustering)
        }
    }
}

impl RowMapper for JsonMapper {
    fn partition_term(&self, key: &PartitionKey) -> Term {
        Term::new(PARTITION_KEY_FIELD, key.as_str())
    }

    fn row_term(&self, key: &PartitionKey, row: &Row) -> Term {
        Term::new(PRIMARY_KEY_FIELD, Self::primary_key(key, row))
    }

    fn document(&self, key: &PartitionKey, row: &Row, now: i64) -> Result<Document, MappingError> {
        let mut document = Document::new()
            .with_field(PARTITION_KEY_FIELD, key.as_str().into())
            .with_field(PRIMARY_KEY_FIELD, Self::primary_key(key, row).into());

        for (column, cell) in row.live_cells(now) {
            if column.is_empty() {
                return Err(MappingError::Column {
                    column: column.clone(),
                    reason: "empty column name".into(),
                });
            }
            if column.starts_with('_') {
                return Err(MappingError::Column {
                    column: column.clone(),
                    reason: "names starting with `_` are reserved".into(),
                });
            }
            if self.is_indexed(column) {
                document.insert(column.clone(), cell.value.clone());
            }
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, Clustering};
    use serde_json::json;

    #[test]
    fn document_carries_keys_and_live_cells() {
        let key = PartitionKey::new("p1");
        let row = Row::new(Clustering::new(["2024", "01"]))
            .with_cell("title", Cell::new(json!("hello"), 1))
            .with_cell("gone", Cell::with_ttl(json!("bye"), 1, 1));

        let doc = JsonMapper::new().document(&key, &row, 5).unwrap();

        assert_eq!(doc.get(PARTITION_KEY_FIELD), Some(&json!("p1")));
        assert_eq!(doc.get(PRIMARY_KEY_FIELD), Some(&json!("p1/2024:01")));
        assert_eq!(doc.get("title"), Some(&json!("hello")));
        assert_eq!(doc.get("gone"), None);
    }

    #[test]
    fn row_term_without_clustering_is_the_partition_key() {
        let key = PartitionKey::new("p1");
        let term = JsonMapper::new().row_term(&key, &Row::new(Clustering::empty()));
        assert_eq!(term, Term::new(PRIMARY_KEY_FIELD, "p1"));
    }

    #[test]
    fn column_filter_skips_unlisted_cells() {
        let key = PartitionKey::new("p1");
        let row = Row::new(Clustering::new(["c"]))
            .with_cell("a", Cell::new(json!(1), 1))
            .with_cell("b", Cell::new(json!(2), 1));

        let doc = JsonMapper::with_columns(["a"]).document(&key, &row, 1).unwrap();

        assert_eq!(doc.get("a"), Some(&json!(1)));
        assert_eq!(doc.get("b"), None);
    }

    #[test]
    fn reserved_column_is_a_mapping_error() {
        let key = PartitionKey::new("p1");
        let row = Row::new(Clustering::new(["c"])).with_cell("_secret", Cell::new(json!(1), 1));

        let err = JsonMapper::new().document(&key, &row, 1).unwrap_err();
        assert!(matches!(err, MappingError::Column { column, .. } if column == "_secret"));
    }
}
