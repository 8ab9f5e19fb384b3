//! MemoryRowSource - a tiny in-memory row store read path.
//!
//! Rows written with [`MemoryRowSource::write`] are merged cell by cell
//! (last `written_at` wins), the way a store merges memtable and sstables.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::{Clustering, PartitionKey, Row};
use crate::error::IndexError;
use crate::ports::RowSource;

#[derive(Debug, Default)]
pub struct MemoryRowSource {
    partitions: Mutex<HashMap<PartitionKey, BTreeMap<Clustering, Row>>>,
}

impl MemoryRowSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge `row` into the stored row with the same clustering.
    pub fn write(&self, key: &PartitionKey, row: Row) {
        let mut partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        let rows = partitions.entry(key.clone()).or_default();
        match rows.get_mut(&row.clustering) {
            Some(stored) => merge(stored, row),
            None => {
                rows.insert(row.clustering.clone(), row);
            }
        }
    }

    /// Forget every row of `key`.
    pub fn delete_partition(&self, key: &PartitionKey) {
        self.partitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

fn merge(stored: &mut Row, update: Row) {
    for (column, cell) in update.cells {
        let newer = stored
            .cells
            .get(&column)
            .is_none_or(|old| cell.written_at >= old.written_at);
        if newer {
            stored.cells.insert(column, cell);
        }
    }
    stored.deleted_at = stored.deleted_at.max(update.deleted_at);
    stored.is_static |= update.is_static;
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn read_rows(
        &self,
        key: &PartitionKey,
        clusterings: &BTreeSet<Clustering>,
        _now: i64,
    ) -> Result<Vec<Row>, IndexError> {
        let partitions = self.partitions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(rows) = partitions.get(key) else {
            return Ok(Vec::new());
        };
        Ok(clusterings
            .iter()
            .filter_map(|clustering| rows.get(clustering).cloned())
            .collect())
    }
}
