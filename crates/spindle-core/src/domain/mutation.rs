use serde::{Deserialize, Serialize};

use super::{PartitionKey, Row};

/// A change notification from the row store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub key: PartitionKey,
    pub rows: Vec<Row>,
    /// The whole partition was deleted before `rows` were written.
    #[serde(default)]
    pub partition_deleted: bool,
    /// Liveness timestamp, in seconds.
    pub now: i64,
}

impl Mutation {
    pub fn new(key: PartitionKey, now: i64) -> Self {
        Self {
            key,
            rows: Vec::new(),
            partition_deleted: false,
            now,
        }
    }

    pub fn with_row(mut self, row: Row) -> Self {
        self.rows.push(row);
        self
    }

    pub fn deleting_partition(mut self) -> Self {
        self.partition_deleted = true;
        self
    }
}

/// What a mutation turned into. Every counted operation has been enqueued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutationReport {
    pub partition_deleted: bool,
    pub upserts: usize,
    pub deletes: usize,
}

impl MutationReport {
    pub fn enqueued(&self) -> usize {
        usize::from(self.partition_deleted) + self.upserts + self.deletes
    }
}
