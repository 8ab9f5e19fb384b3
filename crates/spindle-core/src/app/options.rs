//! Configuration of one managed index.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::BuildError;

/// Options of a managed index, usually read from a JSON document.
///
/// Missing fields take their default.
///
/// ```json
/// { "keyspace": "shop", "table": "items", "index": "items_idx", "indexing_workers": 4 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexOptions {
    pub keyspace: String,
    pub table: String,
    pub index: String,
    /// Size of the task queue worker pool. Defaults to the number of CPUs.
    pub indexing_workers: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            keyspace: "default".to_string(),
            table: "table".to_string(),
            index: "index".to_string(),
            indexing_workers: num_cpus::get(),
        }
    }
}

impl IndexOptions {
    pub fn from_json_str(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::InvalidOptions(format!("json decode: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BuildError::InvalidOptions(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.indexing_workers = workers;
        self
    }

    /// `keyspace.table.index`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}.{}", self.keyspace, self.table, self.index)
    }

    pub fn validate(&self) -> Result<(), BuildError> {
        if self.indexing_workers == 0 {
            return Err(BuildError::InvalidOptions(
                "indexing_workers must be at least 1".to_string(),
            ));
        }
        for (field, value) in [
            ("keyspace", &self.keyspace),
            ("table", &self.table),
            ("index", &self.index),
        ] {
            if value.is_empty() || value.contains('.') {
                return Err(BuildError::InvalidOptions(format!(
                    "{field} must be non-empty and contain no '.', got {value:?}"
                )));
            }
        }
        Ok(())
    }
}
