//! Rows as seen by the indexer: a clustering plus timestamped, expiring cells.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Clustering;

/// One column value of a row.
///
/// Times are logical seconds, the same unit as the `now` passed to
/// [`Row::has_live_data`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: serde_json::Value,
    pub written_at: i64,
    /// Expiration time of a TTL'd cell. `None` never expires.
    pub expires_at: Option<i64>,
}

impl Cell {
    pub fn new(value: serde_json::Value, written_at: i64) -> Self {
        Self {
            value,
            written_at,
            expires_at: None,
        }
    }

    pub fn with_ttl(value: serde_json::Value, written_at: i64, ttl_secs: i64) -> Self {
        Self {
            value,
            written_at,
            expires_at: Some(written_at.saturating_add(ttl_secs)),
        }
    }

    pub fn is_live(&self, now: i64) -> bool {
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub clustering: Clustering,
    pub cells: BTreeMap<String, Cell>,
    /// Static rows hold partition-wide columns and are never indexed on their own.
    #[serde(default)]
    pub is_static: bool,
    /// Row tombstone time, if the row was deleted.
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

impl Row {
    pub fn new(clustering: Clustering) -> Self {
        Self {
            clustering,
            cells: BTreeMap::new(),
            is_static: false,
            deleted_at: None,
        }
    }

    /// A row that no longer has any data, as returned for a purged clustering.
    pub fn tombstone(clustering: Clustering, deleted_at: i64) -> Self {
        Self {
            deleted_at: Some(deleted_at),
            ..Self::new(clustering)
        }
    }

    pub fn static_row() -> Self {
        Self {
            is_static: true,
            ..Self::new(Clustering::empty())
        }
    }

    pub fn with_cell(mut self, column: impl Into<String>, cell: Cell) -> Self {
        self.cells.insert(column.into(), cell);
        self
    }

    /// Does this row carry any non-expired, non-deleted data as of `now`?
    ///
    /// Cells written after the row tombstone survive it.
    pub fn has_live_data(&self, now: i64) -> bool {
        self.live_cells(now).next().is_some()
    }

    /// Cells that are visible as of `now`.
    pub fn live_cells(&self, now: i64) -> impl Iterator<Item = (&String, &Cell)> {
        let deleted_at = self.deleted_at.filter(|t| *t <= now);
        self.cells.iter().filter(move |(_, cell)| {
            cell.is_live(now) && deleted_at.is_none_or(|t| cell.written_at > t)
        })
    }
}
