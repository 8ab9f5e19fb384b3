//! IndexService - keeps one index in step with the row store.
//!
//! Every index operation is submitted to the task queue keyed by partition,
//! so operations of one partition apply in the order they were decided while
//! different partitions index in parallel. Within a mutation the partition
//! delete is always enqueued before any row operation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{Clustering, IndexOp, Mutation, MutationReport, PartitionKey, Row};
use crate::error::IndexError;
use crate::observability::QueueStats;
use crate::ports::{Clock, IndexEngine, RowMapper, RowSource};
use crate::queue::TaskQueue;

use super::IndexOptions;

pub struct IndexService {
    name: String,
    engine: Arc<dyn IndexEngine>,
    mapper: Arc<dyn RowMapper>,
    source: Option<Arc<dyn RowSource>>,
    clock: Arc<dyn Clock>,
    queue: TaskQueue<PartitionKey>,
    closed: AtomicBool,
}

impl IndexService {
    /// Use [`super::IndexServiceBuilder`] rather than calling this directly.
    pub(crate) fn new(
        options: &IndexOptions,
        engine: Arc<dyn IndexEngine>,
        mapper: Arc<dyn RowMapper>,
        source: Option<Arc<dyn RowSource>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = options.qualified_name();
        tracing::info!(index = %name, workers = options.indexing_workers, "index service started");
        Self {
            name,
            engine,
            mapper,
            source,
            clock,
            queue: TaskQueue::new(options.indexing_workers),
            closed: AtomicBool::new(false),
        }
    }

    /// Fully qualified `keyspace.table.index` name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue the index operations implied by a mutation of `key`.
    ///
    /// Returns once everything is enqueued, not applied; use [`commit`] for
    /// durability. Every operation is decided first and the whole batch is
    /// enqueued at once, so a mapping error or a concurrent close leaves the
    /// queue untouched.
    ///
    /// [`commit`]: IndexService::commit
    pub async fn apply_mutation(
        &self,
        key: &PartitionKey,
        rows: Vec<Row>,
        partition_deleted: bool,
        now: i64,
    ) -> Result<MutationReport, IndexError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::Closed);
        }

        let mut ops = Vec::with_capacity(rows.len() + 1);
        if partition_deleted {
            ops.push(IndexOp::delete_partition(self.mapper.as_ref(), key));
        }

        let mut report = MutationReport {
            partition_deleted,
            ..MutationReport::default()
        };
        let rows = self.resolve_rows(key, rows, now).await?;
        for row in &rows {
            let op = IndexOp::classify(self.mapper.as_ref(), key, row, now).map_err(|source| {
                IndexError::Mapping {
                    key: key.clone(),
                    source,
                }
            })?;
            match op {
                IndexOp::Upsert { .. } => report.upserts += 1,
                IndexOp::Delete { .. } => report.deletes += 1,
            }
            ops.push(op);
        }

        // All or nothing: a concurrent close() must not leave half a mutation queued.
        let operations = ops.into_iter().map(|op| {
            let engine = Arc::clone(&self.engine);
            let kind = op.kind();
            let operation = move || async move {
                op.apply(engine.as_ref()).await.map_err(IndexError::from)
            };
            (kind, operation)
        });
        self.queue.submit_all(key.clone(), operations)?;

        tracing::debug!(
            index = %self.name,
            key = %key,
            partition_deleted,
            upserts = report.upserts,
            deletes = report.deletes,
            "mutation enqueued"
        );
        Ok(report)
    }

    pub async fn index(&self, mutation: Mutation) -> Result<MutationReport, IndexError> {
        let Mutation {
            key,
            rows,
            partition_deleted,
            now,
        } = mutation;
        self.apply_mutation(&key, rows, partition_deleted, now).await
    }

    /// [`apply_mutation`](IndexService::apply_mutation) with the liveness
    /// timestamp taken from the configured clock.
    pub async fn apply_mutation_now(
        &self,
        key: &PartitionKey,
        rows: Vec<Row>,
        partition_deleted: bool,
    ) -> Result<MutationReport, IndexError> {
        let now = self.clock.now_in_sec();
        self.apply_mutation(key, rows, partition_deleted, now).await
    }

    /// Wait for every operation enqueued so far, then commit the engine.
    pub async fn commit(&self) -> Result<(), IndexError> {
        let engine = Arc::clone(&self.engine);
        self.queue
            .submit_sync("commit", move || async move {
                engine.commit().await.map_err(IndexError::from)
            })
            .await
    }

    /// Wait for every operation enqueued so far, then clear the index.
    pub async fn truncate(&self) -> Result<(), IndexError> {
        let engine = Arc::clone(&self.engine);
        self.queue
            .submit_sync("truncate", move || async move {
                engine.truncate().await.map_err(IndexError::from)
            })
            .await
    }

    /// Drain the queue and release the engine. Later calls fail with
    /// [`IndexError::Closed`]; closing again is a no-op.
    pub async fn close(&self) -> Result<(), IndexError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.queue.shutdown().await;
        self.engine.close().await?;
        tracing::info!(index = %self.name, "index service closed");
        Ok(())
    }

    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Rows to classify for this mutation, one per clustering, in clustering
    /// order.
    ///
    /// Static rows are skipped and a clustering written twice keeps its last
    /// row. With a row source, the current rows are re-read and clusterings
    /// it no longer knows are treated as deleted.
    async fn resolve_rows(
        &self,
        key: &PartitionKey,
        rows: Vec<Row>,
        now: i64,
    ) -> Result<Vec<Row>, IndexError> {
        let mut by_clustering: BTreeMap<Clustering, Row> = BTreeMap::new();
        for row in rows.into_iter().filter(|row| !row.is_static) {
            by_clustering.insert(row.clustering.clone(), row);
        }

        let Some(source) = &self.source else {
            return Ok(by_clustering.into_values().collect());
        };
        if by_clustering.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: BTreeSet<Clustering> = by_clustering.into_keys().collect();
        let mut current: BTreeMap<Clustering, Row> = source
            .read_rows(key, &wanted, now)
            .await?
            .into_iter()
            .filter(|row| wanted.contains(&row.clustering))
            .map(|row| (row.clustering.clone(), row))
            .collect();

        Ok(wanted
            .into_iter()
            .map(|clustering| {
                current
                    .remove(&clustering)
                    .unwrap_or_else(|| Row::tombstone(clustering, now))
            })
            .collect())
    }
}
