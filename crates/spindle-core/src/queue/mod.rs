//! Key-ordered task queue.
//!
//! Tasks submitted under the same key run one at a time, in submission
//! order. Tasks under different keys run concurrently on a fixed pool of
//! workers. A synchronous submission acts as a barrier: it runs only after
//! every task submitted before it has completed.
//!
//! Layout:
//! - `LaneTable` (one short-held `std::sync::Mutex`) maps each key to its
//!   lane and keeps the list of lanes a worker may pick up.
//! - Workers park on a `Notify` while nothing is ready.
//! - Barriers wait on the completion `Watermark` through a `watch` channel,
//!   and run one at a time under `barrier`.

mod lane;
mod task;
mod watermark;

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;

use crate::domain::{BarrierId, TaskId};
use crate::error::IndexError;
use crate::observability::QueueStats;

use self::lane::LaneTable;
use self::task::Job;

/// Bounds on the dispatch key.
pub trait QueueKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<K> QueueKey for K where K: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

struct Shared<K> {
    table: Mutex<LaneTable<K>>,
    notify: Notify,
    workers: usize,
}

impl<K: QueueKey> Shared<K> {
    fn lock(&self) -> MutexGuard<'_, LaneTable<K>> {
        // A panic never happens while the table is locked, but do not turn
        // one into a second panic on every later call.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) -> bool {
        let was_closed = std::mem::replace(&mut self.lock().closed, true);
        self.notify.notify_waiters();
        !was_closed
    }
}

/// Per-key FIFO dispatcher backed by a fixed worker pool.
///
/// Must be created inside a Tokio runtime.
pub struct TaskQueue<K: QueueKey> {
    shared: Arc<Shared<K>>,
    joins: Mutex<Option<Vec<JoinHandle<()>>>>,
    /// Held from the watermark wait until the barrier operation returns.
    barrier: AsyncMutex<()>,
}

impl<K: QueueKey> TaskQueue<K> {
    /// Spawn `workers` workers (at least one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let shared = Arc::new(Shared {
            table: Mutex::new(LaneTable::new()),
            notify: Notify::new(),
            workers,
        });

        let joins = (0..workers)
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, Arc::clone(&shared))))
            .collect();

        tracing::debug!(workers, "task queue started");
        Self {
            shared,
            joins: Mutex::new(Some(joins)),
            barrier: AsyncMutex::new(()),
        }
    }

    /// Enqueue `operation` on `key`'s lane and return without waiting.
    ///
    /// The operation runs exactly once, after every operation previously
    /// submitted for the same key. Its failure is logged and does not stop
    /// the lane.
    pub fn submit_async<F, Fut>(
        &self,
        key: K,
        kind: &'static str,
        operation: F,
    ) -> Result<TaskId, IndexError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), IndexError>> + Send + 'static,
    {
        let (id, wake) = {
            let mut table = self.shared.lock();
            if table.closed {
                return Err(IndexError::Closed);
            }
            let job = Job::new(table.watermark.issue(), kind, operation);
            let id = job.id;
            tracing::trace!(task_id = %id, seq = job.seq, key = ?key, kind, "task submitted");
            (id, table.push(key, job))
        };
        if wake {
            self.shared.notify.notify_one();
        }
        Ok(id)
    }

    /// Enqueue a batch of operations on `key`'s lane, in order.
    ///
    /// The batch is pushed under a single lock: either every operation is
    /// queued or, when the queue is closed, none is.
    pub fn submit_all<I, F, Fut>(&self, key: K, operations: I) -> Result<Vec<TaskId>, IndexError>
    where
        I: IntoIterator<Item = (&'static str, F)>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), IndexError>> + Send + 'static,
    {
        let operations: Vec<_> = operations.into_iter().collect();
        let (ids, wake) = {
            let mut table = self.shared.lock();
            if table.closed {
                return Err(IndexError::Closed);
            }
            let mut ids = Vec::with_capacity(operations.len());
            let mut wake = false;
            for (kind, operation) in operations {
                let job = Job::new(table.watermark.issue(), kind, operation);
                ids.push(job.id);
                tracing::trace!(task_id = %job.id, seq = job.seq, key = ?key, kind, "task submitted");
                wake |= table.push(key.clone(), job);
            }
            (ids, wake)
        };
        // One lane, so at most one worker can take it.
        if wake {
            self.shared.notify.notify_one();
        }
        Ok(ids)
    }

    /// Wait until every task submitted so far has completed, then run
    /// `operation` on the calling task and return its result.
    ///
    /// Tasks submitted after this call may still run before it returns.
    /// Barrier operations never overlap each other. There is no deadline;
    /// wrap the call in `tokio::time::timeout` if needed.
    pub async fn submit_sync<F, Fut, T>(&self, kind: &'static str, operation: F) -> Result<T, IndexError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, IndexError>> + Send + 'static,
        T: Send + 'static,
    {
        let id = BarrierId::generate();
        let (target, mut rx) = {
            let table = self.shared.lock();
            if table.closed {
                return Err(IndexError::Closed);
            }
            (table.watermark.snapshot(), table.watermark.subscribe())
        };

        tracing::debug!(barrier_id = %id, kind, target, "barrier waiting");
        let _turn = self.barrier.lock().await;
        rx.wait_for(|low| *low >= target)
            .await
            .map_err(|_| IndexError::Closed)?;

        // Run on its own task so a panic comes back as a JoinError.
        let result = match tokio::spawn(async move { operation().await }).await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!(barrier_id = %id, kind, error = %join_err, "barrier operation panicked");
                Err(IndexError::Panicked { kind })
            }
        };
        match &result {
            Ok(_) => tracing::debug!(barrier_id = %id, kind, "barrier done"),
            Err(err) => tracing::warn!(barrier_id = %id, kind, error = %err, "barrier operation failed"),
        }
        result
    }

    /// Stop accepting work, run everything already queued, then join the
    /// workers. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.shared.close() {
            tracing::debug!("task queue shutting down");
        }

        let joins = self
            .joins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(joins) = joins else {
            return;
        };
        for join in joins {
            // ignore: worker panics are already contained per task
            let _ = join.await;
        }

        let stats = self.stats();
        tracing::debug!(completed = stats.completed, failed = stats.failed, "task queue stopped");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        let table = self.shared.lock();
        QueueStats {
            workers: self.shared.workers,
            lanes: table.lane_count(),
            pending: table.pending(),
            running: table.running,
            submitted: table.watermark.issued(),
            completed: table.completed,
            failed: table.failed,
            closed: table.closed,
        }
    }
}

impl<K: QueueKey> Drop for TaskQueue<K> {
    /// Dropping without `shutdown()` closes the queue; the detached workers
    /// still drain what was queued.
    fn drop(&mut self) {
        self.shared.close();
    }
}

async fn worker_loop<K: QueueKey>(worker_id: usize, shared: Arc<Shared<K>>) {
    loop {
        // Register interest before looking at the table so a submission made
        // between the check and the park is not lost.
        let notified = shared.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let next = {
            let mut table = shared.lock();
            match table.take_ready() {
                Some(next) => Some(next),
                None if table.closed => break,
                None => None,
            }
        };

        let Some((key, job)) = next else {
            notified.await;
            continue;
        };

        run_job(worker_id, &shared, key, job).await;
    }
    tracing::trace!(worker_id, "worker stopped");
}

async fn run_job<K: QueueKey>(worker_id: usize, shared: &Shared<K>, key: K, job: Job) {
    let Job {
        id,
        seq,
        kind,
        operation,
    } = job;

    let failed = match tokio::spawn(async move { operation().await }).await {
        Ok(Ok(())) => {
            tracing::trace!(worker_id, task_id = %id, key = ?key, kind, "task done");
            false
        }
        Ok(Err(err)) => {
            tracing::warn!(worker_id, task_id = %id, key = ?key, kind, error = %err, "task failed");
            true
        }
        Err(join_err) => {
            tracing::error!(worker_id, task_id = %id, key = ?key, kind, error = %join_err, "task panicked");
            true
        }
    };

    let requeued = shared.lock().finish(&key, seq, failed);
    // The lane went back on the ready list; let an idle worker take it if
    // this one picks something else first.
    if requeued {
        shared.notify.notify_one();
    }
}

#[cfg(test)]
mod tests;
