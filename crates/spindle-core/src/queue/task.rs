//! Deferred operations as stored in a lane.

use std::future::Future;
use std::pin::Pin;

use crate::domain::TaskId;
use crate::error::IndexError;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Boxed operation. Building the future is deferred until a worker runs it.
pub(crate) type Operation = Box<dyn FnOnce() -> BoxFuture<Result<(), IndexError>> + Send + 'static>;

/// One queued task. Consumed exactly once by a worker.
pub(crate) struct Job {
    pub id: TaskId,
    /// Position in global submission order; drives the barrier watermark.
    pub seq: u64,
    pub kind: &'static str,
    pub operation: Operation,
}

impl Job {
    pub fn new<F, Fut>(seq: u64, kind: &'static str, operation: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), IndexError>> + Send + 'static,
    {
        Self {
            id: TaskId::generate(),
            seq,
            kind,
            operation: Box::new(move || Box::pin(operation())),
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
