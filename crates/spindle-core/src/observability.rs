use serde::{Deserialize, Serialize};

/// Point-in-time view of a task queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub workers: usize,
    /// Lanes with queued or running work.
    pub lanes: usize,
    /// Tasks waiting in a lane.
    pub pending: usize,
    pub running: usize,
    pub submitted: u64,
    /// Tasks that ran, successfully or not.
    pub completed: u64,
    pub failed: u64,
    pub closed: bool,
}

impl QueueStats {
    /// Submitted tasks that have not completed yet.
    pub fn in_flight(&self) -> u64 {
        self.submitted - self.completed
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight() == 0
    }
}
