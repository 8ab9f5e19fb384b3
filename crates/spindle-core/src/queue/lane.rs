//! Per-key lanes and the ready list the workers pull from.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use super::task::Job;
use super::watermark::Watermark;

/// FIFO of pending tasks for one key.
///
/// Invariant: a lane that is not running and has pending tasks appears in
/// `LaneTable::ready` exactly once; a running lane never appears there.
#[derive(Debug, Default)]
pub(crate) struct Lane {
    pending: VecDeque<Job>,
    running: bool,
}

/// Everything guarded by the queue lock. Never held across an `.await`.
pub(crate) struct LaneTable<K> {
    lanes: HashMap<K, Lane>,
    ready: VecDeque<K>,
    pub watermark: Watermark,
    pub closed: bool,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
}

impl<K> LaneTable<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            lanes: HashMap::new(),
            ready: VecDeque::new(),
            watermark: Watermark::new(),
            closed: false,
            running: 0,
            completed: 0,
            failed: 0,
        }
    }

    /// Append `job` to `key`'s lane, creating the lane on first use.
    ///
    /// Returns `true` when the lane just became ready and a worker should be
    /// woken.
    pub fn push(&mut self, key: K, job: Job) -> bool {
        let lane = self.lanes.entry(key.clone()).or_default();
        lane.pending.push_back(job);
        if !lane.running && lane.pending.len() == 1 {
            self.ready.push_back(key);
            return true;
        }
        false
    }

    /// Take the head task of the next ready lane and mark the lane running.
    pub fn take_ready(&mut self) -> Option<(K, Job)> {
        while let Some(key) = self.ready.pop_front() {
            if let Some(lane) = self.lanes.get_mut(&key)
                && let Some(job) = lane.pending.pop_front()
            {
                lane.running = true;
                self.running += 1;
                return Some((key, job));
            }
        }
        None
    }

    /// Record the end of `key`'s running task.
    ///
    /// Idle empty lanes are dropped here. Returns `true` when the lane still
    /// has work and went back on the ready list.
    pub fn finish(&mut self, key: &K, seq: u64, failed: bool) -> bool {
        self.running -= 1;
        self.completed += 1;
        if failed {
            self.failed += 1;
        }

        let requeued = match self.lanes.entry(key.clone()) {
            Entry::Occupied(mut e) => {
                if e.get().pending.is_empty() {
                    e.remove();
                    false
                } else {
                    e.get_mut().running = false;
                    self.ready.push_back(key.clone());
                    true
                }
            }
            Entry::Vacant(_) => false,
        };

        // After the lane bookkeeping, so a released barrier sees the lane gone.
        self.watermark.complete(seq);
        requeued
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn pending(&self) -> usize {
        self.lanes.values().map(|lane| lane.pending.len()).sum()
    }
}
