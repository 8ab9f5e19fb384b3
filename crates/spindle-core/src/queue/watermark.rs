//! Completion watermark backing synchronous barriers.
//!
//! Every task gets a sequence number at submission. The watermark is the
//! lowest sequence number that has not completed yet (or the next number to
//! be issued when nothing is outstanding), so `watermark >= n` means every
//! task numbered below `n` has finished, whatever order they finished in.

use std::collections::BTreeSet;

use tokio::sync::watch;

pub(crate) struct Watermark {
    next_seq: u64,
    outstanding: BTreeSet<u64>,
    tx: watch::Sender<u64>,
}

impl Watermark {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            next_seq: 0,
            outstanding: BTreeSet::new(),
            tx,
        }
    }

    /// Allocate the sequence number of a new task.
    pub fn issue(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.outstanding.insert(seq);
        seq
    }

    pub fn complete(&mut self, seq: u64) {
        self.outstanding.remove(&seq);
        let low = self.low();
        self.tx.send_if_modified(|current| {
            if *current == low {
                return false;
            }
            *current = low;
            true
        });
    }

    /// Barrier target: everything issued so far.
    pub fn snapshot(&self) -> u64 {
        self.next_seq
    }

    pub fn issued(&self) -> u64 {
        self.next_seq
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    fn low(&self) -> u64 {
        self.outstanding.first().copied().unwrap_or(self.next_seq)
    }
}
