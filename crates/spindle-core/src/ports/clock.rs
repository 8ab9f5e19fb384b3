//! Clock port: source of the liveness timestamp.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Supplies "now" in seconds for callers that do not carry their own
/// logical timestamp.
pub trait Clock: Send + Sync {
    fn now_in_sec(&self) -> i64;
}

/// Wall clock (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_in_sec(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_in_sec(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
