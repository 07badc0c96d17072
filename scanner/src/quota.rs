//! Run-wide message quota.
//!
//! The guard is the only state shared by every symbol task. Reservation is
//! a single critical section so two tasks can never both observe room for
//! the last slot. The `limit_reached` flag is a one-way latch that tasks
//! poll without taking the lock to stop early.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::info;

pub struct QuotaGuard {
    cap: usize,
    sent: Mutex<usize>,
    limit_reached: AtomicBool,
}

impl QuotaGuard {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            sent: Mutex::new(0),
            limit_reached: AtomicBool::new(cap == 0),
        }
    }

    /// Claims one message slot.
    ///
    /// Returns `false` once `cap` slots are taken. The latch is set as soon
    /// as the last slot is handed out, so producers stop at their next
    /// checkpoint instead of computing messages that would be discarded.
    pub fn try_reserve(&self) -> bool {
        let mut sent = self.sent.lock();

        if *sent >= self.cap {
            self.limit_reached.store(true, Ordering::Release);
            return false;
        }

        *sent += 1;
        if *sent == self.cap {
            self.limit_reached.store(true, Ordering::Release);
            info!(cap = self.cap, "message limit reached, stopping further processing");
        }
        true
    }

    pub fn is_limit_reached(&self) -> bool {
        self.limit_reached.load(Ordering::Acquire)
    }

    /// Slots handed out so far.
    pub fn reserved(&self) -> usize {
        *self.sent.lock()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}
