//! Closeable counting semaphore built from a mutex and a condition variable.
//!
//! The bounded queue enforces its capacity with two of these: one counts
//! free slots (initialized to the capacity), one counts filled slots
//! (initialized to zero). The pairing is load-bearing: a single signal
//! shared by both directions can deadlock when producers and consumers are
//! imbalanced, so each direction gets its own counter and its own wake-up
//! channel.
//!
//! # Protocol
//!
//! **Acquire (may block):**
//! 1. Lock the counter
//! 2. If a permit is available, take it and return
//! 3. Otherwise wait on the condition variable and re-check (the loop
//!    absorbs spurious wakeups)
//!
//! **Release:**
//! 1. Lock the counter, add one permit
//! 2. Drop the lock, then wake one waiter
//!
//! # Close semantics
//!
//! What happens to waiters and remaining permits when the owner shuts the
//! semaphore differs per queue direction, selected by [`ClosePolicy`]:
//! inserters must be refused the moment the queue closes, while removers
//! may drain permits that were granted before the close and only then
//! fail out.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::queue::TransferError;

/// What `acquire` does with permits that remain after `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClosePolicy {
    /// Fail every acquire once closed, even while permits remain.
    Refuse,
    /// Keep granting remaining permits after close; fail once the count
    /// reaches zero.
    Drain,
}

struct Count {
    permits: usize,
    closed: bool,
}

pub(crate) struct Semaphore {
    count: Mutex<Count>,
    available: Condvar,
    policy: ClosePolicy,
}

impl Semaphore {
    pub(crate) fn new(permits: usize, policy: ClosePolicy) -> Self {
        Self {
            count: Mutex::new(Count {
                permits,
                closed: false,
            }),
            available: Condvar::new(),
            policy,
        }
    }

    /// The counter is a bare integer pair, valid no matter where a holder
    /// panicked, so poison is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, Count> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes one permit, blocking until one is granted.
    ///
    /// # Errors
    /// [`TransferError::Shutdown`] once the semaphore is closed: immediately
    /// under [`ClosePolicy::Refuse`], after the remaining permits are drained
    /// under [`ClosePolicy::Drain`].
    pub(crate) fn acquire(&self) -> Result<(), TransferError> {
        let mut count = self.lock();
        loop {
            if count.closed && self.policy == ClosePolicy::Refuse {
                return Err(TransferError::Shutdown);
            }
            if count.permits > 0 {
                count.permits -= 1;
                return Ok(());
            }
            if count.closed {
                return Err(TransferError::Shutdown);
            }
            count = self
                .available
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Takes one permit, blocking at most `timeout`.
    ///
    /// # Errors
    /// [`TransferError::Shutdown`] as for [`acquire`](Self::acquire);
    /// [`TransferError::Timeout`] if the deadline passes first. A timed-out
    /// acquire consumes nothing.
    pub(crate) fn acquire_timeout(&self, timeout: Duration) -> Result<(), TransferError> {
        let deadline = Instant::now() + timeout;
        let mut count = self.lock();
        loop {
            if count.closed && self.policy == ClosePolicy::Refuse {
                return Err(TransferError::Shutdown);
            }
            if count.permits > 0 {
                count.permits -= 1;
                return Ok(());
            }
            if count.closed {
                return Err(TransferError::Shutdown);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(TransferError::Timeout(timeout));
            }
            let (guard, _timed_out) = self
                .available
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            count = guard;
        }
    }

    /// Returns one permit and wakes a single waiter.
    ///
    /// Releasing stays legal after close: an in-flight transfer that already
    /// held its slot permit still has to publish the matching filled permit
    /// so drain-side waiters can claim the item.
    pub(crate) fn release(&self) {
        let mut count = self.lock();
        count.permits += 1;
        drop(count);
        self.available.notify_one();
    }

    /// Marks the semaphore closed and wakes every waiter. Idempotent.
    pub(crate) fn close(&self) {
        let mut count = self.lock();
        if count.closed {
            return;
        }
        count.closed = true;
        drop(count);
        self.available.notify_all();
    }
}
