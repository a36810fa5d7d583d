//! Blocking multi-producer/multi-consumer bounded queue.
//!
//! One fixed-capacity ring shared by any number of producer and consumer
//! threads. Capacity is enforced with two counting semaphores (free slots
//! and filled slots) while a single mutex serializes the brief cursor
//! mutation. The split matters:
//!
//! - the semaphores carry the blocking contract (a full ring parks
//!   inserters, an empty ring parks removers),
//! - the mutex only serializes the cursor/occupancy update and is never
//!   held across a wait, so no thread can sleep inside the critical region.
//!
//! # Transfer protocol
//!
//! **Insert:**
//! 1. Wait on the free-slot count (the only suspension point)
//! 2. Lock the ring, place the item at the write cursor, advance it,
//!    bump occupancy
//! 3. Drop the lock, then signal the filled-slot count
//!
//! **Remove** is the mirror image: wait on filled, mutate under the lock,
//! signal free. Signaling after the lock is dropped keeps the critical
//! region down to the handful of instructions that actually need it.
//!
//! # Ordering
//!
//! The ring is FIFO. With a single producer, removal order equals insertion
//! order; with several producers, each producer's own items still come out
//! in the order that producer inserted them, but the interleaving across
//! producers is whatever the scheduler made of it.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::ring::{RingConfig, advance_cursor};
use crate::semaphore::{ClosePolicy, Semaphore};

/// Why a transfer operation gave up.
///
/// Both kinds are local to the one call that raised them; the queue state
/// stays consistent and every other thread keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    /// The queue was closed, either before the call or while it was
    /// waiting. The role driving this thread should wind down.
    #[error("bounded queue is closed")]
    Shutdown,
    /// A bounded wait expired before a slot or an item became available.
    /// Retrying is legitimate; the attempted transfer consumed nothing.
    #[error("timed out after {0:?} waiting on the bounded queue")]
    Timeout(Duration),
}

/// Cumulative transfer totals since construction.
///
/// `inserted - removed` always equals the occupancy observed at the same
/// instant; the queue keeps the counts under the cursor mutex so the
/// equality holds at every point where no transfer is mid-flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTotals {
    pub inserted: u64,
    pub removed: u64,
}

struct RingState<T> {
    /// One slot per capacity unit. `None` = free, `Some` = awaiting removal.
    storage: Vec<Option<T>>,
    /// Next slot an insert writes to.
    write_cursor: usize,
    /// Next slot a remove takes from.
    read_cursor: usize,
    /// Filled slot count, `0 ..= capacity`.
    occupied: usize,
    inserted: u64,
    removed: u64,
    closed: bool,
}

/// The shared bounded buffer.
///
/// The queue is the sole owner of its storage: items move in and out by
/// value, and no caller ever holds a reference to a slot. Cloning an `Arc`
/// around the queue is the intended way to hand it to producer and
/// consumer threads.
///
/// `T` is opaque to the queue; it is stored, never inspected.
pub struct BoundedQueue<T> {
    ring: Mutex<RingState<T>>,
    /// Counts free slots; inserters wait here. Refuses immediately on close.
    free_slots: Semaphore,
    /// Counts filled slots; removers wait here. Drains remaining items on
    /// close before refusing.
    filled_slots: Semaphore,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Builds an empty queue with `config.capacity()` slots.
    pub fn new(config: RingConfig) -> Self {
        let capacity = config.capacity();
        Self {
            ring: Mutex::new(RingState {
                storage: std::iter::repeat_with(|| None).take(capacity).collect(),
                write_cursor: 0,
                read_cursor: 0,
                occupied: 0,
                inserted: 0,
                removed: 0,
                closed: false,
            }),
            free_slots: Semaphore::new(capacity, ClosePolicy::Refuse),
            filled_slots: Semaphore::new(0, ClosePolicy::Drain),
            capacity,
        }
    }

    /// Cursor state is rebuilt-consistent regardless of where a panicking
    /// thread died, because slots only change together with the counters
    /// inside this lock; recover poison instead of propagating it.
    fn lock_ring(&self) -> MutexGuard<'_, RingState<T>> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Places an item, blocking while the ring is full.
    ///
    /// Returns the occupancy observed immediately after the item landed,
    /// taken inside the critical region so callers can log it truthfully.
    ///
    /// # Errors
    /// [`TransferError::Shutdown`] if the queue is closed before or while
    /// waiting; the item is dropped in that case, since the producer behind
    /// it is terminating anyway. An accepted item is never dropped.
    pub fn insert(&self, item: T) -> Result<usize, TransferError> {
        self.free_slots.acquire()?;
        let occupied = self.place(item);
        self.filled_slots.release();
        Ok(occupied)
    }

    /// [`insert`](Self::insert) with a bounded wait for the free slot.
    ///
    /// # Errors
    /// [`TransferError::Timeout`] if no slot frees up within `timeout`;
    /// [`TransferError::Shutdown`] as for `insert`.
    pub fn insert_timeout(&self, item: T, timeout: Duration) -> Result<usize, TransferError> {
        self.free_slots.acquire_timeout(timeout)?;
        let occupied = self.place(item);
        self.filled_slots.release();
        Ok(occupied)
    }

    /// Takes the oldest item, blocking while the ring is empty.
    ///
    /// Returns the item together with the occupancy observed immediately
    /// after it was taken.
    ///
    /// # Errors
    /// [`TransferError::Shutdown`] once the queue is closed *and* empty;
    /// items inserted before the close are always handed out first.
    pub fn remove(&self) -> Result<(T, usize), TransferError> {
        self.filled_slots.acquire()?;
        let taken = self.take();
        self.free_slots.release();
        Ok(taken)
    }

    /// [`remove`](Self::remove) with a bounded wait for an item.
    pub fn remove_timeout(&self, timeout: Duration) -> Result<(T, usize), TransferError> {
        self.filled_slots.acquire_timeout(timeout)?;
        let taken = self.take();
        self.free_slots.release();
        Ok(taken)
    }

    /// Closes the queue and wakes every blocked thread. Idempotent.
    ///
    /// Inserters fail from this point on. Removers keep succeeding until
    /// the remaining items are drained, then fail. Concurrent `close`
    /// calls race harmlessly: the first one through the ring lock wins and
    /// the rest return early.
    pub fn close(&self) {
        {
            let mut ring = self.lock_ring();
            if ring.closed {
                return;
            }
            ring.closed = true;
        }
        self.free_slots.close();
        self.filled_slots.close();
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock_ring().closed
    }

    /// Filled slot count at this instant. Snapshot only; another thread
    /// may transfer before the caller looks at it.
    pub fn occupancy(&self) -> usize {
        self.lock_ring().occupied
    }

    /// Number of slots, fixed at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cumulative inserted/removed counts.
    pub fn totals(&self) -> TransferTotals {
        let ring = self.lock_ring();
        TransferTotals {
            inserted: ring.inserted,
            removed: ring.removed,
        }
    }

    /// The critical region of the insert path. Caller holds a free-slot
    /// permit, so the ring cannot be full here.
    fn place(&self, item: T) -> usize {
        let mut ring = self.lock_ring();
        debug_assert!(ring.occupied < self.capacity, "insert ran on a full ring");
        let cursor = ring.write_cursor;
        debug_assert!(
            ring.storage[cursor].is_none(),
            "write cursor landed on an occupied slot"
        );
        ring.storage[cursor] = Some(item);
        ring.write_cursor = advance_cursor(cursor, self.capacity);
        ring.occupied += 1;
        ring.inserted += 1;
        ring.occupied
    }

    /// The critical region of the remove path. Caller holds a filled-slot
    /// permit, so the ring cannot be empty here.
    fn take(&self) -> (T, usize) {
        let mut ring = self.lock_ring();
        debug_assert!(ring.occupied > 0, "remove ran on an empty ring");
        let cursor = ring.read_cursor;
        // The filled-slot permit guarantees this slot holds an item.
        let item = ring.storage[cursor]
            .take()
            .expect("filled-slot permit granted but the slot was empty");
        ring.read_cursor = advance_cursor(cursor, self.capacity);
        ring.occupied -= 1;
        ring.removed += 1;
        (item, ring.occupied)
    }
}
