//! Shared helpers for the queue benchmarks.

use basalt_events::{RoleId, WorkItem};
use basalt_queue::{BoundedQueue, RingConfig};

/// Fixed item used across benches so runs stay comparable.
pub fn make_test_item() -> WorkItem {
    WorkItem::new(RoleId(1), 0)
}

/// Builds a queue or panics; benches have no error surface worth wiring.
pub fn make_queue(capacity: usize) -> BoundedQueue<WorkItem> {
    BoundedQueue::new(RingConfig::new(capacity).expect("bench capacity must be positive"))
}
