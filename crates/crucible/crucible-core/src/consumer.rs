use std::sync::Arc;

use basalt_events::{RoleId, WorkItem};
use basalt_queue::BoundedQueue;
use tracing::{info, warn};

use crate::counters::TransferCounters;

/// What one consumer instance saw, in removal order.
///
/// Keeping the removed items (not just a count) lets the caller check
/// conservation and per-producer ordering after the run.
#[derive(Debug)]
pub struct ConsumerReport {
    pub id: RoleId,
    pub items: Vec<WorkItem>,
}

impl ConsumerReport {
    pub fn removed(&self) -> u64 {
        self.items.len() as u64
    }
}

/// One consumer instance: removes a bounded number of items from the
/// shared queue, blocking whenever the ring is empty.
pub struct Consumer {
    id: RoleId,
    target: u64,
    queue: Arc<BoundedQueue<WorkItem>>,
    counters: Arc<TransferCounters>,
}

impl Consumer {
    pub fn new(
        id: RoleId,
        target: u64,
        queue: Arc<BoundedQueue<WorkItem>>,
        counters: Arc<TransferCounters>,
    ) -> Self {
        Self {
            id,
            target,
            queue,
            counters,
        }
    }

    /// Runs to completion on the calling thread.
    ///
    /// Stops at the target, or earlier with a clean exit if the queue is
    /// closed and drained before the target is reached.
    pub fn run(self) -> ConsumerReport {
        let mut items = Vec::with_capacity(self.target as usize);
        for _ in 0..self.target {
            match self.queue.remove() {
                Ok((item, occupied)) => {
                    self.counters.record_remove();
                    info!(
                        consumer = self.id.0,
                        producer = item.producer.0,
                        item = item.payload,
                        occupied,
                        "removed"
                    );
                    items.push(item);
                }
                Err(err) => {
                    warn!(
                        consumer = self.id.0,
                        removed = items.len(),
                        target = self.target,
                        %err,
                        "consumer stopping early"
                    );
                    break;
                }
            }
        }
        info!(consumer = self.id.0, removed = items.len(), "consumer finished");
        ConsumerReport {
            id: self.id,
            items,
        }
    }
}
