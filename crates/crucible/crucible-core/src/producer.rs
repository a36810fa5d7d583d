use std::sync::Arc;

use basalt_events::{RoleId, WorkItem};
use basalt_queue::BoundedQueue;
use tracing::{info, warn};

use crate::counters::TransferCounters;

/// One producer instance: generates a bounded stream of tagged items and
/// inserts each into the shared queue, blocking whenever the ring is full.
///
/// The role owns nothing but its identity and target; the queue and the
/// counters arrive as shared handles, so the role never touches ring state
/// directly.
pub struct Producer {
    id: RoleId,
    target: u64,
    queue: Arc<BoundedQueue<WorkItem>>,
    counters: Arc<TransferCounters>,
}

impl Producer {
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
    /// Returns the number of items actually inserted: the full target on a
    /// clean run, fewer only if the queue shut down mid-stream.
    pub fn run(self) -> u64 {
        let mut inserted = 0;
        for seq in 0..self.target {
            let item = WorkItem::new(self.id, seq);
            match self.queue.insert(item) {
                Ok(occupied) => {
                    self.counters.record_insert();
                    inserted += 1;
                    info!(
                        producer = self.id.0,
                        item = item.payload,
                        occupied,
                        "inserted"
                    );
                }
                Err(err) => {
                    warn!(
                        producer = self.id.0,
                        inserted,
                        target = self.target,
                        %err,
                        "producer stopping early"
                    );
                    break;
                }
            }
        }
        info!(producer = self.id.0, inserted, "producer finished");
        inserted
    }
}
