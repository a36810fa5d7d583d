//! Run lifecycle for the bounded-buffer exchange.
//!
//! The [`Coordinator`] owns the whole life of one run: it validates the
//! workload up front, builds the one shared queue, spawns every producer
//! and consumer on its own named thread, joins them in the order the
//! shutdown protocol requires, and reports the final accounting.
//!
//! The join order is the protocol: producers first, then `close()`, then
//! consumers. Closing between the two join passes is what turns "a
//! consumer waits for an item that will never arrive" from a hang into a
//! clean early exit.

use std::sync::Arc;
use std::thread;

use basalt_events::{RoleId, WorkItem};
use basalt_queue::{BoundedQueue, InvalidCapacity, RingConfig};
use crucible_config::ExchangeConfig;
use crucible_core::{Consumer, ConsumerReport, Producer, TransferCounters};
use tracing::info;

/// Per-instance workload for one run.
///
/// Targets are explicit per role instance, never derived by integer
/// division of a total, so no item can silently fall out of the plan when
/// counts don't divide evenly. The config layer produces a uniform plan;
/// tests hand-build uneven ones.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub capacity: usize,
    pub producer_targets: Vec<u64>,
    pub consumer_targets: Vec<u64>,
}

impl RunPlan {
    /// Uniform plan from the configuration surface: every producer gets
    /// `items_per_producer`, every consumer `items_per_consumer`.
    pub fn from_config(config: &ExchangeConfig) -> Self {
        Self {
            capacity: config.capacity,
            producer_targets: vec![config.items_per_producer; config.producers],
            consumer_targets: vec![config.items_per_consumer; config.consumers],
        }
    }

    pub fn produced_total(&self) -> u64 {
        self.producer_targets.iter().sum()
    }

    pub fn consumed_total(&self) -> u64 {
        self.consumer_targets.iter().sum()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Capacity(#[from] InvalidCapacity),

    #[error("a run needs at least one producer and one consumer")]
    NoRoles,

    /// The producer side would generate more than the consumer side plus
    /// the ring can absorb. Those producers would park on a full ring with
    /// every consumer already gone, and `close()` cannot retire work a
    /// producer still holds, so the plan is refused before any thread
    /// starts.
    #[error(
        "plan cannot terminate: {excess} surplus items with only {capacity} ring slots to park them"
    )]
    Unschedulable { excess: u64, capacity: usize },

    /// A role thread failed to start. Partial populations are never run:
    /// the whole run aborts so the started side can't block forever.
    #[error("failed to start {role} thread")]
    Spawn {
        role: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{role} thread panicked")]
    RolePanicked { role: String },
}

/// Final accounting of a completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Successful inserts across all producers.
    pub inserted: u64,
    /// Successful removals across all consumers.
    pub removed: u64,
    /// Occupancy after every role terminated. Zero whenever the plan's
    /// totals matched.
    pub final_occupancy: usize,
    /// Per-consumer removal logs, in removal order.
    pub consumers: Vec<ConsumerReport>,
}

/// Builds one queue, drives N producers and M consumers across it, and
/// waits for all of them.
pub struct Coordinator {
    plan: RunPlan,
    ring: RingConfig,
}

impl Coordinator {
    /// Validates the plan so a run that cannot terminate is never started.
    ///
    /// # Errors
    /// - [`EngineError::Capacity`] for a zero-slot ring
    /// - [`EngineError::NoRoles`] if either side is empty
    /// - [`EngineError::Unschedulable`] if surplus production cannot fit
    ///   in the ring once the consumers are done
    pub fn new(plan: RunPlan) -> Result<Self, EngineError> {
        let ring = RingConfig::new(plan.capacity)?;
        if plan.producer_targets.is_empty() || plan.consumer_targets.is_empty() {
            return Err(EngineError::NoRoles);
        }
        let produced = plan.produced_total();
        let consumed = plan.consumed_total();
        if produced > consumed + plan.capacity as u64 {
            return Err(EngineError::Unschedulable {
                excess: produced - consumed - plan.capacity as u64,
                capacity: plan.capacity,
            });
        }
        Ok(Self { plan, ring })
    }

    /// Convenience constructor from the TOML configuration surface.
    pub fn from_config(config: &ExchangeConfig) -> Result<Self, EngineError> {
        Self::new(RunPlan::from_config(config))
    }

    /// Runs the exchange to completion.
    ///
    /// Spawns every role on a named thread, joins all producers, closes
    /// the queue, then joins all consumers. A spawn failure aborts the
    /// whole run (the queue is closed and already-running roles are
    /// joined); a panicking role surfaces as [`EngineError::RolePanicked`]
    /// after the remaining roles have been wound down.
    pub fn run(&self) -> Result<RunReport, EngineError> {
        let queue = Arc::new(BoundedQueue::new(self.ring));
        let counters = Arc::new(TransferCounters::new());

        info!(
            capacity = self.plan.capacity,
            producers = self.plan.producer_targets.len(),
            consumers = self.plan.consumer_targets.len(),
            produced_total = self.plan.produced_total(),
            consumed_total = self.plan.consumed_total(),
            "starting exchange run"
        );

        let mut producer_handles = Vec::with_capacity(self.plan.producer_targets.len());
        for (idx, &target) in self.plan.producer_targets.iter().enumerate() {
            let role = Producer::new(
                RoleId(idx as u16),
                target,
                Arc::clone(&queue),
                Arc::clone(&counters),
            );
            match thread::Builder::new()
                .name(format!("producer-{idx}"))
                .spawn(move || role.run())
            {
                Ok(handle) => producer_handles.push(handle),
                Err(source) => {
                    abort_run(&queue, producer_handles, Vec::new());
                    return Err(EngineError::Spawn {
                        role: "producer",
                        source,
                    });
                }
            }
        }

        let mut consumer_handles = Vec::with_capacity(self.plan.consumer_targets.len());
        for (idx, &target) in self.plan.consumer_targets.iter().enumerate() {
            let role = Consumer::new(
                RoleId(idx as u16),
                target,
                Arc::clone(&queue),
                Arc::clone(&counters),
            );
            match thread::Builder::new()
                .name(format!("consumer-{idx}"))
                .spawn(move || role.run())
            {
                Ok(handle) => consumer_handles.push(handle),
                Err(source) => {
                    abort_run(&queue, producer_handles, consumer_handles);
                    return Err(EngineError::Spawn {
                        role: "consumer",
                        source,
                    });
                }
            }
        }

        // Producers first. A producer only finishes by reaching its target
        // (or by a close that hasn't happened yet), so after this pass the
        // supply side is complete.
        let mut panicked = None;
        for handle in producer_handles {
            if let Err(err) = join_role(handle) {
                panicked.get_or_insert(err);
            }
        }

        // Now close: consumers still waiting past the remaining supply get
        // a shutdown error instead of blocking forever.
        queue.close();

        let mut consumers = Vec::with_capacity(consumer_handles.len());
        for handle in consumer_handles {
            match join_role(handle) {
                Ok(report) => consumers.push(report),
                Err(err) => {
                    panicked.get_or_insert(err);
                }
            }
        }
        if let Some(err) = panicked {
            return Err(err);
        }

        let inserted = counters.inserted();
        let removed = counters.removed();
        let final_occupancy = queue.occupancy();
        info!(
            inserted,
            removed, final_occupancy, "all producers and consumers have finished"
        );

        Ok(RunReport {
            inserted,
            removed,
            final_occupancy,
            consumers,
        })
    }
}

/// Joins one role thread, mapping a panic to an engine error carrying the
/// thread's name.
fn join_role<T>(handle: thread::JoinHandle<T>) -> Result<T, EngineError> {
    let role = handle.thread().name().unwrap_or("role").to_string();
    handle.join().map_err(|_| EngineError::RolePanicked { role })
}

/// Tears down a partially started run: close the queue so blocked roles
/// fail out, then join whatever was already spawned.
fn abort_run(
    queue: &BoundedQueue<WorkItem>,
    producers: Vec<thread::JoinHandle<u64>>,
    consumers: Vec<thread::JoinHandle<ConsumerReport>>,
) {
    queue.close();
    for handle in producers {
        let _ = handle.join();
    }
    for handle in consumers {
        let _ = handle.join();
    }
}
