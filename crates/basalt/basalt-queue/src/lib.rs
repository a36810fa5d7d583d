mod queue;
mod ring;
mod semaphore;

pub use queue::{BoundedQueue, TransferError, TransferTotals};
pub use ring::{InvalidCapacity, RingConfig};
