// RoleId identifies one producer or consumer instance for the lifetime of a run.
// repr(transparent) -> struct memory layout is identical to the wrapped u16
// Newtype over u16 so producer and consumer ids can't be mixed up with counts
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RoleId(pub u16);

// The unit transferred through the bounded queue. Plain fixed-size data;
// it moves by value into and out of the ring, never by reference.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkItem {
    /// Which producer generated this item.
    pub producer: RoleId,
    /// Position in that producer's own stream, starting at 0. Consumers can
    /// check per-producer ordering by watching this tag increase.
    pub seq: u64,
    /// The demo value carried through the exchange.
    pub payload: i64,
}

impl WorkItem {
    /// Builds the `seq`-th item of `producer`'s stream.
    ///
    /// The payload is `producer * 100 + seq`, so every item in a run is
    /// distinct and the originating producer is readable off the logged value.
    #[inline]
    pub fn new(producer: RoleId, seq: u64) -> Self {
        Self {
            producer,
            seq,
            payload: producer.0 as i64 * 100 + seq as i64,
        }
    }
}
