//! Core types for TideDB

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number assigned by the engine to each write
pub type Seqno = u64;

/// Wall-clock time in seconds since a fixed, instance-consistent epoch
pub type UnixSeconds = u64;

/// Sentinel: no sequence number is known to precede the queried time.
pub const UNKNOWN_SEQNO_BEFORE_ALL: Seqno = 0;

/// Sentinel: no time is known to precede the queried sequence number.
pub const UNKNOWN_TIME_BEFORE_ALL: UnixSeconds = 0;

/// A sampled association between a sequence number and a wall-clock time.
///
/// A pair `(s, t)` records that seqno `s` was assigned at or before time
/// `t`, and that time `t` is after seqno `s` was assigned. Ordering is
/// lexicographic by `(seqno, time)`. Zero seqno and zero time are reserved
/// as sentinels and never stored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SeqnoTimePair {
    /// Sequence number
    pub seqno: Seqno,
    /// Sample time in seconds
    pub time: UnixSeconds,
}

impl SeqnoTimePair {
    /// Create a new pair
    pub fn new(seqno: Seqno, time: UnixSeconds) -> Self {
        Self { seqno, time }
    }

    /// True if either field holds a reserved sentinel value
    pub fn has_sentinel(&self) -> bool {
        self.seqno == UNKNOWN_SEQNO_BEFORE_ALL || self.time == UNKNOWN_TIME_BEFORE_ALL
    }
}

impl fmt::Display for SeqnoTimePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.seqno, self.time)
    }
}
