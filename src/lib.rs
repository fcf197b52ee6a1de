//! TideDB Core - Age Tracking for Tiered LSM Storage
//!
//! This crate is the age-tracking core of the TideDB storage engine: a
//! compact, bounded mapping from write sequence numbers to wall-clock time,
//! and the machinery around it that lets compaction place old records on
//! cheaper storage.
//!
//! # Architecture
//!
//! - **Mapping**: sorted, bounded seqno/time samples with two proximal
//!   queries (time known to precede a seqno, seqno known to precede a time)
//! - **Sampler**: periodic driver that appends `(latest_seqno, now)` pairs
//!   at a cadence derived from the tracked duration
//! - **Snapshot**: varint-delta blob embedded in table-file properties,
//!   reconstructed when compaction opens the file
//! - **Placement**: the hot/cold cutoff contract consumed by compaction

pub mod mapping;
pub mod placement;
pub mod sampler;
pub mod snapshot;

mod error;
mod types;

pub use error::{Result, TideError};
pub use types::*;

/// TideDB version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod config {
    /// Maximum samples held in the database-level in-memory mapping.
    ///
    /// Also the divisor for the sampling period: tracking a duration `D`
    /// with this many slots samples roughly every `D / MAX_PAIRS_IN_MEMORY`
    /// seconds.
    pub const MAX_PAIRS_IN_MEMORY: usize = 100;

    /// Maximum pairs embedded in a single table file's property blob.
    ///
    /// Doubles as the hard cap enforced when decoding a blob.
    pub const MAX_PAIRS_PER_TABLE: usize = 100;
}
