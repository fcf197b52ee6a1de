//! Age-based data placement
//!
//! Compaction hands this module a horizon and gets back a sequence-number
//! cutoff: records at or below the cutoff are older than the horizon and
//! can be demoted to the cold tier. The classification is one-sided: when
//! in doubt (no samples, corrupt properties, disabled tracking) records
//! stay hot.

use tracing::debug;

use crate::config::MAX_PAIRS_PER_TABLE;
use crate::mapping::SeqnoTimeMapping;
use crate::snapshot::MappingProperty;
use crate::{Result, Seqno, UnixSeconds, UNKNOWN_SEQNO_BEFORE_ALL};

/// Storage tier for a record decided during compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Keep on the regular (penultimate-level) output.
    Hot,
    /// Demote to the last-level, cheaper output.
    Cold,
}

/// Placement contract consumed by compaction.
#[derive(Debug, Clone, Copy)]
pub struct PlacementPolicy {
    preclude_seconds: u64,
}

impl PlacementPolicy {
    /// Create a policy demoting records older than `preclude_seconds`.
    /// Zero disables demotion entirely.
    pub fn new(preclude_seconds: u64) -> Self {
        Self { preclude_seconds }
    }

    /// Largest seqno whose records count as old at time `now`.
    ///
    /// Returns [`UNKNOWN_SEQNO_BEFORE_ALL`] when demotion is disabled or no
    /// sample proves any record old enough.
    pub fn seqno_cutoff(&self, mapping: &SeqnoTimeMapping, now: UnixSeconds) -> Seqno {
        if self.preclude_seconds == 0 {
            return UNKNOWN_SEQNO_BEFORE_ALL;
        }
        let horizon = now.saturating_sub(self.preclude_seconds);
        let cutoff = mapping.proximal_seqno_before_time(horizon);
        debug!(now, horizon, cutoff, "computed placement cutoff");
        cutoff
    }

    /// Classify a record against a cutoff from [`seqno_cutoff`](Self::seqno_cutoff).
    pub fn classify(cutoff: Seqno, seqno: Seqno) -> Tier {
        if cutoff == UNKNOWN_SEQNO_BEFORE_ALL || seqno > cutoff {
            Tier::Hot
        } else {
            Tier::Cold
        }
    }
}

/// Build a compaction job's private working mapping from the property
/// blobs of its input files.
///
/// A corrupt blob degrades that file to "no mapping" instead of failing
/// the compaction; its records will classify as hot.
pub fn working_mapping<'a, I>(blobs: I) -> Result<SeqnoTimeMapping>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut merged = Vec::new();
    let mut files = 0usize;
    for blob in blobs {
        files += 1;
        let decoded =
            MappingProperty::from_bytes(bytes::Bytes::copy_from_slice(blob)).decode_or_empty();
        merged.extend_from_slice(decoded.pairs());
    }

    let capacity = (files * MAX_PAIRS_PER_TABLE).max(MAX_PAIRS_PER_TABLE);
    let mut mapping = SeqnoTimeMapping::new(capacity, 0)?;
    for pair in merged {
        mapping.add(pair.seqno, pair.time);
    }
    mapping.sort()?;
    Ok(mapping)
}
