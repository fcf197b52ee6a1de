//! Seqno-to-time mapping
//!
//! A bounded, sorted sequence of [`SeqnoTimePair`] samples that answers two
//! inverse questions approximately and one-sidedly:
//!
//! - the latest time known to be before a given sequence number
//! - the largest sequence number known to be assigned at or before a time
//!
//! One logical owner appends samples in order; compaction jobs build their
//! own working mappings by merging per-file blobs and sorting.

mod encode;

use crate::{
    Result, Seqno, SeqnoTimePair, TideError, UnixSeconds, UNKNOWN_SEQNO_BEFORE_ALL,
    UNKNOWN_TIME_BEFORE_ALL,
};

/// Sorted, bounded collection of seqno/time samples.
///
/// Stored pairs keep seqno strictly increasing and time non-decreasing, and
/// never contain sentinel (zero) fields. `size <= max_capacity` holds after
/// every mutation on a clean mapping and after [`sort`](Self::sort) on a
/// merged one.
#[derive(Debug, Clone)]
pub struct SeqnoTimeMapping {
    pairs: Vec<SeqnoTimePair>,
    max_capacity: usize,
    max_time_duration: u64,
    /// False after unchecked inserts until the next `sort`.
    sorted: bool,
}

impl SeqnoTimeMapping {
    /// Create an empty mapping with the given bounds.
    ///
    /// `max_time_duration` is the aging window in seconds; zero disables
    /// age-based truncation.
    pub fn new(max_capacity: usize, max_time_duration: u64) -> Result<Self> {
        if max_capacity == 0 {
            return Err(TideError::InvalidArgument(
                "mapping capacity must be nonzero".to_string(),
            ));
        }
        Ok(Self {
            pairs: Vec::new(),
            max_capacity,
            max_time_duration,
            sorted: true,
        })
    }

    /// Append a sample, keeping the mapping sorted.
    ///
    /// Returns true iff the pair was stored. Pairs with a sentinel field,
    /// out-of-order pairs, and pairs that repeat the last seqno are
    /// rejected. A newer seqno at the last pair's exact time replaces the
    /// last pair in place, tightening the seqno upper bound for that time.
    pub fn append(&mut self, seqno: Seqno, time: UnixSeconds) -> bool {
        debug_assert!(self.sorted, "append on an unsorted mapping");
        if seqno == UNKNOWN_SEQNO_BEFORE_ALL || time == UNKNOWN_TIME_BEFORE_ALL {
            return false;
        }

        let pair = SeqnoTimePair::new(seqno, time);
        let Some(&last) = self.pairs.last() else {
            self.pairs.push(pair);
            return true;
        };

        if seqno < last.seqno || time < last.time {
            return false;
        }
        if seqno == last.seqno {
            // Keeping the earlier time gives strictly better answers for
            // proximal_seqno_before_time.
            return false;
        }
        if time == last.time {
            if let Some(slot) = self.pairs.last_mut() {
                slot.seqno = seqno;
            }
            return true;
        }

        self.pairs.push(pair);
        self.enforce_capacity(time);
        true
    }

    /// Unchecked insert used when merging multiple sources.
    ///
    /// Pairs may arrive unordered and may duplicate; call
    /// [`sort`](Self::sort) before querying.
    pub fn add(&mut self, seqno: Seqno, time: UnixSeconds) {
        self.pairs.push(SeqnoTimePair::new(seqno, time));
        self.sorted = false;
    }

    /// Restore the sorted, deduplicated form after unchecked inserts.
    ///
    /// Sorts by `(seqno, time)`, then drops sentinel pairs, repeated seqnos
    /// (the first kept pair has the smallest time and is the better entry),
    /// and pairs whose time falls below the running maximum (an earlier
    /// seqno already covers a later or equal time). Finally clamps to
    /// capacity from the oldest end.
    pub fn sort(&mut self) -> Result<()> {
        if self.sorted {
            return Ok(());
        }
        self.pairs.sort();

        let mut kept: Vec<SeqnoTimePair> = Vec::with_capacity(self.pairs.len());
        for pair in std::mem::take(&mut self.pairs) {
            if pair.has_sentinel() {
                continue;
            }
            if let Some(prev) = kept.last() {
                if pair.seqno == prev.seqno || pair.time < prev.time {
                    continue;
                }
            }
            kept.push(pair);
        }
        self.pairs = kept;

        if self.pairs.len() > self.max_capacity {
            let excess = self.pairs.len() - self.max_capacity;
            self.pairs.drain(..excess);
        }
        self.sorted = true;

        if !self.invariants_hold() {
            return Err(TideError::Internal(
                "mapping invariants violated after sort".to_string(),
            ));
        }
        Ok(())
    }

    /// Age out entries older than `now - max_time_duration`.
    ///
    /// The newest pair at or before the horizon is retained as the left
    /// anchor, so a non-empty mapping never becomes empty and a query at
    /// the horizon still has an answer after a long idle period.
    pub fn truncate_old_entries(&mut self, now: UnixSeconds) {
        debug_assert!(self.sorted, "truncate on an unsorted mapping");
        if self.max_time_duration == 0 || self.pairs.is_empty() {
            return;
        }
        let horizon = now.saturating_sub(self.max_time_duration);
        // First index with time past the horizon; the entry just before it
        // anchors the left end of the time axis.
        let first_kept = self.pairs.partition_point(|p| p.time <= horizon);
        if first_kept > 1 {
            self.pairs.drain(..first_kept - 1);
        }
    }

    /// Time of the largest stored pair with `seqno` strictly below `seqno`.
    ///
    /// Returns [`UNKNOWN_TIME_BEFORE_ALL`] when no stored pair precedes the
    /// seqno. Equality is excluded: a pair `(s, t)` means time `t` is known
    /// to be after seqno `s`, not at it.
    pub fn proximal_time_before_seqno(&self, seqno: Seqno) -> UnixSeconds {
        debug_assert!(self.sorted, "query on an unsorted mapping");
        let idx = self.pairs.partition_point(|p| p.seqno < seqno);
        if idx == 0 {
            UNKNOWN_TIME_BEFORE_ALL
        } else {
            self.pairs[idx - 1].time
        }
    }

    /// Seqno of the largest stored pair with `time` at or before `time`.
    ///
    /// Returns [`UNKNOWN_SEQNO_BEFORE_ALL`] when no stored pair is old
    /// enough. Equality is included: a pair `(s, t)` means seqno `s` was
    /// assigned at or before time `t`.
    pub fn proximal_seqno_before_time(&self, time: UnixSeconds) -> Seqno {
        debug_assert!(self.sorted, "query on an unsorted mapping");
        let idx = self.pairs.partition_point(|p| p.time <= time);
        if idx == 0 {
            UNKNOWN_SEQNO_BEFORE_ALL
        } else {
            self.pairs[idx - 1].seqno
        }
    }

    /// Replace the capacity and aging bounds, clamping from the oldest end
    /// if the new capacity is smaller than the current size.
    pub fn set_bounds(&mut self, max_capacity: usize, max_time_duration: u64) -> Result<()> {
        if max_capacity == 0 {
            return Err(TideError::InvalidArgument(
                "mapping capacity must be nonzero".to_string(),
            ));
        }
        self.max_capacity = max_capacity;
        self.max_time_duration = max_time_duration;
        if self.sorted && self.pairs.len() > self.max_capacity {
            let excess = self.pairs.len() - self.max_capacity;
            self.pairs.drain(..excess);
        }
        Ok(())
    }

    /// Remove all stored pairs.
    pub fn clear(&mut self) {
        self.pairs.clear();
        self.sorted = true;
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Read view over the stored pairs.
    pub fn pairs(&self) -> &[SeqnoTimePair] {
        &self.pairs
    }

    /// Configured aging window in seconds (zero = unlimited).
    pub fn max_time_duration(&self) -> u64 {
        self.max_time_duration
    }

    /// Empty mapping bounded by the per-table pair cap, for decoding file
    /// property blobs. Infallible: the cap is a nonzero constant.
    pub(crate) fn per_table() -> Self {
        Self {
            pairs: Vec::new(),
            max_capacity: crate::config::MAX_PAIRS_PER_TABLE,
            max_time_duration: 0,
            sorted: true,
        }
    }

    pub(crate) fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub(crate) fn push_decoded(&mut self, pair: SeqnoTimePair) {
        // Blob pairs are monotone by construction, so decoding into an
        // empty mapping keeps it clean; merging marks it dirty.
        if !self.pairs.is_empty() {
            self.sorted = false;
        }
        self.pairs.push(pair);
    }

    fn enforce_capacity(&mut self, now: UnixSeconds) {
        if self.pairs.len() <= self.max_capacity {
            return;
        }
        self.truncate_old_entries(now);
        if self.pairs.len() > self.max_capacity {
            let excess = self.pairs.len() - self.max_capacity;
            self.pairs.drain(..excess);
        }
    }

    fn invariants_hold(&self) -> bool {
        if self.pairs.len() > self.max_capacity {
            return false;
        }
        if self.pairs.iter().any(|p| p.has_sentinel()) {
            return false;
        }
        self.pairs
            .windows(2)
            .all(|w| w[0].seqno < w[1].seqno && w[0].time <= w[1].time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn mapping(capacity: usize, duration: u64) -> SeqnoTimeMapping {
        SeqnoTimeMapping::new(capacity, duration).unwrap()
    }

    fn assert_invariants(m: &SeqnoTimeMapping) {
        assert!(m.len() <= 1000);
        for pair in m.pairs() {
            assert!(pair.seqno > 0);
            assert!(pair.time > 0);
        }
        for w in m.pairs().windows(2) {
            assert!(w[0].seqno < w[1].seqno);
            assert!(w[0].time <= w[1].time);
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(
            SeqnoTimeMapping::new(0, 100),
            Err(TideError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_append_rejects_sentinels() {
        let mut m = mapping(10, 100);
        assert!(!m.append(0, 9));
        assert!(!m.append(9, 0));
        assert!(m.is_empty());
    }

    #[test]
    fn test_append_rejects_out_of_order() {
        let mut m = mapping(10, 100);
        assert!(m.append(10, 500));
        assert!(!m.append(9, 600));
        assert!(!m.append(11, 499));
        assert!(!m.append(10, 600));
        assert!(!m.append(10, 400));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_replace_last_on_same_time_burst() {
        let mut m = mapping(10, 100);
        assert!(m.append(10, 500));
        assert!(m.append(20, 500));
        assert_eq!(m.len(), 1);
        assert_eq!(m.pairs()[0], SeqnoTimePair::new(20, 500));
        assert_eq!(m.proximal_seqno_before_time(500), 20);
    }

    #[test]
    fn test_proximal_queries() {
        let mut m = mapping(10, 1000);
        assert!(m.append(10, 500));
        assert!(m.append(20, 600));
        assert!(m.append(30, 700));

        assert_eq!(m.proximal_time_before_seqno(10), UNKNOWN_TIME_BEFORE_ALL);
        assert_eq!(m.proximal_time_before_seqno(11), 500);
        assert_eq!(m.proximal_time_before_seqno(20), 500);
        assert_eq!(m.proximal_time_before_seqno(21), 600);

        assert_eq!(m.proximal_seqno_before_time(499), UNKNOWN_SEQNO_BEFORE_ALL);
        assert_eq!(m.proximal_seqno_before_time(500), 10);
        assert_eq!(m.proximal_seqno_before_time(599), 10);
        assert_eq!(m.proximal_seqno_before_time(600), 20);
        assert_eq!(m.proximal_seqno_before_time(700), 30);
    }

    #[test]
    fn test_queries_on_empty() {
        let m = mapping(10, 100);
        assert_eq!(m.proximal_time_before_seqno(42), UNKNOWN_TIME_BEFORE_ALL);
        assert_eq!(m.proximal_seqno_before_time(42), UNKNOWN_SEQNO_BEFORE_ALL);
    }

    #[test]
    fn test_truncate_preserves_last() {
        let mut m = mapping(10, 42);
        for i in 1..=5u64 {
            assert!(m.append(i * 10, 400 + i * 100));
        }
        assert_eq!(m.len(), 5);

        m.truncate_old_entries(600 + 42);
        assert_eq!(m.len(), 4);

        m.truncate_old_entries(899 + 42);
        assert_eq!(m.len(), 2);

        m.truncate_old_entries(10_000_000);
        assert_eq!(m.len(), 1);
        assert_eq!(m.proximal_seqno_before_time(10_000_000), 50);
    }

    #[test]
    fn test_truncate_idempotent() {
        let mut m = mapping(10, 42);
        for i in 1..=5u64 {
            assert!(m.append(i * 10, 400 + i * 100));
        }
        m.truncate_old_entries(941);
        let after_first: Vec<_> = m.pairs().to_vec();
        m.truncate_old_entries(941);
        assert_eq!(m.pairs(), after_first.as_slice());
    }

    #[test]
    fn test_sort_dedups_and_drops_useless() {
        let mut m = mapping(100, 0);
        for (s, t) in [
            (10, 11),
            (10, 11),
            (10, 9),
            (11, 9),
            (9, 8),
            (1, 10),
            (100, 100),
        ] {
            m.add(s, t);
        }
        m.sort().unwrap();
        assert_eq!(
            m.pairs(),
            &[
                SeqnoTimePair::new(1, 10),
                SeqnoTimePair::new(10, 11),
                SeqnoTimePair::new(100, 100),
            ]
        );
    }

    #[test]
    fn test_sort_drops_sentinels_and_is_idempotent() {
        let mut m = mapping(100, 0);
        m.add(0, 7);
        m.add(7, 0);
        m.add(3, 5);
        m.add(8, 6);
        m.sort().unwrap();
        let once: Vec<_> = m.pairs().to_vec();
        assert_eq!(
            once,
            vec![SeqnoTimePair::new(3, 5), SeqnoTimePair::new(8, 6)]
        );

        m.sort().unwrap();
        assert_eq!(m.pairs(), once.as_slice());
    }

    #[test]
    fn test_sort_clamps_to_capacity() {
        let mut m = mapping(3, 0);
        for i in 1..=10u64 {
            m.add(i, i);
        }
        m.sort().unwrap();
        assert_eq!(m.len(), 3);
        // Newest survive.
        assert_eq!(m.pairs()[0], SeqnoTimePair::new(8, 8));
        assert_eq!(m.pairs()[2], SeqnoTimePair::new(10, 10));
    }

    #[test]
    fn test_append_capacity_ages_then_drops_front() {
        let mut m = mapping(4, 50);
        for i in 1..=4u64 {
            assert!(m.append(i, i * 100));
        }
        // 5th append ages out entries older than 500 - 50.
        assert!(m.append(5, 500));
        assert!(m.len() <= 4);
        assert_eq!(m.pairs().last().unwrap().seqno, 5);
        for w in m.pairs().windows(2) {
            assert!(w[0].seqno < w[1].seqno);
        }
    }

    #[test]
    fn test_set_bounds_shrinks_from_front() {
        let mut m = mapping(10, 0);
        for i in 1..=6u64 {
            assert!(m.append(i, i));
        }
        m.set_bounds(2, 0).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.pairs()[0].seqno, 5);
        assert!(m.set_bounds(0, 0).is_err());
    }

    #[test]
    fn test_random_appends_keep_invariants() {
        let mut rng = rand::thread_rng();
        let mut m = mapping(64, 500);
        let mut seqno = 0u64;
        let mut time = 1u64;
        for _ in 0..2000 {
            // A mix of in-order, repeated, and regressed samples.
            seqno += rng.gen_range(0..5);
            if rng.gen_bool(0.8) {
                time += rng.gen_range(0..30);
            } else if time > 10 {
                time -= rng.gen_range(0..10);
            }
            m.append(seqno, time);
            assert!(m.len() <= 64);
        }
        assert_invariants(&m);
    }
}
