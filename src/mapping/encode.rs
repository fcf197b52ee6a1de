//! Varint-delta codec for per-file mapping snapshots
//!
//! The blob is a self-delimiting byte string: a pair count, the base pair,
//! then `(Δseqno, Δtime)` varint pairs. An empty mapping encodes to the
//! empty byte string, mirroring the "no tracking" case.

use bytes::{BufMut, Bytes, BytesMut};

use super::SeqnoTimeMapping;
use crate::config::MAX_PAIRS_PER_TABLE;
use crate::{Result, Seqno, SeqnoTimePair, TideError};

impl SeqnoTimeMapping {
    /// Encode up to `max_entries` pairs covering `[start_seqno, end_seqno]`
    /// into a snapshot blob.
    ///
    /// Candidates older than the newest candidate by more than the
    /// configured aging window are excluded. When more candidates remain
    /// than `max_entries`, the oldest (left anchor) and newest are always
    /// kept and the rest are picked on an even time grid biased toward
    /// newer samples.
    pub fn encode(&self, start_seqno: Seqno, end_seqno: Seqno, max_entries: usize) -> Bytes {
        debug_assert!(self.is_sorted(), "encode on an unsorted mapping");
        if max_entries == 0 {
            return Bytes::new();
        }

        let lo = self.pairs.partition_point(|p| p.seqno < start_seqno);
        let hi = self.pairs.partition_point(|p| p.seqno <= end_seqno);
        let mut window = &self.pairs[lo..hi];
        if window.is_empty() {
            return Bytes::new();
        }

        if self.max_time_duration > 0 {
            let newest = window[window.len() - 1].time;
            let horizon = newest.saturating_sub(self.max_time_duration);
            let cut = window.partition_point(|p| p.time < horizon);
            window = &window[cut..];
        }

        if window.len() <= max_entries {
            encode_pairs(window)
        } else {
            encode_pairs(&subsample(window, max_entries))
        }
    }

    /// Decode a snapshot blob, adding its pairs to this mapping.
    ///
    /// A single blob decoded into an empty mapping is already sorted;
    /// merging several requires a [`sort`](Self::sort) before querying.
    pub fn add_encoded(&mut self, blob: &[u8]) -> Result<()> {
        for pair in decode_pairs(blob, MAX_PAIRS_PER_TABLE)? {
            self.push_decoded(pair);
        }
        Ok(())
    }
}

/// Pick `max_entries` of the window's pairs: both ends, then one pair per
/// ideal time grid line walking from the newest toward the oldest, with any
/// leftover budget spent on the newest skipped samples.
fn subsample(window: &[SeqnoTimePair], max_entries: usize) -> Vec<SeqnoTimePair> {
    let n = window.len();
    debug_assert!(n > max_entries && max_entries > 0);
    if max_entries == 1 {
        return vec![window[n - 1]];
    }

    let oldest = window[0];
    let newest = window[n - 1];
    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;
    let mut kept = 2;

    let span = newest.time - oldest.time;
    let stride = (span / (max_entries as u64 - 1)).max(1);
    let mut target = newest.time.saturating_sub(stride);
    while kept < max_entries && target > oldest.time {
        // Oldest sample at or after this grid line.
        let pos = window.partition_point(|p| p.time < target);
        if pos > 0 && pos < n - 1 && !keep[pos] {
            keep[pos] = true;
            kept += 1;
        }
        match target.checked_sub(stride) {
            Some(next) => target = next,
            None => break,
        }
    }

    // Grid lines can collapse onto the same sample when times cluster; give
    // the leftover budget to the newest skipped samples.
    let mut idx = n - 1;
    while kept < max_entries && idx > 1 {
        idx -= 1;
        if !keep[idx] {
            keep[idx] = true;
            kept += 1;
        }
    }

    window
        .iter()
        .zip(keep)
        .filter_map(|(pair, k)| k.then_some(*pair))
        .collect()
}

fn encode_pairs(pairs: &[SeqnoTimePair]) -> Bytes {
    if pairs.is_empty() {
        return Bytes::new();
    }
    let mut buf = BytesMut::new();
    put_varint(&mut buf, pairs.len() as u64);
    put_varint(&mut buf, pairs[0].seqno);
    put_varint(&mut buf, pairs[0].time);
    for w in pairs.windows(2) {
        put_varint(&mut buf, w[1].seqno - w[0].seqno);
        put_varint(&mut buf, w[1].time - w[0].time);
    }
    buf.freeze()
}

fn decode_pairs(blob: &[u8], max_entries: usize) -> Result<Vec<SeqnoTimePair>> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    let mut input = blob;

    let count = get_varint(&mut input)?;
    if count == 0 {
        return Err(corrupt("zero pair count"));
    }
    if count > max_entries as u64 {
        return Err(corrupt("pair count exceeds per-table cap"));
    }
    let count = count as usize;

    let mut prev = SeqnoTimePair::new(get_varint(&mut input)?, get_varint(&mut input)?);
    if prev.has_sentinel() {
        return Err(corrupt("sentinel base pair"));
    }
    let mut pairs = Vec::with_capacity(count);
    pairs.push(prev);

    for _ in 1..count {
        let delta_seqno = get_varint(&mut input)?;
        let delta_time = get_varint(&mut input)?;
        if delta_seqno == 0 {
            return Err(corrupt("non-increasing seqno delta"));
        }
        let seqno = prev
            .seqno
            .checked_add(delta_seqno)
            .ok_or_else(|| corrupt("seqno delta overflows u64"))?;
        let time = prev
            .time
            .checked_add(delta_time)
            .ok_or_else(|| corrupt("time delta overflows u64"))?;
        prev = SeqnoTimePair::new(seqno, time);
        pairs.push(prev);
    }

    if !input.is_empty() {
        return Err(corrupt("trailing bytes after mapping blob"));
    }
    Ok(pairs)
}

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn get_varint(input: &mut &[u8]) -> Result<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let (&byte, rest) = input
            .split_first()
            .ok_or_else(|| corrupt("truncated varint"))?;
        *input = rest;
        if shift == 63 && byte > 1 {
            return Err(corrupt("varint overflows u64"));
        }
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
        if shift > 63 {
            return Err(corrupt("varint too long"));
        }
    }
}

fn corrupt(msg: &str) -> TideError {
    TideError::CorruptBlob(msg.to_string())
}
