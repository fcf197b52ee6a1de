//! Periodic seqno/time sampling
//!
//! The database owns one sampler. An external scheduler ticks it at
//! roughly the configured cadence; on each tick the sampler records the
//! engine's latest sequence number against the current wall-clock time.
//! Many readers share the accumulated mapping; the sampler is the only
//! writer.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{MAX_PAIRS_IN_MEMORY, MAX_PAIRS_PER_TABLE};
use crate::mapping::SeqnoTimeMapping;
use crate::{Result, Seqno, UnixSeconds};
use bytes::Bytes;

/// Time-tracking options recognized by the enclosing engine.
///
/// Either knob being nonzero turns tracking on. When both are set, the
/// larger defines the tracked duration and the smaller bounds the sampling
/// resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Horizon for demoting records to the last tier, in seconds.
    pub preclude_last_level_data_seconds: u64,
    /// Tracked history window requested independently of placement.
    pub preserve_internal_time_seconds: u64,
}

impl TrackingConfig {
    /// True when any form of time tracking is requested.
    pub fn enabled(&self) -> bool {
        self.preclude_last_level_data_seconds > 0 || self.preserve_internal_time_seconds > 0
    }

    /// The duration the mapping must cover, in seconds.
    pub fn tracked_duration(&self) -> u64 {
        self.preclude_last_level_data_seconds
            .max(self.preserve_internal_time_seconds)
    }

    /// The duration bounding the sampling resolution: the smaller of the
    /// two knobs when both are set.
    pub fn resolution(&self) -> u64 {
        match (
            self.preclude_last_level_data_seconds,
            self.preserve_internal_time_seconds,
        ) {
            (0, preserve) => preserve,
            (preclude, 0) => preclude,
            (preclude, preserve) => preclude.min(preserve),
        }
    }
}

#[derive(Debug)]
struct SamplerState {
    config: TrackingConfig,
    period: u64,
    last_sample_time: UnixSeconds,
    active_families: usize,
}

/// Database-level sampling driver around the shared in-memory mapping.
pub struct SeqnoTimeSampler {
    mapping: RwLock<SeqnoTimeMapping>,
    state: Mutex<SamplerState>,
}

impl SeqnoTimeSampler {
    /// Create a sampler for the given tracking options.
    pub fn new(config: TrackingConfig) -> Result<Self> {
        let mapping = SeqnoTimeMapping::new(mapping_capacity(&config), config.tracked_duration())?;
        Ok(Self {
            mapping: RwLock::new(mapping),
            state: Mutex::new(SamplerState {
                config,
                period: sampling_period(&config),
                last_sample_time: 0,
                active_families: 0,
            }),
        })
    }

    /// Record that a column family with tracking enabled exists.
    pub fn register_family(&self) {
        let mut state = self.state.lock();
        state.active_families += 1;
        if state.active_families == 1 {
            info!("seqno-time sampling enabled");
        }
    }

    /// Record that a tracking column family was dropped.
    ///
    /// Dropping the last one disables sampling and clears the accumulated
    /// mapping.
    pub fn deregister_family(&self) {
        let mut state = self.state.lock();
        state.active_families = state.active_families.saturating_sub(1);
        if state.active_families == 0 {
            state.last_sample_time = 0;
            drop(state);
            self.mapping.write().clear();
            info!("seqno-time sampling disabled, mapping cleared");
        }
    }

    /// True while at least one tracking column family is alive.
    pub fn is_active(&self) -> bool {
        let state = self.state.lock();
        state.active_families > 0 && state.config.enabled()
    }

    /// Apply changed tracking options, re-deriving the cadence and mapping
    /// bounds.
    pub fn reconfigure(&self, config: TrackingConfig) -> Result<()> {
        let mut state = self.state.lock();
        self.mapping
            .write()
            .set_bounds(mapping_capacity(&config), config.tracked_duration())?;
        state.config = config;
        state.period = sampling_period(&config);
        Ok(())
    }

    /// Tick entry point: sample `(latest_seqno, now)` if a sampling period
    /// has elapsed, then age out stale entries.
    ///
    /// The tick cadence is the external scheduler's business; this enforces
    /// at most one stored sample per period regardless of tick rate. A zero
    /// `latest_seqno` (no writes yet) records nothing.
    pub fn sample(&self, latest_seqno: Seqno, now: UnixSeconds) {
        let mut state = self.state.lock();
        if state.active_families == 0 || !state.config.enabled() {
            return;
        }
        if state.last_sample_time != 0 && now < state.last_sample_time + state.period {
            return;
        }
        state.last_sample_time = now;
        drop(state);

        let mut mapping = self.mapping.write();
        if mapping.append(latest_seqno, now) {
            debug!(seqno = latest_seqno, time = now, "recorded seqno-time sample");
        }
        mapping.truncate_old_entries(now);
    }

    /// Largest seqno known to be assigned at or before `time`.
    pub fn proximal_seqno_before_time(&self, time: UnixSeconds) -> Seqno {
        self.mapping.read().proximal_seqno_before_time(time)
    }

    /// Latest time known to precede `seqno`.
    pub fn proximal_time_before_seqno(&self, seqno: Seqno) -> UnixSeconds {
        self.mapping.read().proximal_time_before_seqno(seqno)
    }

    /// Clone of the current mapping for an owner of a private working copy.
    pub fn mapping_snapshot(&self) -> SeqnoTimeMapping {
        self.mapping.read().clone()
    }

    /// Property blob for a newly written table covering the given seqno
    /// range.
    pub fn table_snapshot(&self, smallest_seqno: Seqno, largest_seqno: Seqno) -> Bytes {
        self.mapping
            .read()
            .encode(smallest_seqno, largest_seqno, MAX_PAIRS_PER_TABLE)
    }
}

/// Seconds between stored samples: the resolution-bounding knob spread over
/// the in-memory slot budget.
fn sampling_period(config: &TrackingConfig) -> u64 {
    (config.resolution() / MAX_PAIRS_IN_MEMORY as u64).max(1)
}

/// Slots needed to cover the tracked duration at the sampling cadence,
/// capped so one finely-sampled family cannot balloon the accumulator.
fn mapping_capacity(config: &TrackingConfig) -> usize {
    let period = sampling_period(config);
    let needed = (config.tracked_duration() / period) as usize;
    needed.clamp(MAX_PAIRS_IN_MEMORY, MAX_PAIRS_IN_MEMORY * 10)
}
