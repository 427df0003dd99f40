//! Observer-facing snapshot of status, memory, timers, and counters.
//!
//! Snapshots are sparse: only set bits and non-zero words are listed.
//! Production is rate-limited by the controller; the types here are plain
//! serializable views.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::addr::BitRegion;
use crate::counter::CounterBank;
use crate::lifecycle::Status;
use crate::memory::MemoryBank;
use crate::timer::{TimerBank, TimerMode};

/// Minimum interval between unforced snapshot emissions.
pub const SNAPSHOT_MIN_INTERVAL_MS: u64 = 200;

/// Observer view of one timer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerView {
    /// Output bit.
    pub q: bool,
    /// Progress in milliseconds: elapsed (capped at the preset) for
    /// on-delay timers, remaining for off-delay and pulse timers.
    pub current: u64,
    /// Configured preset in milliseconds.
    pub preset: u64,
    /// True while the timer is actively timing.
    pub enabled: bool,
}

/// Observer view of one counter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterView {
    /// Output bit.
    pub q: bool,
    /// Current count.
    pub current: i32,
    /// Configured preset count.
    pub preset: i32,
}

/// Sparse memory and instance views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryView {
    /// Set marker bits.
    pub m: BTreeMap<u16, bool>,
    /// Non-zero data words.
    pub d: BTreeMap<u16, u32>,
    /// Set input bits.
    pub i: BTreeMap<u16, bool>,
    /// Set output bits.
    pub q: BTreeMap<u16, bool>,
    /// Live timers by name.
    pub t: BTreeMap<String, TimerView>,
    /// Live counters by name.
    pub c: BTreeMap<String, CounterView>,
}

/// One published snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Controller status at capture time.
    pub status: Status,
    /// Fault description while the controller is in the error state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sparse memory and instance state.
    pub memory: MemoryView,
}

impl Snapshot {
    /// Captures the observable state of the engine.
    #[must_use]
    pub fn capture(
        status: Status,
        error: Option<&str>,
        memory: &MemoryBank,
        timers: &TimerBank,
        counters: &CounterBank,
        now_ms: u64,
    ) -> Self {
        let bits = |region: BitRegion| {
            memory
                .set_bits(region)
                .filter_map(|index| u16::try_from(index).ok().map(|index| (index, true)))
                .collect()
        };

        Self {
            status,
            error: error.map(str::to_string),
            memory: MemoryView {
                m: bits(BitRegion::Marker),
                i: bits(BitRegion::Input),
                q: bits(BitRegion::Output),
                d: memory
                    .nonzero_words()
                    .filter_map(|(index, word)| u16::try_from(index).ok().map(|index| (index, word)))
                    .collect(),
                t: timers
                    .iter()
                    .map(|timer| {
                        let current = match timer.mode() {
                            TimerMode::OnDelay => timer.elapsed_capped_ms(now_ms),
                            TimerMode::OffDelay | TimerMode::Pulse => timer.remaining_ms(),
                        };
                        (
                            timer.name().to_string(),
                            TimerView {
                                q: timer.q(),
                                current,
                                preset: timer.preset_ms(),
                                enabled: timer.enabled(),
                            },
                        )
                    })
                    .collect(),
                c: counters
                    .iter()
                    .map(|counter| {
                        (
                            counter.name().to_string(),
                            CounterView {
                                q: counter.q(),
                                current: counter.current(),
                                preset: counter.preset(),
                            },
                        )
                    })
                    .collect(),
            },
        }
    }
}
