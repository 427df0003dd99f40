//! Fixed-capacity process-image memory: M/I/Q bit regions and D words.
//!
//! Out-of-range access never faults the engine: reads default to `false`/`0`
//! and writes are dropped, both with a warning log.

use crate::addr::{Address, BitRegion};

/// Number of marker (`M`) bits.
pub const MAX_M_BITS: usize = 200;
/// Number of input (`I`) bits.
pub const MAX_I_BITS: usize = 100;
/// Number of output (`Q`) bits.
pub const MAX_Q_BITS: usize = 100;
/// Number of 32-bit data (`D`) words.
pub const MAX_D_WORDS: usize = 100;

/// Process-image memory bank owned by the controller for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBank {
    m: [bool; MAX_M_BITS],
    i: [bool; MAX_I_BITS],
    q: [bool; MAX_Q_BITS],
    d: [u32; MAX_D_WORDS],
}

impl Default for MemoryBank {
    fn default() -> Self {
        Self {
            m: [false; MAX_M_BITS],
            i: [false; MAX_I_BITS],
            q: [false; MAX_Q_BITS],
            d: [0; MAX_D_WORDS],
        }
    }
}

impl MemoryBank {
    /// Creates a zeroed memory bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn region(&self, region: BitRegion) -> &[bool] {
        match region {
            BitRegion::Marker => &self.m,
            BitRegion::Input => &self.i,
            BitRegion::Output => &self.q,
        }
    }

    fn region_mut(&mut self, region: BitRegion) -> &mut [bool] {
        match region {
            BitRegion::Marker => &mut self.m,
            BitRegion::Input => &mut self.i,
            BitRegion::Output => &mut self.q,
        }
    }

    /// Reads one bit of a bit region; out of range reads as `false`.
    #[must_use]
    pub fn bit(&self, region: BitRegion, index: usize) -> bool {
        self.region(region).get(index).copied().unwrap_or_else(|| {
            tracing::warn!(region = %region.letter(), index, "bit read out of range");
            false
        })
    }

    /// Writes one bit of a bit region; out of range writes are dropped.
    pub fn set_bit(&mut self, region: BitRegion, index: usize, value: bool) {
        match self.region_mut(region).get_mut(index) {
            Some(slot) => *slot = value,
            None => {
                tracing::warn!(region = %region.letter(), index, "bit write out of range");
            }
        }
    }

    /// Reads one data word; out of range reads as `0`.
    #[must_use]
    pub fn word(&self, index: usize) -> u32 {
        self.d.get(index).copied().unwrap_or_else(|| {
            tracing::warn!(index, "word read out of range");
            0
        })
    }

    /// Writes one data word; out of range writes are dropped.
    pub fn set_word(&mut self, index: usize, value: u32) {
        match self.d.get_mut(index) {
            Some(slot) => *slot = value,
            None => tracing::warn!(index, "word write out of range"),
        }
    }

    /// Reads one bit of a data word.
    #[must_use]
    pub fn word_bit(&self, index: usize, bit: u8) -> bool {
        self.word(index) & (1 << bit) != 0
    }

    /// Read-modify-writes one bit of a data word.
    pub fn set_word_bit(&mut self, index: usize, bit: u8, value: bool) {
        match self.d.get_mut(index) {
            Some(slot) => {
                if value {
                    *slot |= 1 << bit;
                } else {
                    *slot &= !(1 << bit);
                }
            }
            None => tracing::warn!(index, bit, "word-bit write out of range"),
        }
    }

    /// Reads an address as a 32-bit operand value. Bits widen to `0`/`1`;
    /// timer/counter references are not word-readable and yield `0`.
    #[must_use]
    pub fn read_word_addr(&self, addr: &Address) -> u32 {
        match addr {
            Address::Word(index) => self.word(*index),
            Address::WordBit(index, bit) => u32::from(self.word_bit(*index, *bit)),
            Address::Bit(region, index) => u32::from(self.bit(*region, *index)),
            Address::Timer(_) | Address::Counter(_) => {
                tracing::warn!(%addr, "word read from non-memory address");
                0
            }
        }
    }

    /// Writes a 32-bit value through an address. Bit targets store
    /// `value != 0`; timer/counter references are rejected.
    pub fn write_word_addr(&mut self, addr: &Address, value: u32) {
        match addr {
            Address::Word(index) => self.set_word(*index, value),
            Address::WordBit(index, bit) => self.set_word_bit(*index, *bit, value != 0),
            Address::Bit(region, index) => self.set_bit(*region, *index, value != 0),
            Address::Timer(_) | Address::Counter(_) => {
                tracing::warn!(%addr, "word write to non-memory address dropped");
            }
        }
    }

    /// Writes a boolean through an address. A plain data word stores the
    /// whole word as `1`/`0`; timer/counter references are rejected.
    pub fn write_bool_addr(&mut self, addr: &Address, value: bool) {
        match addr {
            Address::Bit(region, index) => self.set_bit(*region, *index, value),
            Address::Word(index) => self.set_word(*index, u32::from(value)),
            Address::WordBit(index, bit) => self.set_word_bit(*index, *bit, value),
            Address::Timer(_) | Address::Counter(_) => {
                tracing::warn!(%addr, "bit write to non-memory address dropped");
            }
        }
    }

    /// Zeroes every region.
    pub fn clear_all(&mut self) {
        *self = Self::default();
    }

    /// Zeroes the M and Q regions, leaving I and D untouched.
    pub fn clear_markers_and_outputs(&mut self) {
        self.m = [false; MAX_M_BITS];
        self.q = [false; MAX_Q_BITS];
    }

    /// Iterates indices of set bits in a bit region.
    pub fn set_bits(&self, region: BitRegion) -> impl Iterator<Item = usize> + '_ {
        self.region(region)
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index))
    }

    /// Iterates `(index, value)` pairs of non-zero data words.
    pub fn nonzero_words(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.d
            .iter()
            .enumerate()
            .filter_map(|(index, word)| (*word != 0).then_some((index, *word)))
    }
}
