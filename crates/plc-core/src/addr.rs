//! Textual operand grammar and typed memory references.
//!
//! Addresses are case-insensitive: `m17`, `M17` and ` M17 ` all resolve to
//! marker bit 17. Region capacity is *not* checked here; out-of-range indices
//! parse successfully and are range-policed by the memory bank on access.

use std::fmt;

use thiserror::Error;

/// Boolean-addressable regions backed by fixed bit arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitRegion {
    /// Internal marker bits (`M`).
    Marker,
    /// Physical/forced input bits (`I`).
    Input,
    /// Physical output bits (`Q`).
    Output,
}

impl BitRegion {
    /// Returns the single-letter region prefix.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::Marker => 'M',
            Self::Input => 'I',
            Self::Output => 'Q',
        }
    }
}

/// Typed reference produced by parsing a textual operand address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// One bit of the M/I/Q regions, e.g. `M17`.
    Bit(BitRegion, usize),
    /// One whole 32-bit data word, e.g. `D10`.
    Word(usize),
    /// One bit of a data word, e.g. `D10.3`. The bit index is below 32.
    WordBit(usize, u8),
    /// Output bit of a named timer. The key is the full uppercased address
    /// text (`T0`), matching the name used in timer instruction arguments.
    Timer(String),
    /// Output bit of a named counter. The key is the full uppercased address
    /// text (`C1`), matching the name used in counter instruction arguments.
    Counter(String),
}

/// Rejections produced by [`Address::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    /// The address text was empty after trimming.
    #[error("empty address")]
    Empty,
    /// The leading letter is not one of `M`/`I`/`Q`/`D`/`T`/`C`.
    #[error("unknown region prefix in {0:?}")]
    UnknownRegion(String),
    /// A numeric region carried a non-digit or unparseable index.
    #[error("invalid numeric index in {0:?}")]
    InvalidIndex(String),
    /// A dotted data-word address named a bit at or above 32.
    #[error("bit index out of range in {0:?}")]
    BitIndexOutOfRange(String),
    /// A timer/counter reference carried no name after the prefix.
    #[error("missing name in {0:?}")]
    EmptyName(String),
}

impl Address {
    /// Parses a textual address.
    ///
    /// # Errors
    ///
    /// Returns [`AddressParseError`] when the text does not match the
    /// grammar. Range violations against region capacities are not parse
    /// errors.
    pub fn parse(text: &str) -> Result<Self, AddressParseError> {
        let normalized = text.trim().to_ascii_uppercase();
        let mut chars = normalized.chars();
        let Some(prefix) = chars.next() else {
            return Err(AddressParseError::Empty);
        };
        let rest = chars.as_str();

        match prefix {
            'M' => Ok(Self::Bit(BitRegion::Marker, parse_index(rest, &normalized)?)),
            'I' => Ok(Self::Bit(BitRegion::Input, parse_index(rest, &normalized)?)),
            'Q' => Ok(Self::Bit(BitRegion::Output, parse_index(rest, &normalized)?)),
            'D' => parse_data_word(rest, &normalized),
            'T' => {
                if rest.is_empty() {
                    Err(AddressParseError::EmptyName(normalized.clone()))
                } else {
                    Ok(Self::Timer(normalized.clone()))
                }
            }
            'C' => {
                if rest.is_empty() {
                    Err(AddressParseError::EmptyName(normalized.clone()))
                } else {
                    Ok(Self::Counter(normalized.clone()))
                }
            }
            _ => Err(AddressParseError::UnknownRegion(normalized.clone())),
        }
    }

    /// Returns true when the reference targets writable memory (M/I/Q/D).
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Bit(..) | Self::Word(_) | Self::WordBit(..))
    }
}

fn parse_index(digits: &str, full: &str) -> Result<usize, AddressParseError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressParseError::InvalidIndex(full.to_string()));
    }
    digits
        .parse()
        .map_err(|_| AddressParseError::InvalidIndex(full.to_string()))
}

fn parse_data_word(rest: &str, full: &str) -> Result<Address, AddressParseError> {
    match rest.split_once('.') {
        None => Ok(Address::Word(parse_index(rest, full)?)),
        Some((word, bit)) => {
            let word = parse_index(word, full)?;
            let bit = parse_index(bit, full)?;
            let bit =
                u8::try_from(bit).map_err(|_| AddressParseError::BitIndexOutOfRange(full.to_string()))?;
            if bit >= 32 {
                return Err(AddressParseError::BitIndexOutOfRange(full.to_string()));
            }
            Ok(Address::WordBit(word, bit))
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(region, index) => write!(f, "{}{index}", region.letter()),
            Self::Word(index) => write!(f, "D{index}"),
            Self::WordBit(index, bit) => write!(f, "D{index}.{bit}"),
            Self::Timer(name) | Self::Counter(name) => f.write_str(name),
        }
    }
}
