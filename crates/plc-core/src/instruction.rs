//! Instruction opcodes and colon-delimited argument parsing.
//!
//! Arguments are parsed once at program load; a malformed argument list
//! permanently disarms the node (its rung output is forced low each cycle).
//! Source operands may be memory addresses or unsigned decimal literals;
//! destinations must be writable memory addresses.

use thiserror::Error;

use crate::addr::{Address, AddressParseError};
use crate::counter::CounterKind;
use crate::timer::TimerMode;

/// Word-to-word arithmetic and bitwise operations (`DEST:OP1:OP2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Division; a zero divisor makes the instruction a no-op.
    Div,
    /// Remainder; a zero divisor makes the instruction a no-op.
    Mod,
    /// Bitwise AND.
    And,
    /// Bitwise OR.
    Or,
    /// Bitwise XOR.
    Xor,
}

impl BinaryOp {
    /// Applies the operation on unsigned 32-bit operands with wrap-around.
    ///
    /// Returns `None` for division or remainder by zero; the instruction is
    /// a no-op in that case.
    #[must_use]
    pub const fn apply(self, lhs: u32, rhs: u32) -> Option<u32> {
        match self {
            Self::Add => Some(lhs.wrapping_add(rhs)),
            Self::Sub => Some(lhs.wrapping_sub(rhs)),
            Self::Mul => Some(lhs.wrapping_mul(rhs)),
            Self::Div => {
                if rhs == 0 {
                    None
                } else {
                    Some(lhs / rhs)
                }
            }
            Self::Mod => {
                if rhs == 0 {
                    None
                } else {
                    Some(lhs % rhs)
                }
            }
            Self::And => Some(lhs & rhs),
            Self::Or => Some(lhs | rhs),
            Self::Xor => Some(lhs ^ rhs),
        }
    }
}

/// Single-source transfer operations (`DEST:SRC`).
///
/// Shift and rotate counts follow the historical convention of being read
/// from the destination word before it is overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferOp {
    /// Bitwise complement of the source.
    Not,
    /// Copy of the source.
    Move,
    /// Left shift of the source by the destination's prior value.
    Shl,
    /// Right shift of the source by the destination's prior value.
    Shr,
    /// Left rotation of the source by the destination's prior value.
    Rol,
    /// Right rotation of the source by the destination's prior value.
    Ror,
}

/// Unsigned comparisons (`OP1:OP2`) that drive the node output directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
}

impl CompareOp {
    /// Evaluates the comparison on unsigned 32-bit operands.
    #[must_use]
    pub const fn eval(self, lhs: u32, rhs: u32) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
        }
    }
}

/// A source operand: a memory address or an unsigned decimal literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Inline constant.
    Literal(u32),
    /// Memory reference read through the word view.
    Addr(Address),
}

/// Fully parsed instruction payload attached to an instruction node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInstruction {
    /// TON/TOFF/TP with `NAME:MILLIS` arguments.
    Timer {
        /// Timing discipline selected by the opcode.
        mode: TimerMode,
        /// Canonical (uppercased) instance name.
        name: String,
        /// Preset in milliseconds.
        preset_ms: u64,
    },
    /// CTU/CTD with `NAME:PRESET` arguments.
    Counter {
        /// Counting direction selected by the opcode.
        kind: CounterKind,
        /// Canonical (uppercased) instance name.
        name: String,
        /// Preset count.
        preset: i32,
    },
    /// ADD/SUB/MUL/DIV/MOD/AND/OR/XOR with `DEST:OP1:OP2` arguments.
    Binary {
        /// Operation applied to the two operands.
        op: BinaryOp,
        /// Destination memory reference.
        dest: Address,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
    /// NOT/MOVE/SHL/SHR/ROL/ROR with `DEST:SRC` arguments.
    Transfer {
        /// Operation applied to the source.
        op: TransferOp,
        /// Destination memory reference.
        dest: Address,
        /// Source operand.
        src: Operand,
    },
    /// EQ/NE/GT/GE/LT/LE with `OP1:OP2` arguments.
    Compare {
        /// Comparison applied to the two operands.
        op: CompareOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
    },
}

/// Rejections produced by [`ParsedInstruction::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionParseError {
    /// The mnemonic is not a known opcode.
    #[error("unknown opcode {0:?}")]
    UnknownOpcode(String),
    /// The colon-delimited argument list has the wrong arity.
    #[error("{opcode} expects {expected} arguments, got {actual}")]
    WrongArgumentCount {
        /// Canonical opcode mnemonic.
        opcode: &'static str,
        /// Required argument count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },
    /// A timer/counter name field was empty.
    #[error("empty instance name")]
    EmptyName,
    /// A numeric preset field did not parse.
    #[error("invalid preset {0:?}")]
    InvalidPreset(String),
    /// An operand was neither a literal nor a valid address.
    #[error("invalid operand: {0}")]
    InvalidOperand(#[from] AddressParseError),
    /// The destination is not writable memory.
    #[error("destination {0:?} is not writable memory")]
    UnwritableDestination(String),
}

fn parse_operand(field: &str) -> Result<Operand, InstructionParseError> {
    let trimmed = field.trim();
    if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse()
            .map(Operand::Literal)
            .map_err(|_| InstructionParseError::InvalidPreset(trimmed.to_string()));
    }
    Ok(Operand::Addr(Address::parse(trimmed)?))
}

fn parse_dest(field: &str) -> Result<Address, InstructionParseError> {
    let trimmed = field.trim();
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InstructionParseError::UnwritableDestination(
            trimmed.to_string(),
        ));
    }
    let addr = Address::parse(trimmed)?;
    if !addr.is_memory() {
        return Err(InstructionParseError::UnwritableDestination(
            trimmed.to_string(),
        ));
    }
    Ok(addr)
}

fn split_args<const N: usize>(
    opcode: &'static str,
    args: &str,
) -> Result<[String; N], InstructionParseError> {
    let fields: Vec<String> = args.split(':').map(|field| field.trim().to_string()).collect();
    if fields.len() != N {
        return Err(InstructionParseError::WrongArgumentCount {
            opcode,
            expected: N,
            actual: fields.len(),
        });
    }
    fields
        .try_into()
        .map_err(|_| InstructionParseError::WrongArgumentCount {
            opcode,
            expected: N,
            actual: 0,
        })
}

fn parse_name(field: &str) -> Result<String, InstructionParseError> {
    if field.is_empty() {
        return Err(InstructionParseError::EmptyName);
    }
    Ok(field.to_ascii_uppercase())
}

impl ParsedInstruction {
    /// Parses an opcode mnemonic and its colon-delimited argument string.
    ///
    /// # Errors
    ///
    /// Returns [`InstructionParseError`] for unknown mnemonics, arity
    /// mismatches, and malformed fields.
    pub fn parse(mnemonic: &str, args: &str) -> Result<Self, InstructionParseError> {
        let opcode = mnemonic.trim().to_ascii_uppercase();
        match opcode.as_str() {
            "TON" => Self::parse_timer("TON", TimerMode::OnDelay, args),
            "TOFF" => Self::parse_timer("TOFF", TimerMode::OffDelay, args),
            "TP" => Self::parse_timer("TP", TimerMode::Pulse, args),
            "CTU" => Self::parse_counter("CTU", CounterKind::Up, args),
            "CTD" => Self::parse_counter("CTD", CounterKind::Down, args),
            "ADD" => Self::parse_binary("ADD", BinaryOp::Add, args),
            "SUB" => Self::parse_binary("SUB", BinaryOp::Sub, args),
            "MUL" => Self::parse_binary("MUL", BinaryOp::Mul, args),
            "DIV" => Self::parse_binary("DIV", BinaryOp::Div, args),
            "MOD" => Self::parse_binary("MOD", BinaryOp::Mod, args),
            "AND" => Self::parse_binary("AND", BinaryOp::And, args),
            "OR" => Self::parse_binary("OR", BinaryOp::Or, args),
            "XOR" => Self::parse_binary("XOR", BinaryOp::Xor, args),
            "NOT" => Self::parse_transfer("NOT", TransferOp::Not, args),
            "MOVE" => Self::parse_transfer("MOVE", TransferOp::Move, args),
            "SHL" => Self::parse_transfer("SHL", TransferOp::Shl, args),
            "SHR" => Self::parse_transfer("SHR", TransferOp::Shr, args),
            "ROL" => Self::parse_transfer("ROL", TransferOp::Rol, args),
            "ROR" => Self::parse_transfer("ROR", TransferOp::Ror, args),
            "EQ" => Self::parse_compare("EQ", CompareOp::Eq, args),
            "NE" => Self::parse_compare("NE", CompareOp::Ne, args),
            "GT" => Self::parse_compare("GT", CompareOp::Gt, args),
            "GE" => Self::parse_compare("GE", CompareOp::Ge, args),
            "LT" => Self::parse_compare("LT", CompareOp::Lt, args),
            "LE" => Self::parse_compare("LE", CompareOp::Le, args),
            _ => Err(InstructionParseError::UnknownOpcode(opcode)),
        }
    }

    fn parse_timer(
        opcode: &'static str,
        mode: TimerMode,
        args: &str,
    ) -> Result<Self, InstructionParseError> {
        let [name, millis] = split_args::<2>(opcode, args)?;
        Ok(Self::Timer {
            mode,
            name: parse_name(&name)?,
            preset_ms: millis
                .parse()
                .map_err(|_| InstructionParseError::InvalidPreset(millis))?,
        })
    }

    fn parse_counter(
        opcode: &'static str,
        kind: CounterKind,
        args: &str,
    ) -> Result<Self, InstructionParseError> {
        let [name, preset] = split_args::<2>(opcode, args)?;
        Ok(Self::Counter {
            kind,
            name: parse_name(&name)?,
            preset: preset
                .parse()
                .map_err(|_| InstructionParseError::InvalidPreset(preset))?,
        })
    }

    fn parse_binary(
        opcode: &'static str,
        op: BinaryOp,
        args: &str,
    ) -> Result<Self, InstructionParseError> {
        let [dest, lhs, rhs] = split_args::<3>(opcode, args)?;
        Ok(Self::Binary {
            op,
            dest: parse_dest(&dest)?,
            lhs: parse_operand(&lhs)?,
            rhs: parse_operand(&rhs)?,
        })
    }

    fn parse_transfer(
        opcode: &'static str,
        op: TransferOp,
        args: &str,
    ) -> Result<Self, InstructionParseError> {
        let [dest, src] = split_args::<2>(opcode, args)?;
        Ok(Self::Transfer {
            op,
            dest: parse_dest(&dest)?,
            src: parse_operand(&src)?,
        })
    }

    fn parse_compare(
        opcode: &'static str,
        op: CompareOp,
        args: &str,
    ) -> Result<Self, InstructionParseError> {
        let [lhs, rhs] = split_args::<2>(opcode, args)?;
        Ok(Self::Compare {
            op,
            lhs: parse_operand(&lhs)?,
            rhs: parse_operand(&rhs)?,
        })
    }
}
