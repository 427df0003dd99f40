//! Core scan engine for a small network-configured ladder-logic controller.
//!
//! The crate owns the process-image memory, the program graph, timer and
//! counter instances, the cyclic scan, and the lifecycle state machine. The
//! transport, storage, and display layers live outside and talk to the
//! [`Controller`] facade: deploy a program, command RUN/STOP/RESET, force
//! addresses, and sample throttled snapshots.

/// Textual address grammar and typed memory references.
pub mod addr;
pub use addr::{Address, AddressParseError, BitRegion};

/// Fixed-capacity process-image memory regions.
pub mod memory;
pub use memory::{MemoryBank, MAX_D_WORDS, MAX_I_BITS, MAX_M_BITS, MAX_Q_BITS};

/// Timer instances and their timing disciplines.
pub mod timer;
pub use timer::{TimerBank, TimerInstance, TimerMode, MAX_TIMERS};

/// Counter instances.
pub mod counter;
pub use counter::{CounterBank, CounterInstance, CounterKind, MAX_COUNTERS};

/// Instruction opcodes and argument parsing.
pub mod instruction;
pub use instruction::{
    BinaryOp, CompareOp, InstructionParseError, Operand, ParsedInstruction, TransferOp,
};

/// Program graph model, document types, and the loader.
pub mod program;
pub use program::{
    Link, LinkRecord, Node, NodeRecord, NodeType, Program, ProgramDocument, MAX_LINKS, MAX_NODES,
};

/// Network-id canonicalization and assignment.
pub mod network;

/// The cyclic scan engine.
pub mod scan;
pub use scan::{contact_value, run_scan, ScanScratch, P2_MAX_ITERATIONS};

/// Lifecycle status machine and the RUN/STOP persistence seam.
pub mod lifecycle;
pub use lifecycle::{MemoryStatusStore, Status, StatusStore, StoreError};

/// Observer-facing snapshot documents.
pub mod snapshot;
pub use snapshot::{CounterView, MemoryView, Snapshot, TimerView, SNAPSHOT_MIN_INTERVAL_MS};

/// The owning controller facade.
pub mod controller;
pub use controller::{Controller, SCAN_INTERVAL_MS};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use serde_json as _;
