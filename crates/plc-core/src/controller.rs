//! Owning facade over the scan engine: command intake from the transport
//! layer, the scan tick gate, and the throttled snapshot producer.
//!
//! Everything runs on one cooperative thread. Commands mutate the same
//! memory and program the scan reads, and are only applied between scans.

use crate::addr::Address;
use crate::counter::CounterBank;
use crate::instruction::ParsedInstruction;
use crate::lifecycle::{Status, StatusStore};
use crate::memory::MemoryBank;
use crate::program::{Program, ProgramDocument};
use crate::scan::{run_scan, ScanScratch};
use crate::snapshot::{Snapshot, SNAPSHOT_MIN_INTERVAL_MS};
use crate::timer::TimerBank;

/// Nominal scan period. Late ticks execute once; there is no catch-up.
pub const SCAN_INTERVAL_MS: u64 = 10;

/// The controller: program, memory, instance banks, status, and timing gates.
#[derive(Debug, Default)]
pub struct Controller {
    status: Status,
    error: Option<String>,
    memory: MemoryBank,
    program: Program,
    timers: TimerBank,
    counters: CounterBank,
    scratch: ScanScratch,
    last_scan_ms: Option<u64>,
    last_snapshot_ms: Option<u64>,
    snapshot_forced: bool,
}

impl Controller {
    /// Creates a stopped controller with zeroed memory and no program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Boot sequence: restore the persisted RUN/STOP flag, deploy the stored
    /// program when present, and apply the restored status without
    /// re-persisting it. A store failure lands in the error state.
    pub fn boot(&mut self, store: &mut dyn StatusStore, program: Option<&ProgramDocument>) {
        let restored = store.load();
        if let Some(document) = program {
            self.load_program(document);
        }
        match restored {
            Ok(status) => {
                self.status = status.unwrap_or_default();
                tracing::info!(status = self.status.as_str(), "boot complete");
            }
            Err(error) => self.enter_error(format!("status restore failed: {error}")),
        }
        self.snapshot_forced = true;
    }

    /// Replaces the program. Node scratch state is zeroed and timer/counter
    /// instances are synchronized with the new instruction set.
    pub fn load_program(&mut self, document: &ProgramDocument) {
        self.program = Program::load(document);
        self.scratch.reset();
        for node in &self.program.nodes {
            match &node.instruction {
                Some(ParsedInstruction::Timer {
                    mode,
                    name,
                    preset_ms,
                }) => self.timers.sync(name, *mode, *preset_ms),
                Some(ParsedInstruction::Counter { kind, name, preset }) => {
                    self.counters.sync(name, *kind, *preset);
                }
                _ => {}
            }
        }
        tracing::debug!(
            nodes = self.program.nodes.len(),
            links = self.program.links.len(),
            "program deployed"
        );
    }

    /// Emits the document form of the loaded program.
    #[must_use]
    pub fn program_document(&self) -> ProgramDocument {
        self.program.to_document()
    }

    /// Starts scanning and persists the RUN flag.
    pub fn run(&mut self, store: &mut dyn StatusStore) {
        self.error = None;
        self.status = Status::Run;
        tracing::info!("run");
        self.persist(store, Status::Run);
        self.snapshot_forced = true;
    }

    /// Stops scanning: markers and outputs are zeroed, timer and counter
    /// runtime state is cleared (presets kept), and the STOP flag persists.
    pub fn stop(&mut self, store: &mut dyn StatusStore) {
        self.memory.clear_markers_and_outputs();
        self.timers.clear_all_runtime();
        self.counters.clear_all_runtime();
        self.error = None;
        self.status = Status::Stop;
        tracing::info!("stop");
        self.persist(store, Status::Stop);
        self.snapshot_forced = true;
    }

    /// Clears all memory regions and removes every timer and counter
    /// instance. Not persisted.
    pub fn reset(&mut self) {
        self.memory.clear_all();
        self.timers.remove_all();
        self.counters.remove_all();
        self.scratch.reset();
        self.error = None;
        self.status = Status::Reset;
        tracing::info!("reset");
        self.snapshot_forced = true;
    }

    /// Drops to STOP without persisting or touching memory. Used when a
    /// program deploy fails before reaching the loader.
    pub fn halt(&mut self) {
        self.status = Status::Stop;
        self.snapshot_forced = true;
        tracing::warn!("halted");
    }

    /// Enters the error state, keeping memory intact and halting the scan.
    pub fn enter_error(&mut self, message: String) {
        tracing::error!(%message, "entering error state");
        self.status = Status::Error;
        self.error = Some(message);
        self.snapshot_forced = true;
    }

    fn persist(&mut self, store: &mut dyn StatusStore, status: Status) {
        if let Err(error) = store.save(status) {
            self.enter_error(format!("status persist failed: {error}"));
        }
    }

    /// Forces a bit or word, regardless of RUN/STOP. During RUN the next
    /// scan may overwrite it.
    pub fn write(&mut self, addr: &Address, value: u32) {
        self.memory.write_word_addr(addr, value);
    }

    /// Runs one scan when the controller is running and the scan period has
    /// elapsed. Returns whether a scan ran.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        if self.status != Status::Run {
            return false;
        }
        let due = self
            .last_scan_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= SCAN_INTERVAL_MS);
        if !due {
            return false;
        }
        run_scan(
            &self.program,
            &mut self.memory,
            &mut self.timers,
            &mut self.counters,
            &mut self.scratch,
            now_ms,
        );
        self.last_scan_ms = Some(now_ms);
        true
    }

    /// Produces a snapshot when one is due: forced by a state transition, or
    /// after the minimum publish interval.
    pub fn maybe_snapshot(&mut self, now_ms: u64) -> Option<Snapshot> {
        let due = self.snapshot_forced
            || self
                .last_snapshot_ms
                .is_none_or(|last| now_ms.saturating_sub(last) >= SNAPSHOT_MIN_INTERVAL_MS);
        if !due {
            return None;
        }
        self.snapshot_forced = false;
        self.last_snapshot_ms = Some(now_ms);
        Some(self.snapshot(now_ms))
    }

    /// Captures a snapshot immediately, bypassing the throttle.
    #[must_use]
    pub fn snapshot(&self, now_ms: u64) -> Snapshot {
        Snapshot::capture(
            self.status,
            self.error.as_deref(),
            &self.memory,
            &self.timers,
            &self.counters,
            now_ms,
        )
    }

    /// Requests that the next [`Self::maybe_snapshot`] publishes regardless
    /// of the throttle (new observer connections).
    pub fn force_snapshot(&mut self) {
        self.snapshot_forced = true;
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Fault description while in the error state.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process-image memory.
    #[must_use]
    pub const fn memory(&self) -> &MemoryBank {
        &self.memory
    }

    /// Live timer instances.
    #[must_use]
    pub const fn timers(&self) -> &TimerBank {
        &self.timers
    }

    /// Live counter instances.
    #[must_use]
    pub const fn counters(&self) -> &CounterBank {
        &self.counters
    }

    /// Loaded program tables.
    #[must_use]
    pub const fn program(&self) -> &Program {
        &self.program
    }

    /// Per-node scan state of the last cycle.
    #[must_use]
    pub const fn scan_state(&self) -> &ScanScratch {
        &self.scratch
    }
}
