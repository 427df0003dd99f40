//! The cyclic scan: per-network source seeding, bounded fixpoint
//! propagation, and the commit of coils and instructions.
//!
//! Each cycle walks the networks in execution order and, for every network,
//! runs three phases back to back:
//!
//! 1. Source seeding: NETWORK nodes output `true` and raise the inputs of
//!    their direct successors.
//! 2. Propagation: every other node is re-evaluated, its output OR'd into
//!    its successors' inputs, until a full pass changes nothing or the
//!    iteration cap is hit. Inputs only ever rise within a cycle, which is
//!    what makes parallel branches behave as OR.
//! 3. Commit: coils, SET/RESET, and instructions apply their effects to the
//!    memory and timer/counter banks, in document order. Commit runs before
//!    the next network is seeded, so later networks observe the writes of
//!    earlier ones within the same cycle.
//!
//! Instruction nodes never propagate over links: their placeholder output in
//! phase 2 is the raw rung condition, and the committed output (timer or
//! counter `q`, comparison result) is visible to the rest of the program
//! only through `T<name>`/`C<name>` contact addresses.

use crate::addr::Address;
use crate::counter::CounterBank;
use crate::instruction::{Operand, ParsedInstruction, TransferOp};
use crate::memory::MemoryBank;
use crate::program::{Node, NodeType, Program, MAX_NODES};
use crate::timer::TimerBank;

/// Upper bound on propagation passes within one network. Sufficient for any
/// acyclic rung; cyclic rungs are a user-program error.
pub const P2_MAX_ITERATIONS: usize = 10;

/// Per-node working state of the scan, indexed by node id.
///
/// The `prev_*` planes persist across cycles; the current planes are rebuilt
/// every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanScratch {
    inputs: [bool; MAX_NODES],
    outputs: [bool; MAX_NODES],
    prev_inputs: [bool; MAX_NODES],
    prev_outputs: [bool; MAX_NODES],
    prev_contact: [bool; MAX_NODES],
}

impl Default for ScanScratch {
    fn default() -> Self {
        Self {
            inputs: [false; MAX_NODES],
            outputs: [false; MAX_NODES],
            prev_inputs: [false; MAX_NODES],
            prev_outputs: [false; MAX_NODES],
            prev_contact: [false; MAX_NODES],
        }
    }
}

impl ScanScratch {
    /// Creates zeroed scratch state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Zeroes every plane, including cross-cycle history.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn begin_cycle(&mut self) {
        self.prev_outputs = self.outputs;
        self.prev_inputs = self.inputs;
        self.outputs = [false; MAX_NODES];
        self.inputs = [false; MAX_NODES];
    }

    /// Rung signal that reached the node this cycle.
    #[must_use]
    pub fn input(&self, id: usize) -> bool {
        self.inputs.get(id).copied().unwrap_or(false)
    }

    /// Node result of this cycle.
    #[must_use]
    pub fn output(&self, id: usize) -> bool {
        self.outputs.get(id).copied().unwrap_or(false)
    }

    /// Node result of the previous cycle.
    #[must_use]
    pub fn prev_output(&self, id: usize) -> bool {
        self.prev_outputs.get(id).copied().unwrap_or(false)
    }
}

/// Runs one complete scan cycle over the loaded program.
pub fn run_scan(
    program: &Program,
    memory: &mut MemoryBank,
    timers: &mut TimerBank,
    counters: &mut CounterBank,
    scratch: &mut ScanScratch,
    now_ms: u64,
) {
    scratch.begin_cycle();
    for node in &program.nodes {
        if node.node_type == NodeType::Network {
            scratch.inputs[node.id] = true;
        }
    }

    for network_id in program.network_order() {
        seed_sources(program, &network_id, scratch);
        propagate(program, &network_id, scratch, memory, timers, counters);
        commit(program, &network_id, scratch, memory, timers, counters, now_ms);
    }
}

fn seed_sources(program: &Program, network_id: &str, scratch: &mut ScanScratch) {
    for node in program.nodes_in_network(network_id) {
        if node.node_type != NodeType::Network {
            continue;
        }
        scratch.outputs[node.id] = true;
        for link in program.links_from(node.id) {
            scratch.inputs[link.to] = true;
        }
    }
}

fn propagate(
    program: &Program,
    network_id: &str,
    scratch: &mut ScanScratch,
    memory: &MemoryBank,
    timers: &TimerBank,
    counters: &CounterBank,
) {
    for _ in 0..P2_MAX_ITERATIONS {
        let mut changed = false;
        for node in program.nodes_in_network(network_id) {
            if node.node_type == NodeType::Network {
                continue;
            }
            let output = evaluate(node, scratch, memory, timers, counters);
            if output != scratch.outputs[node.id] {
                scratch.outputs[node.id] = output;
                changed = true;
            }
            if node.node_type != NodeType::Instruction {
                for link in program.links_from(node.id) {
                    scratch.inputs[link.to] |= output;
                }
            }
        }
        if !changed {
            return;
        }
    }
    tracing::warn!(
        network = network_id,
        limit = P2_MAX_ITERATIONS,
        "propagation did not settle, committing as-is"
    );
}

fn evaluate(
    node: &Node,
    scratch: &mut ScanScratch,
    memory: &MemoryBank,
    timers: &TimerBank,
    counters: &CounterBank,
) -> bool {
    let input = scratch.inputs[node.id];
    let value = node
        .addr
        .as_ref()
        .is_some_and(|addr| contact_value(addr, memory, timers, counters));

    match node.node_type {
        NodeType::Network => true,
        NodeType::Open => input && value,
        NodeType::Close | NodeType::Invert => input && !value,
        NodeType::Rising => {
            let edge = !scratch.prev_contact[node.id] && value;
            scratch.prev_contact[node.id] = value;
            input && edge
        }
        NodeType::Falling => {
            let edge = scratch.prev_contact[node.id] && !value;
            scratch.prev_contact[node.id] = value;
            input && edge
        }
        // Coils pass the rung condition through; instructions hold it as a
        // placeholder until commit.
        NodeType::Coil | NodeType::Set | NodeType::Reset | NodeType::Instruction => input,
    }
}

/// Boolean view of an address, as sampled by contacts: bits read directly,
/// words read as `!= 0`, timer/counter references read their output bit.
#[must_use]
pub fn contact_value(
    addr: &Address,
    memory: &MemoryBank,
    timers: &TimerBank,
    counters: &CounterBank,
) -> bool {
    match addr {
        Address::Bit(region, index) => memory.bit(*region, *index),
        Address::Word(index) => memory.word(*index) != 0,
        Address::WordBit(index, bit) => memory.word_bit(*index, *bit),
        Address::Timer(name) => timers.q(name),
        Address::Counter(name) => counters.q(name),
    }
}

fn commit(
    program: &Program,
    network_id: &str,
    scratch: &mut ScanScratch,
    memory: &mut MemoryBank,
    timers: &mut TimerBank,
    counters: &mut CounterBank,
    now_ms: u64,
) {
    for node in program.nodes_in_network(network_id) {
        let signal = scratch.outputs[node.id];
        match node.node_type {
            NodeType::Coil => {
                if let Some(addr) = &node.addr {
                    memory.write_bool_addr(addr, signal);
                }
            }
            NodeType::Set => {
                if signal {
                    if let Some(addr) = &node.addr {
                        memory.write_bool_addr(addr, true);
                    }
                }
            }
            NodeType::Reset => {
                if signal {
                    match &node.addr {
                        Some(Address::Timer(name)) => timers.clear_runtime(name),
                        Some(Address::Counter(name)) => counters.clear_runtime(name),
                        Some(addr) => memory.write_bool_addr(addr, false),
                        None => {}
                    }
                }
            }
            NodeType::Instruction => {
                let prev_signal = scratch.prev_inputs[node.id];
                scratch.outputs[node.id] =
                    execute_instruction(node, signal, prev_signal, memory, timers, counters, now_ms);
            }
            NodeType::Network
            | NodeType::Open
            | NodeType::Close
            | NodeType::Rising
            | NodeType::Falling
            | NodeType::Invert => {}
        }
    }
}

fn execute_instruction(
    node: &Node,
    signal: bool,
    prev_signal: bool,
    memory: &mut MemoryBank,
    timers: &mut TimerBank,
    counters: &mut CounterBank,
    now_ms: u64,
) -> bool {
    let Some(instruction) = &node.instruction else {
        // Disarmed at load: malformed or unknown instruction.
        return false;
    };

    match instruction {
        ParsedInstruction::Timer {
            mode,
            name,
            preset_ms,
        } => match timers.get_or_create(name, *mode, *preset_ms) {
            Some(timer) => timer.drive(signal, prev_signal, now_ms),
            None => false,
        },
        ParsedInstruction::Counter { kind, name, preset } => {
            match counters.get_or_create(name, *kind, *preset) {
                Some(counter) => {
                    if signal && !prev_signal {
                        counter.count_edge()
                    } else {
                        counter.q()
                    }
                }
                None => false,
            }
        }
        ParsedInstruction::Binary { op, dest, lhs, rhs } => {
            if signal {
                let lhs = operand_value(lhs, memory);
                let rhs = operand_value(rhs, memory);
                if let Some(result) = op.apply(lhs, rhs) {
                    memory.write_word_addr(dest, result);
                }
            }
            signal
        }
        ParsedInstruction::Transfer { op, dest, src } => {
            if signal {
                let value = operand_value(src, memory);
                let result = match op {
                    TransferOp::Not => !value,
                    TransferOp::Move => value,
                    // Shift/rotate counts come from the destination's prior
                    // value, modulo the word width.
                    TransferOp::Shl => value.wrapping_shl(memory.read_word_addr(dest)),
                    TransferOp::Shr => value.wrapping_shr(memory.read_word_addr(dest)),
                    TransferOp::Rol => value.rotate_left(memory.read_word_addr(dest)),
                    TransferOp::Ror => value.rotate_right(memory.read_word_addr(dest)),
                };
                memory.write_word_addr(dest, result);
            }
            signal
        }
        ParsedInstruction::Compare { op, lhs, rhs } => {
            if signal {
                op.eval(operand_value(lhs, memory), operand_value(rhs, memory))
            } else {
                signal
            }
        }
    }
}

fn operand_value(operand: &Operand, memory: &MemoryBank) -> u32 {
    match operand {
        Operand::Literal(value) => *value,
        Operand::Addr(addr) => memory.read_word_addr(addr),
    }
}

#[cfg(test)]
mod tests {
    use super::{run_scan, ScanScratch};
    use crate::addr::BitRegion;
    use crate::counter::CounterBank;
    use crate::memory::MemoryBank;
    use crate::program::{LinkRecord, NodeRecord, Program, ProgramDocument};
    use crate::timer::TimerBank;

    struct Rig {
        program: Program,
        memory: MemoryBank,
        timers: TimerBank,
        counters: CounterBank,
        scratch: ScanScratch,
    }

    impl Rig {
        fn new(nodes: Vec<NodeRecord>, links: Vec<(i64, i64)>) -> Self {
            let document = ProgramDocument {
                nodes,
                link_data: links
                    .into_iter()
                    .map(|(from, to)| LinkRecord {
                        from,
                        to,
                        ..LinkRecord::default()
                    })
                    .collect(),
            };
            Self {
                program: Program::load(&document),
                memory: MemoryBank::new(),
                timers: TimerBank::new(),
                counters: CounterBank::new(),
                scratch: ScanScratch::new(),
            }
        }

        fn scan(&mut self, now_ms: u64) {
            run_scan(
                &self.program,
                &mut self.memory,
                &mut self.timers,
                &mut self.counters,
                &mut self.scratch,
                now_ms,
            );
        }
    }

    fn node(id: i64, node_type: &str, addr: &str) -> NodeRecord {
        NodeRecord {
            id,
            node_type: node_type.to_string(),
            addr: addr.to_string(),
            ..NodeRecord::default()
        }
    }

    fn instruction(id: i64, mnemonic: &str, args: &str) -> NodeRecord {
        NodeRecord {
            id,
            node_type: "INSTRUCTION".to_string(),
            instruction: mnemonic.to_string(),
            args: args.to_string(),
            ..NodeRecord::default()
        }
    }

    #[test]
    fn open_contact_gates_the_rung_onto_the_coil() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "OPEN", "I0"),
                node(2, "COIL", "Q0"),
            ],
            vec![(0, 1), (1, 2)],
        );

        rig.scan(0);
        assert!(!rig.memory.bit(BitRegion::Output, 0));

        rig.memory.set_bit(BitRegion::Input, 0, true);
        rig.scan(10);
        assert!(rig.memory.bit(BitRegion::Output, 0));

        rig.memory.set_bit(BitRegion::Input, 0, false);
        rig.scan(20);
        assert!(!rig.memory.bit(BitRegion::Output, 0));
    }

    #[test]
    fn network_sources_always_report_true() {
        let mut rig = Rig::new(
            vec![node(0, "NETWORK", "N0"), node(1, "OPEN", "I0")],
            vec![(0, 1)],
        );
        rig.scan(0);
        assert!(rig.scratch.output(0));
        rig.scan(10);
        assert!(rig.scratch.output(0));
        assert!(rig.scratch.prev_output(0));
    }

    #[test]
    fn close_contact_inverts_the_sampled_bit() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "CLOSE", "M0"),
                node(2, "COIL", "Q0"),
            ],
            vec![(0, 1), (1, 2)],
        );

        rig.scan(0);
        assert!(rig.memory.bit(BitRegion::Output, 0));

        rig.memory.set_bit(BitRegion::Marker, 0, true);
        rig.scan(10);
        assert!(!rig.memory.bit(BitRegion::Output, 0));
    }

    #[test]
    fn parallel_branches_merge_as_or() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "OPEN", "M0"),
                node(2, "OPEN", "M1"),
                node(3, "COIL", "Q2"),
            ],
            vec![(0, 1), (0, 2), (1, 3), (2, 3)],
        );

        for (m0, m1) in [(false, false), (true, false), (false, true), (true, true)] {
            rig.memory.set_bit(BitRegion::Marker, 0, m0);
            rig.memory.set_bit(BitRegion::Marker, 1, m1);
            rig.scan(0);
            assert_eq!(rig.memory.bit(BitRegion::Output, 2), m0 || m1);
        }
    }

    #[test]
    fn rising_edge_fires_for_exactly_one_cycle() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "RISING", "I0"),
                node(2, "SET", "M5"),
            ],
            vec![(0, 1), (1, 2)],
        );

        rig.memory.set_bit(BitRegion::Input, 0, true);
        rig.scan(0);
        assert!(rig.memory.bit(BitRegion::Marker, 5));

        // Held input: the edge is consumed, but SET keeps the latch.
        rig.memory.set_bit(BitRegion::Marker, 5, false);
        rig.scan(10);
        assert!(!rig.memory.bit(BitRegion::Marker, 5));
    }

    #[test]
    fn falling_edge_fires_when_the_bit_drops() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "FALLING", "I0"),
                node(2, "COIL", "Q0"),
            ],
            vec![(0, 1), (1, 2)],
        );

        rig.memory.set_bit(BitRegion::Input, 0, true);
        rig.scan(0);
        assert!(!rig.memory.bit(BitRegion::Output, 0));

        rig.memory.set_bit(BitRegion::Input, 0, false);
        rig.scan(10);
        assert!(rig.memory.bit(BitRegion::Output, 0));

        rig.scan(20);
        assert!(!rig.memory.bit(BitRegion::Output, 0));
    }

    #[test]
    fn set_and_reset_latch_against_input_drop() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "OPEN", "I0"),
                node(2, "SET", "M0"),
                node(3, "OPEN", "I1"),
                node(4, "RESET", "M0"),
            ],
            vec![(0, 1), (1, 2), (0, 3), (3, 4)],
        );

        rig.memory.set_bit(BitRegion::Input, 0, true);
        rig.scan(0);
        assert!(rig.memory.bit(BitRegion::Marker, 0));

        rig.memory.set_bit(BitRegion::Input, 0, false);
        rig.scan(10);
        assert!(rig.memory.bit(BitRegion::Marker, 0), "SET holds after input drops");

        rig.memory.set_bit(BitRegion::Input, 1, true);
        rig.scan(20);
        assert!(!rig.memory.bit(BitRegion::Marker, 0));

        rig.memory.set_bit(BitRegion::Input, 1, false);
        rig.scan(30);
        assert!(!rig.memory.bit(BitRegion::Marker, 0), "RESET holds after input drops");
    }

    #[test]
    fn coil_writes_dotted_word_bits() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "OPEN", "I0"),
                node(2, "COIL", "D5.3"),
            ],
            vec![(0, 1), (1, 2)],
        );

        rig.memory.set_bit(BitRegion::Input, 0, true);
        rig.scan(0);
        assert_eq!(rig.memory.word(5), 8);

        rig.memory.set_bit(BitRegion::Input, 0, false);
        rig.scan(10);
        assert_eq!(rig.memory.word(5), 0);
    }

    #[test]
    fn arithmetic_commits_only_while_the_rung_is_true() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "OPEN", "I0"),
                instruction(2, "ADD", "D0:D1:42"),
            ],
            vec![(0, 1), (1, 2)],
        );
        rig.memory.set_word(1, 8);

        rig.scan(0);
        assert_eq!(rig.memory.word(0), 0);

        rig.memory.set_bit(BitRegion::Input, 0, true);
        rig.scan(10);
        assert_eq!(rig.memory.word(0), 50);
    }

    #[test]
    fn division_by_zero_is_a_no_op() {
        let mut rig = Rig::new(
            vec![node(0, "NETWORK", "N0"), instruction(1, "DIV", "D0:D1:D2")],
            vec![(0, 1)],
        );
        rig.memory.set_word(0, 77);
        rig.memory.set_word(1, 10);

        rig.scan(0);
        assert_eq!(rig.memory.word(0), 77);
    }

    #[test]
    fn shift_count_comes_from_the_destination_word() {
        let mut rig = Rig::new(
            vec![node(0, "NETWORK", "N0"), instruction(1, "SHL", "D0:D1")],
            vec![(0, 1)],
        );
        rig.memory.set_word(0, 4);
        rig.memory.set_word(1, 0b0011);

        rig.scan(0);
        assert_eq!(rig.memory.word(0), 0b0011_0000);
    }

    #[test]
    fn comparison_drives_the_node_output() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                instruction(1, "GE", "D0:100"),
                node(2, "OPEN", "D9"),
            ],
            vec![(0, 1), (0, 2)],
        );

        rig.memory.set_word(0, 150);
        rig.scan(0);
        assert!(rig.scratch.output(1));

        rig.memory.set_word(0, 50);
        rig.scan(10);
        assert!(!rig.scratch.output(1));
    }

    #[test]
    fn instruction_outputs_do_not_propagate_over_links() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                instruction(1, "GE", "D0:1"),
                node(2, "COIL", "Q0"),
            ],
            vec![(0, 1), (1, 2)],
        );
        rig.memory.set_word(0, 5);

        rig.scan(0);
        assert!(rig.scratch.output(1), "comparison itself is true");
        assert!(
            !rig.memory.bit(BitRegion::Output, 0),
            "instruction results reach the program only via T/C contacts"
        );
    }

    #[test]
    fn later_networks_observe_earlier_commits_within_one_scan() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "COIL", "M0"),
                node(2, "NETWORK", "N1"),
                node(3, "OPEN", "M0"),
                node(4, "COIL", "Q0"),
            ],
            vec![(0, 1), (2, 3), (3, 4)],
        );

        rig.scan(0);
        assert!(rig.memory.bit(BitRegion::Output, 0), "N1 sees M0 set by N0 this scan");
    }

    #[test]
    fn timer_reset_through_a_reset_coil_clears_the_instance() {
        let mut rig = Rig::new(
            vec![
                node(0, "NETWORK", "N0"),
                node(1, "OPEN", "I0"),
                instruction(2, "TON", "T0:100"),
                node(3, "OPEN", "I1"),
                node(4, "RESET", "T0"),
            ],
            vec![(0, 1), (1, 2), (0, 3), (3, 4)],
        );

        rig.memory.set_bit(BitRegion::Input, 0, true);
        rig.scan(0);
        rig.scan(100);
        assert!(rig.timers.q("T0"));

        rig.memory.set_bit(BitRegion::Input, 1, true);
        rig.scan(110);
        assert!(!rig.timers.q("T0"));
        assert!(!rig.timers.get("T0").expect("instance survives reset").enabled());
    }

    #[test]
    fn networks_without_sources_stay_dark() {
        let mut rig = Rig::new(
            vec![node(1, "OPEN", "I0"), node(2, "COIL", "Q0")],
            vec![(1, 2)],
        );
        rig.memory.set_bit(BitRegion::Input, 0, true);

        rig.scan(0);
        assert!(!rig.scratch.input(1));
        assert!(!rig.memory.bit(BitRegion::Output, 0));
    }
}
