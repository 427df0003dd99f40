//! Program graph model: typed nodes, directional links, and the loader that
//! ingests a program document.
//!
//! Node/link tables are rebuilt whole on every load. Capacity overruns and
//! malformed records are dropped with a log, never a hard failure.

use serde::{Deserialize, Serialize};

use crate::addr::Address;
use crate::instruction::ParsedInstruction;
use crate::network;

/// Maximum number of nodes in a loaded program.
pub const MAX_NODES: usize = 100;
/// Maximum number of links in a loaded program.
pub const MAX_LINKS: usize = 200;

/// Node kinds of the ladder graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Left-rail source; its rung input is unconditionally true.
    Network,
    /// Normally-open contact.
    Open,
    /// Normally-closed contact.
    Close,
    /// Rising-edge contact.
    Rising,
    /// Falling-edge contact.
    Falling,
    /// Inverting contact (same truth table as [`NodeType::Close`]).
    Invert,
    /// Non-latching output coil.
    Coil,
    /// Latching coil: drives its address high while the rung is true.
    Set,
    /// Unlatching coil: drives its address low while the rung is true.
    Reset,
    /// Boxed instruction (timers, counters, arithmetic, comparison).
    Instruction,
}

impl NodeType {
    /// Resolves a document type label by substring match.
    ///
    /// Checks run in a fixed priority order; `RESET` is probed before `SET`
    /// because every `RESET` label contains `SET`. Unrecognized labels fall
    /// back to an open contact.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.to_ascii_uppercase();
        const PRIORITY: &[(&str, NodeType)] = &[
            ("NETWORK", NodeType::Network),
            ("OPEN", NodeType::Open),
            ("CLOSE", NodeType::Close),
            ("RISING", NodeType::Rising),
            ("FALLING", NodeType::Falling),
            ("INVERT", NodeType::Invert),
            ("COIL", NodeType::Coil),
            ("RESET", NodeType::Reset),
            ("SET", NodeType::Set),
            ("INSTRUCTION", NodeType::Instruction),
        ];
        PRIORITY
            .iter()
            .find_map(|(needle, node_type)| label.contains(*needle).then_some(*node_type))
            .unwrap_or(NodeType::Open)
    }

    /// Canonical document label for this node kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "NETWORK",
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
            Self::Rising => "RISING",
            Self::Falling => "FALLING",
            Self::Invert => "INVERT",
            Self::Coil => "COIL",
            Self::Set => "SET",
            Self::Reset => "RESET",
            Self::Instruction => "INSTRUCTION",
        }
    }
}

/// One node of the loaded program graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Stable identifier, doubling as the scratch-array index.
    pub id: usize,
    /// Canonical network id (`"N0"`, `"PUMPS"`, or `"-1"`).
    pub network_id: String,
    /// Node kind.
    pub node_type: NodeType,
    /// Parsed operand address, when the node carries a usable one.
    pub addr: Option<Address>,
    /// Parsed instruction payload for instruction nodes.
    pub instruction: Option<ParsedInstruction>,
    /// Original address text, kept for document re-emission.
    pub raw_addr: String,
    /// Original opcode mnemonic, kept for document re-emission.
    pub raw_instruction: String,
    /// Original argument string, kept for document re-emission.
    pub raw_args: String,
    /// Display label; no runtime semantics.
    pub tag: String,
    /// Editor payload; opaque to the engine.
    pub setpoint: i64,
    /// Editor layout; opaque to the engine.
    pub x: i64,
    /// Editor layout; opaque to the engine.
    pub y: i64,
}

/// One directional edge of the program graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Source node id.
    pub from: usize,
    /// Destination node id.
    pub to: usize,
    /// Advisory source-port label; no runtime semantics.
    pub from_port: String,
    /// Advisory destination-port label; no runtime semantics.
    pub to_port: String,
}

/// Serialized node record as exchanged with editors and storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Stable integer id.
    #[serde(default)]
    pub id: i64,
    /// Network id; empty or `"-1"` means unassigned.
    #[serde(default, rename = "networkId")]
    pub network_id: String,
    /// Type label, resolved by substring match.
    #[serde(default, rename = "type")]
    pub node_type: String,
    /// Operand address text.
    #[serde(default)]
    pub addr: String,
    /// Display label.
    #[serde(default)]
    pub tag: String,
    /// Instruction mnemonic.
    #[serde(default)]
    pub instruction: String,
    /// Colon-delimited instruction arguments.
    #[serde(default)]
    pub args: String,
    /// Editor payload.
    #[serde(default)]
    pub setpoint: i64,
    /// Editor layout.
    #[serde(default)]
    pub x: i64,
    /// Editor layout.
    #[serde(default)]
    pub y: i64,
}

/// Serialized link record as exchanged with editors and storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Source node id.
    #[serde(default)]
    pub from: i64,
    /// Destination node id.
    #[serde(default)]
    pub to: i64,
    /// Advisory source-port label.
    #[serde(default, rename = "fromPort")]
    pub from_port: String,
    /// Advisory destination-port label.
    #[serde(default, rename = "toPort")]
    pub to_port: String,
}

/// Complete program document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDocument {
    /// Node records in document order.
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Link records in document order.
    #[serde(default, rename = "linkData")]
    pub link_data: Vec<LinkRecord>,
}

/// Loaded program: node and link tables plus derived network partitioning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    /// Nodes in document order.
    pub nodes: Vec<Node>,
    /// Links in document order.
    pub links: Vec<Link>,
}

impl Program {
    /// Ingests a program document into runtime tables.
    ///
    /// Nodes beyond capacity, nodes with out-of-range or duplicate ids, and
    /// links with unknown endpoints are dropped with a warning.
    #[must_use]
    pub fn load(document: &ProgramDocument) -> Self {
        let mut nodes: Vec<Node> = Vec::new();

        if document.nodes.len() > MAX_NODES {
            tracing::warn!(
                count = document.nodes.len(),
                limit = MAX_NODES,
                "node table truncated"
            );
        }
        for record in document.nodes.iter().take(MAX_NODES) {
            let Ok(id) = usize::try_from(record.id) else {
                tracing::warn!(id = record.id, "node id is negative, node dropped");
                continue;
            };
            if id >= MAX_NODES {
                tracing::warn!(id, limit = MAX_NODES, "node id out of range, node dropped");
                continue;
            }
            if nodes.iter().any(|node| node.id == id) {
                tracing::warn!(id, "duplicate node id, node dropped");
                continue;
            }
            nodes.push(ingest_node(record, id));
        }

        if document.link_data.len() > MAX_LINKS {
            tracing::warn!(
                count = document.link_data.len(),
                limit = MAX_LINKS,
                "link table truncated"
            );
        }
        let mut links: Vec<Link> = Vec::new();
        for record in document.link_data.iter().take(MAX_LINKS) {
            let endpoints = usize::try_from(record.from)
                .ok()
                .zip(usize::try_from(record.to).ok());
            let Some((from, to)) = endpoints else {
                tracing::warn!(from = record.from, to = record.to, "dangling link dropped");
                continue;
            };
            if !nodes.iter().any(|node| node.id == from)
                || !nodes.iter().any(|node| node.id == to)
            {
                tracing::warn!(from = record.from, to = record.to, "dangling link dropped");
                continue;
            }
            links.push(Link {
                from,
                to,
                from_port: record.from_port.clone(),
                to_port: record.to_port.clone(),
            });
        }

        network::assign_network_ids(&mut nodes, &links);
        Self { nodes, links }
    }

    /// Emits the document form of the loaded program.
    #[must_use]
    pub fn to_document(&self) -> ProgramDocument {
        ProgramDocument {
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeRecord {
                    id: node.id as i64,
                    network_id: node.network_id.clone(),
                    node_type: node.node_type.label().to_string(),
                    addr: node.raw_addr.clone(),
                    tag: node.tag.clone(),
                    instruction: node.raw_instruction.clone(),
                    args: node.raw_args.clone(),
                    setpoint: node.setpoint,
                    x: node.x,
                    y: node.y,
                })
                .collect(),
            link_data: self
                .links
                .iter()
                .map(|link| LinkRecord {
                    from: link.from as i64,
                    to: link.to as i64,
                    from_port: link.from_port.clone(),
                    to_port: link.to_port.clone(),
                })
                .collect(),
        }
    }

    /// Iterates links leaving the given node.
    pub fn links_from(&self, id: usize) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |link| link.from == id)
    }

    /// Iterates nodes belonging to one network, in document order.
    pub fn nodes_in_network<'a>(&'a self, network_id: &'a str) -> impl Iterator<Item = &'a Node> {
        self.nodes
            .iter()
            .filter(move |node| node.network_id == network_id)
    }

    /// Distinct canonical network ids in execution order.
    #[must_use]
    pub fn network_order(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for node in &self.nodes {
            if !ids.contains(&node.network_id) {
                ids.push(node.network_id.clone());
            }
        }
        ids.sort_by(|a, b| network::order_key(a).cmp(&network::order_key(b)));
        ids
    }
}

fn ingest_node(record: &NodeRecord, id: usize) -> Node {
    let node_type = NodeType::from_label(&record.node_type);

    // NETWORK nodes carry a network label in `addr`, not a memory address.
    let addr = if node_type == NodeType::Network || record.addr.trim().is_empty() {
        None
    } else {
        match Address::parse(&record.addr) {
            Ok(addr) => Some(addr),
            Err(error) => {
                tracing::warn!(id, addr = %record.addr, %error, "unusable node address");
                None
            }
        }
    };

    let instruction = if node_type == NodeType::Instruction {
        match ParsedInstruction::parse(&record.instruction, &record.args) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                tracing::error!(
                    id,
                    instruction = %record.instruction,
                    args = %record.args,
                    %error,
                    "instruction disarmed"
                );
                None
            }
        }
    } else {
        None
    };

    Node {
        id,
        network_id: record.network_id.clone(),
        node_type,
        addr,
        instruction,
        raw_addr: record.addr.clone(),
        raw_instruction: record.instruction.clone(),
        raw_args: record.args.clone(),
        tag: record.tag.clone(),
        setpoint: record.setpoint,
        x: record.x,
        y: record.y,
    }
}
