//! SVA operator graph: the interface to the frontend.
//!
//! The upstream netlist importer resolves SVA primitive instances into
//! typed operator nodes and maps the surrounding wires to host-module
//! signal bits. This module is the data model it fills in: an arena of
//! property nets and operator nodes. The compiler core only consumes it
//! through [`PropertyGraph::driver_of`] and [`PropertyGraph::sig_of`].

use indexmap::IndexMap;
use std::fmt;
use verimon_netlist::SigBit;

/// Unique identifier for a property net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropNetId(pub u32);

/// Unique identifier for an operator node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropNodeId(pub u32);

/// Source position carried through from the frontend for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: String,
    pub line: u32,
}

impl SourceLoc {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    pub fn unknown() -> Self {
        Self {
            file: "<unknown>".to_string(),
            line: 0,
        }
    }
}

impl Default for SourceLoc {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// SVA primitive operators, one variant per opcode, each carrying its
/// child net handles. Repeat/concat ranges travel as the string
/// attributes `sva:low`/`sva:high` on the node (`"$"` = unbounded), the
/// way the frontend hands them over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvaOp {
    Posedge { expr: PropNetId },
    At { clock: PropNetId, expr: PropNetId },
    DisableIff { cond: PropNetId, expr: PropNetId },
    SEventually { expr: PropNetId },
    OverlappedImplication { antecedent: PropNetId, consequent: PropNetId },
    NonOverlappedImplication { antecedent: PropNetId, consequent: PropNetId },
    Not { expr: PropNetId },
    SeqConcat { left: PropNetId, right: PropNetId },
    ConsecutiveRepeat { body: PropNetId },
    Throughout { cond: PropNetId, body: PropNetId },
    Until { expr: PropNetId, cond: PropNetId },
    SUntil { expr: PropNetId, cond: PropNetId },
    UntilWith { expr: PropNetId, cond: PropNetId },
    SUntilWith { expr: PropNetId, cond: PropNetId },
    ImmediateAssert { expr: PropNetId },
    ImmediateAssume { expr: PropNetId },
    ImmediateCover { expr: PropNetId },
    // Sampled-value functions: present in the opcode set but rejected as
    // leaves (a net driven by one reads as driverless).
    Rose { expr: PropNetId },
    Fell { expr: PropNetId },
    Stable { expr: PropNetId },
    Past { expr: PropNetId },
}

impl SvaOp {
    pub fn name(&self) -> &'static str {
        match self {
            SvaOp::Posedge { .. } => "posedge",
            SvaOp::At { .. } => "at",
            SvaOp::DisableIff { .. } => "disable_iff",
            SvaOp::SEventually { .. } => "s_eventually",
            SvaOp::OverlappedImplication { .. } => "overlapped_implication",
            SvaOp::NonOverlappedImplication { .. } => "non_overlapped_implication",
            SvaOp::Not { .. } => "not",
            SvaOp::SeqConcat { .. } => "seq_concat",
            SvaOp::ConsecutiveRepeat { .. } => "consecutive_repeat",
            SvaOp::Throughout { .. } => "throughout",
            SvaOp::Until { .. } => "until",
            SvaOp::SUntil { .. } => "s_until",
            SvaOp::UntilWith { .. } => "until_with",
            SvaOp::SUntilWith { .. } => "s_until_with",
            SvaOp::ImmediateAssert { .. } => "immediate_assert",
            SvaOp::ImmediateAssume { .. } => "immediate_assume",
            SvaOp::ImmediateCover { .. } => "immediate_cover",
            SvaOp::Rose { .. } => "rose",
            SvaOp::Fell { .. } => "fell",
            SvaOp::Stable { .. } => "stable",
            SvaOp::Past { .. } => "past",
        }
    }

    fn rejected_as_leaf(&self) -> bool {
        matches!(
            self,
            SvaOp::Rose { .. } | SvaOp::Fell { .. } | SvaOp::Stable { .. } | SvaOp::Past { .. }
        )
    }
}

/// An operator node. `name` is the user-declared label, when one exists.
#[derive(Debug, Clone)]
pub struct PropNode {
    pub op: SvaOp,
    pub name: Option<String>,
    pub loc: SourceLoc,
    pub attributes: IndexMap<String, String>,
}

impl PropNode {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
struct PropNet {
    driver: Option<PropNodeId>,
    multi_driven: bool,
    sig: Option<SigBit>,
}

/// Arena of property nets and operator nodes for one or more properties.
#[derive(Debug, Clone, Default)]
pub struct PropertyGraph {
    nets: Vec<PropNet>,
    nodes: Vec<PropNode>,
}

impl PropertyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A net with no driver and no host mapping yet.
    pub fn add_net(&mut self) -> PropNetId {
        let id = PropNetId(self.nets.len() as u32);
        self.nets.push(PropNet::default());
        id
    }

    /// A net carrying a host-module signal bit (an expression leaf).
    pub fn add_signal_net(&mut self, sig: SigBit) -> PropNetId {
        let id = self.add_net();
        self.nets[id.0 as usize].sig = Some(sig);
        id
    }

    pub fn set_signal(&mut self, net: PropNetId, sig: SigBit) {
        self.nets[net.0 as usize].sig = Some(sig);
    }

    pub fn add_node(&mut self, op: SvaOp) -> PropNodeId {
        let id = PropNodeId(self.nodes.len() as u32);
        self.nodes.push(PropNode {
            op,
            name: None,
            loc: SourceLoc::unknown(),
            attributes: IndexMap::new(),
        });
        id
    }

    /// Make `node` the driver of `net`. A second driver marks the net
    /// multiply-driven, which downgrades it to a leaf.
    pub fn drive(&mut self, net: PropNetId, node: PropNodeId) {
        let n = &mut self.nets[net.0 as usize];
        if n.driver.is_some() {
            n.multi_driven = true;
        } else {
            n.driver = Some(node);
        }
    }

    /// Add an operator node driving a fresh net; the common case.
    pub fn add_op(&mut self, op: SvaOp) -> PropNetId {
        let node = self.add_node(op);
        let net = self.add_net();
        self.drive(net, node);
        net
    }

    pub fn set_attr(&mut self, net: PropNetId, key: &str, value: &str) {
        if let Some(node) = self.nets[net.0 as usize].driver {
            self.nodes[node.0 as usize]
                .attributes
                .insert(key.to_string(), value.to_string());
        }
    }

    pub fn set_loc(&mut self, net: PropNetId, loc: SourceLoc) {
        if let Some(node) = self.nets[net.0 as usize].driver {
            self.nodes[node.0 as usize].loc = loc;
        }
    }

    pub fn set_name(&mut self, net: PropNetId, name: &str) {
        if let Some(node) = self.nets[net.0 as usize].driver {
            self.nodes[node.0 as usize].name = Some(name.to_string());
        }
    }

    pub fn node(&self, id: PropNodeId) -> &PropNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: PropNodeId) -> &mut PropNode {
        &mut self.nodes[id.0 as usize]
    }

    /// The operator node driving `net`, or `None` for undriven,
    /// multiply-driven, and sampled-value-driven nets (all of which the
    /// lowerer treats as expression leaves).
    pub fn driver_of(&self, net: PropNetId) -> Option<PropNodeId> {
        let n = &self.nets[net.0 as usize];
        if n.multi_driven {
            return None;
        }
        let id = n.driver?;
        if self.nodes[id.0 as usize].op.rejected_as_leaf() {
            return None;
        }
        Some(id)
    }

    /// The host signal bit mapped to `net`, when the frontend mapped one.
    pub fn sig_of(&self, net: PropNetId) -> Option<SigBit> {
        self.nets[net.0 as usize].sig
    }
}
