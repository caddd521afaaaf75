//! Circuit IR: wires, signal bits, cells and the module builder API.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a wire within a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WireId(pub u32);

/// Unique identifier for a cell within a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub u32);

/// A single-bit signal: a constant or a wire.
///
/// Constants order before wires, so canonicalized [`SigSpec`]s keep any
/// constant bits at the front.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub enum SigBit {
    #[default]
    Zero,
    One,
    Wire(WireId),
}

impl SigBit {
    pub fn is_const(&self) -> bool {
        !matches!(self, SigBit::Wire(_))
    }

    pub fn as_wire(&self) -> Option<WireId> {
        match self {
            SigBit::Wire(w) => Some(*w),
            _ => None,
        }
    }
}

impl From<WireId> for SigBit {
    fn from(w: WireId) -> Self {
        SigBit::Wire(w)
    }
}

impl fmt::Display for SigBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SigBit::Zero => write!(f, "0"),
            SigBit::One => write!(f, "1"),
            SigBit::Wire(w) => write!(f, "w{}", w.0),
        }
    }
}

/// An ordered vector of signal bits.
///
/// Used both as a gate fan-in list and as the canonical set representation
/// for FSM control vectors: [`SigSpec::sort_and_unify`] sorts and
/// deduplicates in place and is idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SigSpec(Vec<SigBit>);

impl SigSpec {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn append_bit(&mut self, bit: SigBit) {
        self.0.push(bit);
    }

    pub fn append(&mut self, other: &SigSpec) {
        self.0.extend_from_slice(&other.0);
    }

    /// Sort and deduplicate, turning the vector into a canonical set.
    pub fn sort_and_unify(&mut self) {
        self.0.sort();
        self.0.dedup();
    }

    pub fn contains(&self, bit: SigBit) -> bool {
        self.0.contains(&bit)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SigBit> {
        self.0.iter()
    }

    pub fn bits(&self) -> &[SigBit] {
        &self.0
    }
}

impl From<SigBit> for SigSpec {
    fn from(bit: SigBit) -> Self {
        Self(vec![bit])
    }
}

impl FromIterator<SigBit> for SigSpec {
    fn from_iter<T: IntoIterator<Item = SigBit>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::ops::Index<usize> for SigSpec {
    type Output = SigBit;

    fn index(&self, idx: usize) -> &SigBit {
        &self.0[idx]
    }
}

impl fmt::Display for SigSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, bit) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", bit)?;
        }
        write!(f, "}}")
    }
}

/// A wire in the module. `init` is the power-on value of any flip-flop
/// driving this wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wire {
    pub id: WireId,
    pub init: Option<bool>,
}

/// The kinds of monitor cells understood by the verification backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorKind {
    Assert,
    Assume,
    Cover,
    Live,
    Fair,
}

/// A cell instance. Gates drive exactly one wire; monitor cells drive
/// nothing and couple a property signal to the verification backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CellKind {
    Not {
        a: SigBit,
        y: WireId,
    },
    And {
        a: SigBit,
        b: SigBit,
        y: WireId,
    },
    Or {
        a: SigBit,
        b: SigBit,
        y: WireId,
    },
    /// OR-reduction of an arbitrary fan-in list
    ReduceOr {
        a: SigSpec,
        y: WireId,
    },
    /// Bitwise vector equality; `a` and `b` have the same width
    Eq {
        a: SigSpec,
        b: SigSpec,
        y: WireId,
    },
    Dff {
        clock: SigBit,
        clock_pol: bool,
        d: SigBit,
        q: WireId,
    },
    Monitor {
        kind: MonitorKind,
        prop: SigBit,
        enable: SigBit,
    },
}

impl CellKind {
    /// The wire driven by this cell, if any.
    pub fn output(&self) -> Option<WireId> {
        match self {
            CellKind::Not { y, .. }
            | CellKind::And { y, .. }
            | CellKind::Or { y, .. }
            | CellKind::ReduceOr { y, .. }
            | CellKind::Eq { y, .. }
            | CellKind::Dff { q: y, .. } => Some(*y),
            CellKind::Monitor { .. } => None,
        }
    }

    /// The property input, for monitor cells.
    pub fn monitor_prop(&self) -> Option<SigBit> {
        match self {
            CellKind::Monitor { prop, .. } => Some(*prop),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    /// Monitor cells carry a user-visible name; gates are anonymous.
    pub name: Option<String>,
    pub kind: CellKind,
    pub attributes: IndexMap<String, String>,
}

/// A module under construction. The SVA compiler only ever adds to a
/// module; nothing here is removed or rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub wires: Vec<Wire>,
    pub cells: Vec<Cell>,
    /// Alias list: the wire on the left permanently carries the value of
    /// the signal on the right.
    pub connections: Vec<(WireId, SigBit)>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wires: Vec::new(),
            cells: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn add_wire(&mut self) -> WireId {
        let id = WireId(self.wires.len() as u32);
        self.wires.push(Wire { id, init: None });
        id
    }

    pub fn add_wire_init(&mut self, init: bool) -> WireId {
        let id = self.add_wire();
        self.wires[id.0 as usize].init = Some(init);
        id
    }

    pub fn wire(&self, id: WireId) -> &Wire {
        &self.wires[id.0 as usize]
    }

    pub fn wire_mut(&mut self, id: WireId) -> &mut Wire {
        &mut self.wires[id.0 as usize]
    }

    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0 as usize]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.0 as usize]
    }

    fn add_cell(&mut self, name: Option<String>, kind: CellKind) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(Cell {
            id,
            name,
            kind,
            attributes: IndexMap::new(),
        });
        id
    }

    fn add_gate(&mut self, kind: impl FnOnce(WireId) -> CellKind) -> SigBit {
        let y = self.add_wire();
        self.add_cell(None, kind(y));
        SigBit::Wire(y)
    }

    pub fn not(&mut self, a: SigBit) -> SigBit {
        self.add_gate(|y| CellKind::Not { a, y })
    }

    pub fn and(&mut self, a: SigBit, b: SigBit) -> SigBit {
        self.add_gate(|y| CellKind::And { a, b, y })
    }

    pub fn or(&mut self, a: SigBit, b: SigBit) -> SigBit {
        self.add_gate(|y| CellKind::Or { a, b, y })
    }

    pub fn reduce_or(&mut self, a: SigSpec) -> SigBit {
        self.add_gate(|y| CellKind::ReduceOr { a, y })
    }

    pub fn eq(&mut self, a: SigSpec, b: SigSpec) -> SigBit {
        assert_eq!(a.len(), b.len(), "eq operands must have the same width");
        self.add_gate(|y| CellKind::Eq { a, b, y })
    }

    pub fn dff(&mut self, clock: SigBit, clock_pol: bool, d: SigBit, q: WireId) -> CellId {
        self.add_cell(
            None,
            CellKind::Dff {
                clock,
                clock_pol,
                d,
                q,
            },
        )
    }

    pub fn connect(&mut self, wire: WireId, value: SigBit) {
        self.connections.push((wire, value));
    }

    fn add_monitor(
        &mut self,
        kind: MonitorKind,
        name: impl Into<String>,
        prop: SigBit,
        enable: SigBit,
    ) -> CellId {
        self.add_cell(Some(name.into()), CellKind::Monitor { kind, prop, enable })
    }

    pub fn add_assert(&mut self, name: impl Into<String>, prop: SigBit, enable: SigBit) -> CellId {
        self.add_monitor(MonitorKind::Assert, name, prop, enable)
    }

    pub fn add_assume(&mut self, name: impl Into<String>, prop: SigBit, enable: SigBit) -> CellId {
        self.add_monitor(MonitorKind::Assume, name, prop, enable)
    }

    pub fn add_cover(&mut self, name: impl Into<String>, prop: SigBit, enable: SigBit) -> CellId {
        self.add_monitor(MonitorKind::Cover, name, prop, enable)
    }

    pub fn add_live(&mut self, name: impl Into<String>, prop: SigBit, enable: SigBit) -> CellId {
        self.add_monitor(MonitorKind::Live, name, prop, enable)
    }

    pub fn add_fair(&mut self, name: impl Into<String>, prop: SigBit, enable: SigBit) -> CellId {
        self.add_monitor(MonitorKind::Fair, name, prop, enable)
    }

    /// Derive a cell name not used by any existing cell.
    pub fn uniquify(&self, base: &str) -> String {
        let taken = |n: &str| self.cells.iter().any(|c| c.name.as_deref() == Some(n));
        if !taken(base) {
            return base.to_string();
        }
        let mut i = 1;
        loop {
            let candidate = format!("{}_{}", base, i);
            if !taken(&candidate) {
                return candidate;
            }
            i += 1;
        }
    }

    pub fn num_dffs(&self) -> usize {
        self.cells
            .iter()
            .filter(|c| matches!(c.kind, CellKind::Dff { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigspec_sort_and_unify_is_idempotent() {
        let w = |n| SigBit::Wire(WireId(n));
        let mut spec: SigSpec = [w(3), SigBit::One, w(1), w(3), SigBit::Zero, w(1)]
            .into_iter()
            .collect();
        spec.sort_and_unify();
        let once = spec.clone();
        spec.sort_and_unify();
        assert_eq!(spec, once);
        assert_eq!(spec.bits(), &[SigBit::Zero, SigBit::One, w(1), w(3)]);
    }

    #[test]
    fn gates_drive_fresh_wires() {
        let mut m = Module::new("t");
        let a = SigBit::Wire(m.add_wire());
        let b = SigBit::Wire(m.add_wire());
        let y = m.and(a, b);
        assert_ne!(y, a);
        assert_ne!(y, b);
        assert_eq!(m.cells.len(), 1);
        assert_eq!(m.cells[0].kind.output(), y.as_wire());
    }

    #[test]
    fn uniquify_avoids_existing_names() {
        let mut m = Module::new("t");
        let p = SigBit::One;
        m.add_assert("chk", p, SigBit::One);
        assert_eq!(m.uniquify("chk"), "chk_1");
        assert_eq!(m.uniquify("other"), "other");
    }
}
