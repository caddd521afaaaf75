//! Cycle-accurate interpreter for monitor circuits.
//!
//! `Sim` drives a [`Module`] one clock cycle at a time: set the undriven
//! input wires, [`Sim::settle`] the combinational logic, inspect monitor
//! cells, then [`Sim::tick`] to apply one active clock edge to every
//! flip-flop.
//!
//! The interpreter assumes a single clock domain (every DFF is clocked by
//! `tick`, whatever its clock wiring says) and a combinational part that is
//! a DAG. Emitted monitor circuits satisfy both by construction; a
//! combinational loop shows up as [`NetlistError::CombLoop`].

use crate::netlist::{CellId, CellKind, Module, MonitorKind, SigBit, SigSpec, WireId};
use crate::{NetlistError, NetlistResult};

pub struct Sim<'m> {
    module: &'m Module,
    values: Vec<bool>,
    driven: Vec<bool>,
}

impl<'m> Sim<'m> {
    pub fn new(module: &'m Module) -> Self {
        let mut values = vec![false; module.wires.len()];
        let mut driven = vec![false; module.wires.len()];

        for wire in &module.wires {
            if let Some(init) = wire.init {
                values[wire.id.0 as usize] = init;
            }
        }
        for cell in &module.cells {
            if let Some(y) = cell.kind.output() {
                driven[y.0 as usize] = true;
            }
        }
        for (w, _) in &module.connections {
            driven[w.0 as usize] = true;
        }

        Self {
            module,
            values,
            driven,
        }
    }

    pub fn value(&self, sig: SigBit) -> bool {
        match sig {
            SigBit::Zero => false,
            SigBit::One => true,
            SigBit::Wire(w) => self.values[w.0 as usize],
        }
    }

    fn spec_value(&self, spec: &SigSpec) -> Vec<bool> {
        spec.iter().map(|&b| self.value(b)).collect()
    }

    /// Drive an input wire. Fails for wires driven inside the module.
    pub fn set(&mut self, wire: WireId, value: bool) -> NetlistResult<()> {
        if self.driven[wire.0 as usize] {
            return Err(NetlistError::DrivenWire(wire.0));
        }
        self.values[wire.0 as usize] = value;
        Ok(())
    }

    /// Propagate combinational logic to a fixpoint. DFF outputs keep their
    /// current state.
    pub fn settle(&mut self) -> NetlistResult<()> {
        let limit = self.module.wires.len() + 2;
        for _ in 0..limit {
            if !self.propagate_once() {
                return Ok(());
            }
        }
        Err(NetlistError::CombLoop(limit))
    }

    fn propagate_once(&mut self) -> bool {
        let mut changed = false;
        for cell in &self.module.cells {
            let (y, v) = match &cell.kind {
                CellKind::Not { a, y } => (*y, !self.value(*a)),
                CellKind::And { a, b, y } => (*y, self.value(*a) && self.value(*b)),
                CellKind::Or { a, b, y } => (*y, self.value(*a) || self.value(*b)),
                CellKind::ReduceOr { a, y } => (*y, a.iter().any(|&b| self.value(b))),
                CellKind::Eq { a, b, y } => (*y, self.spec_value(a) == self.spec_value(b)),
                CellKind::Dff { .. } | CellKind::Monitor { .. } => continue,
            };
            if self.values[y.0 as usize] != v {
                self.values[y.0 as usize] = v;
                changed = true;
            }
        }
        for &(w, s) in &self.module.connections {
            let v = self.value(s);
            if self.values[w.0 as usize] != v {
                self.values[w.0 as usize] = v;
                changed = true;
            }
        }
        changed
    }

    /// One active clock edge: sample every DFF input, commit, re-settle.
    pub fn tick(&mut self) -> NetlistResult<()> {
        let next: Vec<(WireId, bool)> = self
            .module
            .cells
            .iter()
            .filter_map(|cell| match &cell.kind {
                CellKind::Dff { d, q, .. } => Some((*q, self.value(*d))),
                _ => None,
            })
            .collect();
        for (q, v) in next {
            self.values[q.0 as usize] = v;
        }
        self.settle()
    }

    /// Current `(kind, prop, enable)` of a monitor cell, or `None` if the
    /// cell is not a monitor.
    pub fn monitor(&self, cell: CellId) -> Option<(MonitorKind, bool, bool)> {
        match &self.module.cell(cell).kind {
            CellKind::Monitor { kind, prop, enable } => {
                Some((*kind, self.value(*prop), self.value(*enable)))
            }
            _ => None,
        }
    }
}
