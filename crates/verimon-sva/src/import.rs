//! Property driver: one SVA property to one monitor cell.
//!
//! `import_sva_assert` / `import_sva_assume` / `import_sva_cover` take the
//! root node of a property in a [`PropertyGraph`] and emit the complete
//! monitor circuit into the host [`Module`]: up to three FSMs
//! (antecedent, until, consequent), the implication plumbing, and one
//! final registered monitor cell.

use verimon_netlist::{CellId, Module, SigBit};
use crate::fsm::SvaFsm;
use crate::graph::{PropNetId, PropNodeId, PropertyGraph, SvaOp};
use crate::sequence::SequenceLowerer;
use crate::{ImportOptions, SvaError, SvaResult, UnsupportedPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorMode {
    Assert,
    Assume,
    Cover,
}

/// Import `root` as an assertion. Returns the monitor cell, or `None`
/// when a warn-and-skip policy dropped the property.
pub fn import_sva_assert(
    module: &mut Module,
    graph: &PropertyGraph,
    root: PropNodeId,
    options: &ImportOptions,
) -> SvaResult<Option<CellId>> {
    SvaImporter::new(module, graph, root, options, MonitorMode::Assert).import()
}

/// Import `root` as an assumption.
pub fn import_sva_assume(
    module: &mut Module,
    graph: &PropertyGraph,
    root: PropNodeId,
    options: &ImportOptions,
) -> SvaResult<Option<CellId>> {
    SvaImporter::new(module, graph, root, options, MonitorMode::Assume).import()
}

/// Import `root` as a cover directive.
pub fn import_sva_cover(
    module: &mut Module,
    graph: &PropertyGraph,
    root: PropNodeId,
    options: &ImportOptions,
) -> SvaResult<Option<CellId>> {
    SvaImporter::new(module, graph, root, options, MonitorMode::Cover).import()
}

struct SvaImporter<'a> {
    module: &'a mut Module,
    graph: &'a PropertyGraph,
    root: PropNodeId,
    options: &'a ImportOptions,
    mode: MonitorMode,
    clock: SigBit,
    clock_pol: bool,
    disable_iff: SigBit,
    eventually: bool,
}

impl<'a> SvaImporter<'a> {
    fn new(
        module: &'a mut Module,
        graph: &'a PropertyGraph,
        root: PropNodeId,
        options: &'a ImportOptions,
        mode: MonitorMode,
    ) -> Self {
        Self {
            module,
            graph,
            root,
            options,
            mode,
            clock: SigBit::Zero,
            clock_pol: true,
            disable_iff: SigBit::Zero,
            eventually: false,
        }
    }

    fn sig_of(&self, net: PropNetId) -> SvaResult<SigBit> {
        self.graph
            .sig_of(net)
            .ok_or(SvaError::UnmappedNet { net: net.0 })
    }

    fn driver_op(&self, net: PropNetId) -> Option<(PropNodeId, SvaOp)> {
        let id = self.graph.driver_of(net)?;
        Some((id, self.graph.node(id).op))
    }

    fn lowerer(&self) -> SequenceLowerer<'a> {
        SequenceLowerer {
            graph: self.graph,
            options: self.options,
        }
    }

    fn monitor_name(&self) -> String {
        let base = match &self.graph.node(self.root).name {
            Some(name) => name.as_str(),
            None => match self.mode {
                MonitorMode::Assert => "sva_assert",
                MonitorMode::Assume => "sva_assume",
                MonitorMode::Cover => "sva_cover",
            },
        };
        self.module.uniquify(base)
    }

    fn copy_attributes(&mut self, cell: CellId) {
        let attrs = self.graph.node(self.root).attributes.clone();
        self.module.cell_mut(cell).attributes.extend(attrs);
    }

    fn unsupported_top(&self, node_id: PropNodeId) -> SvaResult<Option<CellId>> {
        let node = self.graph.node(node_id);
        match self.options.unsupported {
            UnsupportedPolicy::Fatal => Err(SvaError::UnsupportedOperator {
                op: node.op.name(),
                loc: node.loc.clone(),
            }),
            UnsupportedPolicy::WarnSkip => {
                log::warn!(
                    "{}: SVA operator `{}` is currently unsupported at property level; \
                     dropping property",
                    node.loc,
                    node.op.name()
                );
                Ok(None)
            }
        }
    }

    fn import(mut self) -> SvaResult<Option<CellId>> {
        let root_node = self.graph.node(self.root);
        log::debug!(
            "importing SVA property at {} ({:?})",
            root_node.loc,
            self.mode
        );

        let prop_net = match root_node.op {
            SvaOp::ImmediateAssert { expr }
            | SvaOp::ImmediateAssume { expr }
            | SvaOp::ImmediateCover { expr } => expr,
            _ => return self.unsupported_top(self.root),
        };

        match self.driver_op(prop_net) {
            Some((_, SvaOp::At { clock, expr })) => self.import_clocked(clock, expr),
            _ => self.import_immediate(prop_net),
        }
    }

    /// No clock node above the property: couple the expression to the
    /// monitor cell directly.
    fn import_immediate(&mut self, net: PropNetId) -> SvaResult<Option<CellId>> {
        let sig = self.sig_of(net)?;
        let name = self.monitor_name();
        let cell = match (self.mode, self.eventually) {
            (MonitorMode::Assert, true) => self.module.add_live(name, sig, SigBit::One),
            (MonitorMode::Assume, true) => self.module.add_fair(name, sig, SigBit::One),
            (MonitorMode::Assert, false) => self.module.add_assert(name, sig, SigBit::One),
            (MonitorMode::Assume, false) => self.module.add_assume(name, sig, SigBit::One),
            (MonitorMode::Cover, _) => self.module.add_cover(name, sig, SigBit::One),
        };
        self.copy_attributes(cell);
        Ok(Some(cell))
    }

    fn import_clocked(
        &mut self,
        clock_net: PropNetId,
        expr_net: PropNetId,
    ) -> SvaResult<Option<CellId>> {
        let root_loc = self.graph.node(self.root).loc.clone();

        match self.driver_op(clock_net) {
            Some((_, SvaOp::Posedge { expr })) => {
                self.clock = self.sig_of(expr)?;
                self.clock_pol = true;
            }
            _ => return Err(SvaError::MissingClock { loc: root_loc }),
        }

        // Strip the s_eventually / disable_iff prefix chain.
        let mut net = expr_net;
        loop {
            match self.driver_op(net) {
                Some((_, SvaOp::SEventually { expr })) => {
                    self.eventually = true;
                    net = expr;
                }
                Some((_, SvaOp::DisableIff { cond, expr })) => {
                    self.disable_iff = self.sig_of(cond)?;
                    net = expr;
                }
                _ => break,
            }
        }

        if self.eventually {
            return Err(SvaError::EventuallyUnsupported { loc: root_loc });
        }

        let prop_okay = match self.driver_op(net) {
            None => self.sig_of(net)?,
            Some((_, SvaOp::OverlappedImplication {
                antecedent,
                consequent,
            })) => self.import_implication(antecedent, consequent, false)?,
            Some((_, SvaOp::NonOverlappedImplication {
                antecedent,
                consequent,
            })) => self.import_implication(antecedent, consequent, true)?,
            _ if self.mode == MonitorMode::Cover => self.sequence_accept(net)?,
            Some((_, SvaOp::Not { expr })) => {
                let accept = self.sequence_accept(expr)?;
                self.module.not(accept)
            }
            Some((id, _)) => return self.unsupported_top(id),
        };

        // Final registered stage: assert/assume start out holding, cover
        // starts out unreached.
        let prop_okay_q = self.module.add_wire_init(self.mode != MonitorMode::Cover);
        self.module
            .dff(self.clock, self.clock_pol, prop_okay, prop_okay_q);

        let name = self.monitor_name();
        let q = SigBit::Wire(prop_okay_q);
        let cell = match self.mode {
            MonitorMode::Assert => self.module.add_assert(name, q, SigBit::One),
            MonitorMode::Assume => self.module.add_assume(name, q, SigBit::One),
            MonitorMode::Cover => self.module.add_cover(name, q, SigBit::One),
        };
        self.copy_attributes(cell);
        Ok(Some(cell))
    }

    /// One FSM for the whole (bare) sequence; returns its accept signal.
    fn sequence_accept(&mut self, net: PropNetId) -> SvaResult<SigBit> {
        let lowerer = self.lowerer();
        let mut fsm = SvaFsm::new(self.clock, self.clock_pol, self.disable_iff, SigBit::One);
        let start = fsm.start_node;
        let node = lowerer.lower(self.module, &mut fsm, start, net)?;
        let accept_node = fsm.accept_node;
        fsm.create_link(self.module, node, accept_node, SigBit::One);
        let accept = fsm.get_accept(self.module);
        if self.options.verbose {
            log::debug!("  sequence FSM:");
            fsm.dump();
        }
        Ok(accept)
    }

    fn import_implication(
        &mut self,
        antecedent: PropNetId,
        consequent: PropNetId,
        non_overlapped: bool,
    ) -> SvaResult<SigBit> {
        let lowerer = self.lowerer();

        // Antecedent FSM: its accept signal triggers the consequent.
        // Non-overlapped implication inserts one empty step.
        let mut antecedent_fsm =
            SvaFsm::new(self.clock, self.clock_pol, self.disable_iff, SigBit::One);
        let start = antecedent_fsm.start_node;
        let mut node = lowerer.lower(self.module, &mut antecedent_fsm, start, antecedent)?;
        if non_overlapped {
            let next = antecedent_fsm.create_node();
            antecedent_fsm.create_edge(self.module, node, next, SigBit::One);
            node = next;
        }
        let accept_node = antecedent_fsm.accept_node;
        antecedent_fsm.create_link(self.module, node, accept_node, SigBit::One);
        let mut antecedent_match = antecedent_fsm.get_accept(self.module);

        if self.options.verbose {
            log::debug!("  antecedent FSM:");
            antecedent_fsm.dump();
        }

        let mut consequent_net = consequent;
        let mut consequent_not = false;
        if let Some((_, SvaOp::Not { expr })) = self.driver_op(consequent_net) {
            consequent_not = true;
            consequent_net = expr;
        }

        if let Some((expr, cond, until_with)) = self
            .driver_op(consequent_net)
            .and_then(|(_, op)| as_until(op))
        {
            consequent_net = expr;

            let mut until_fsm =
                SvaFsm::new(self.clock, self.clock_pol, self.disable_iff, SigBit::One);
            let start = until_fsm.start_node;
            let mut node = lowerer.lower(self.module, &mut until_fsm, start, cond)?;
            if until_with {
                let next = until_fsm.create_node();
                until_fsm.create_edge(self.module, node, next, SigBit::One);
                node = next;
            }
            let accept_node = until_fsm.accept_node;
            until_fsm.create_link(self.module, node, accept_node, SigBit::One);
            let until_match = until_fsm.get_accept(self.module);

            // Hold the antecedent match until the until-condition fires.
            let not_until = self.module.not(until_match);
            let held = self.module.add_wire_init(false);
            antecedent_match = self.module.or(antecedent_match, SigBit::Wire(held));
            let extend = self.module.and(not_until, antecedent_match);
            self.module
                .dff(self.clock, self.clock_pol, extend, held);
        }

        let mut consequent_fsm = SvaFsm::new(
            self.clock,
            self.clock_pol,
            self.disable_iff,
            antecedent_match,
        );
        let start = consequent_fsm.start_node;
        let node = lowerer.lower(self.module, &mut consequent_fsm, start, consequent_net)?;
        let accept_node = consequent_fsm.accept_node;
        consequent_fsm.create_link(self.module, node, accept_node, SigBit::One);

        let prop_okay = if self.mode == MonitorMode::Cover {
            if consequent_not {
                consequent_fsm.get_reject(self.module)?
            } else {
                consequent_fsm.get_accept(self.module)
            }
        } else {
            let consequent_match = if consequent_not {
                consequent_fsm.get_accept(self.module)
            } else {
                consequent_fsm.get_reject(self.module)?
            };
            self.module.not(consequent_match)
        };

        if self.options.verbose {
            log::debug!("  consequent FSM:");
            consequent_fsm.dump();
        }

        Ok(prop_okay)
    }
}

fn as_until(op: SvaOp) -> Option<(PropNetId, PropNetId, bool)> {
    match op {
        SvaOp::Until { expr, cond } | SvaOp::SUntil { expr, cond } => Some((expr, cond, false)),
        SvaOp::UntilWith { expr, cond } | SvaOp::SUntilWith { expr, cond } => {
            Some((expr, cond, true))
        }
        _ => None,
    }
}
