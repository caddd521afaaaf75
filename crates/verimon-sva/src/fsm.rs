//! Per-property automaton container and circuit emission.
//!
//! An [`SvaFsm`] is built incrementally by the sequence lowerer as a
//! non-deterministic FSM whose transitions come in two flavors:
//!
//! - **edges** consume a clock cycle,
//! - **links** propagate within the same cycle (epsilon transitions).
//!
//! Materialization is terminal and happens exactly once, through either
//! [`SvaFsm::get_accept`] (one flop per NFSM state, links resolved by
//! combinational OR-chains in topological order) or
//! [`SvaFsm::get_reject`] (links eliminated into control-bit *sets*,
//! subset construction over all control valuations, one flop per DFSM
//! state with eq-decoded transitions). Acceptance can be observed from
//! the NFSM directly; rejection needs the determinized form, because a
//! nondeterministic automaton only rejects once *every* pending thread
//! has died.

use indexmap::IndexMap;
use std::collections::HashSet;
use verimon_netlist::{Module, SigBit, SigSpec, WireId};
use crate::{SvaError, SvaResult, MAX_CTRL_BITS};

/// NFSM node: `edges` consume a clock cycle, `links` do not.
#[derive(Debug, Default, Clone)]
struct NFsmNode {
    edges: Vec<(usize, SigBit)>,
    links: Vec<(usize, SigBit)>,
}

/// NFSM node after link elimination. Each edge carries the *set* of
/// control bits that must all be high; `accept` lists the control sets
/// under which this node reaches the accept node within the cycle.
#[derive(Debug, Default, Clone)]
struct UFsmNode {
    edges: Vec<(usize, SigSpec)>,
    accept: Vec<SigSpec>,
    reachable: bool,
}

/// DFSM node. A state is a sorted set of UFSM node ids; `ctrl` is the
/// control alphabet observed in this state and every edge/accept/reject
/// entry is a constant valuation of it.
#[derive(Debug, Clone)]
struct DFsmNode {
    ctrl: SigSpec,
    edges: Vec<(Vec<usize>, u32)>,
    accept: Vec<u32>,
    reject: Vec<u32>,
    ffout: Option<WireId>,
    statesig: SigBit,
    nextstate: SigSpec,
}

impl Default for DFsmNode {
    fn default() -> Self {
        Self {
            ctrl: SigSpec::new(),
            edges: Vec::new(),
            accept: Vec::new(),
            reject: Vec::new(),
            ffout: None,
            statesig: SigBit::Zero,
            nextstate: SigSpec::new(),
        }
    }
}

/// The automaton for one property (or one side of an implication).
pub struct SvaFsm {
    clock: SigBit,
    clock_pol: bool,
    trigger_sig: SigBit,
    disable_sig: SigBit,
    throughout_sig: SigBit,
    materialized: bool,
    disable_stack: Vec<SigBit>,
    throughout_stack: Vec<SigBit>,
    pub start_node: usize,
    pub accept_node: usize,
    nodes: Vec<NFsmNode>,
    unodes: Vec<UFsmNode>,
    dnodes: IndexMap<Vec<usize>, DFsmNode>,
}

impl SvaFsm {
    /// `disable` is usually the property's `disable iff` signal (or
    /// constant zero); `trigger` is injected into the start node every
    /// cycle (constant one for self-starting FSMs, the antecedent match
    /// for consequent FSMs).
    pub fn new(clock: SigBit, clock_pol: bool, disable: SigBit, trigger: SigBit) -> Self {
        let mut fsm = Self {
            clock,
            clock_pol,
            trigger_sig: trigger,
            disable_sig: disable,
            throughout_sig: SigBit::One,
            materialized: false,
            disable_stack: Vec::new(),
            throughout_stack: Vec::new(),
            start_node: 0,
            accept_node: 0,
            nodes: Vec::new(),
            unodes: Vec::new(),
            dnodes: IndexMap::new(),
        };
        fsm.start_node = fsm.create_node();
        fsm.accept_node = fsm.create_node();
        fsm
    }

    // ------------------------------------------------------------------
    // Build phase

    pub fn push_disable(&mut self, module: &mut Module, sig: SigBit) {
        assert!(!self.materialized, "FSM already materialized");
        self.disable_stack.push(self.disable_sig);
        self.disable_sig = if self.disable_sig == SigBit::Zero {
            sig
        } else {
            module.or(self.disable_sig, sig)
        };
    }

    pub fn pop_disable(&mut self) {
        assert!(!self.materialized, "FSM already materialized");
        let Some(prev) = self.disable_stack.pop() else {
            panic!("pop_disable without matching push_disable");
        };
        self.disable_sig = prev;
    }

    pub fn push_throughout(&mut self, module: &mut Module, sig: SigBit) {
        assert!(!self.materialized, "FSM already materialized");
        self.throughout_stack.push(self.throughout_sig);
        self.throughout_sig = if self.throughout_sig == SigBit::One {
            sig
        } else {
            module.and(self.throughout_sig, sig)
        };
    }

    pub fn pop_throughout(&mut self) {
        assert!(!self.materialized, "FSM already materialized");
        let Some(prev) = self.throughout_stack.pop() else {
            panic!("pop_throughout without matching push_throughout");
        };
        self.throughout_sig = prev;
    }

    pub fn create_node(&mut self) -> usize {
        assert!(!self.materialized, "FSM already materialized");
        self.nodes.push(NFsmNode::default());
        self.nodes.len() - 1
    }

    /// An active throughout scope is AND-combined into `ctrl`.
    fn scoped_ctrl(&self, module: &mut Module, ctrl: SigBit) -> SigBit {
        if self.throughout_sig == SigBit::One {
            ctrl
        } else if ctrl == SigBit::One {
            self.throughout_sig
        } else {
            module.and(self.throughout_sig, ctrl)
        }
    }

    pub fn create_edge(&mut self, module: &mut Module, from: usize, to: usize, ctrl: SigBit) {
        assert!(!self.materialized, "FSM already materialized");
        assert!(from < self.nodes.len(), "edge from unknown node {}", from);
        assert!(to < self.nodes.len(), "edge to unknown node {}", to);
        let ctrl = self.scoped_ctrl(module, ctrl);
        self.nodes[from].edges.push((to, ctrl));
    }

    pub fn create_link(&mut self, module: &mut Module, from: usize, to: usize, ctrl: SigBit) {
        assert!(!self.materialized, "FSM already materialized");
        assert!(from < self.nodes.len(), "link from unknown node {}", from);
        assert!(to < self.nodes.len(), "link to unknown node {}", to);
        let ctrl = self.scoped_ctrl(module, ctrl);
        self.nodes[from].links.push((to, ctrl));
    }

    // ------------------------------------------------------------------
    // NFSM circuit: accept signal

    /// Relax `order[t] >= order[s] + 1` over every link `s -> t`.
    /// Terminates because supported sequence lowerings never create link
    /// cycles.
    fn make_link_order(&self, order: &mut [usize], node: usize, min: usize) {
        order[node] = order[node].max(min);
        for &(target, _) in &self.nodes[node].links {
            self.make_link_order(order, target, order[node] + 1);
        }
    }

    /// Emit one flip-flop per NFSM state and return the accept node's
    /// state signal.
    pub fn get_accept(&mut self, module: &mut Module) -> SigBit {
        self.begin_materialize();

        let n = self.nodes.len();
        let mut state_wire: Vec<WireId> = Vec::with_capacity(n);
        let mut state_sig: Vec<SigBit> = Vec::with_capacity(n);

        let not_disable = if self.disable_sig != SigBit::Zero {
            Some(module.not(self.disable_sig))
        } else {
            None
        };

        for i in 0..n {
            let w = module.add_wire();
            state_wire.push(w);
            let mut sig = SigBit::Wire(w);
            if i == self.start_node {
                sig = module.or(sig, self.trigger_sig);
            }
            if let Some(nd) = not_disable {
                sig = module.and(sig, nd);
            }
            state_sig.push(sig);
        }

        // Links propagate within the cycle; process sources before targets.
        let mut node_order = vec![0usize; n];
        for i in 0..n {
            self.make_link_order(&mut node_order, i, 0);
        }

        let mut order_to_nodes: Vec<Vec<usize>> = Vec::new();
        for (i, &ord) in node_order.iter().enumerate() {
            if ord >= order_to_nodes.len() {
                order_to_nodes.resize(ord + 1, Vec::new());
            }
            order_to_nodes[ord].push(i);
        }

        for bucket in &order_to_nodes {
            for &node in bucket {
                for &(target, c) in &self.nodes[node].links {
                    let mut ctrl = state_sig[node];
                    if c != SigBit::One {
                        ctrl = module.and(ctrl, c);
                    }
                    state_sig[target] = module.or(state_sig[target], ctrl);
                }
            }
        }

        // Clock-consuming edges become next-state contributions.
        let mut activate: Vec<SigSpec> = vec![SigSpec::new(); n];
        for i in 0..n {
            for &(target, c) in &self.nodes[i].edges {
                let a = module.and(state_sig[i], c);
                activate[target].append_bit(a);
            }
        }

        for i in 0..n {
            let next = Self::reduce_any(module, &activate[i]);
            if next != SigBit::Zero {
                module.wire_mut(state_wire[i]).init = Some(false);
                module.dff(self.clock, self.clock_pol, next, state_wire[i]);
            } else {
                module.connect(state_wire[i], SigBit::Zero);
            }
        }

        state_sig[self.accept_node]
    }

    // ------------------------------------------------------------------
    // Link resolution: NFSM -> UFSM

    fn resolve_links(&mut self) {
        self.unodes = vec![UFsmNode::default(); self.nodes.len()];
        for node in 0..self.nodes.len() {
            Self::node_to_unode(
                &self.nodes,
                self.accept_node,
                &mut self.unodes,
                node,
                node,
                &SigSpec::new(),
            );
        }
    }

    /// Accumulate into `unodes[unode]` everything reachable from `node`
    /// over links, carrying `ctrl` as a canonical control-bit set.
    fn node_to_unode(
        nodes: &[NFsmNode],
        accept_node: usize,
        unodes: &mut [UFsmNode],
        node: usize,
        unode: usize,
        ctrl: &SigSpec,
    ) {
        if node == accept_node {
            unodes[unode].accept.push(ctrl.clone());
        }

        for &(target, c) in &nodes[node].edges {
            if c != SigBit::One {
                let mut s = ctrl.clone();
                s.append_bit(c);
                s.sort_and_unify();
                unodes[unode].edges.push((target, s));
            } else {
                unodes[unode].edges.push((target, ctrl.clone()));
            }
        }

        for &(target, c) in &nodes[node].links {
            if c != SigBit::One {
                let mut s = ctrl.clone();
                s.append_bit(c);
                s.sort_and_unify();
                Self::node_to_unode(nodes, accept_node, unodes, target, unode, &s);
            } else {
                Self::node_to_unode(nodes, accept_node, unodes, target, unode, ctrl);
            }
        }
    }

    fn mark_reachable(&mut self) {
        let mut stack = vec![self.start_node];
        while let Some(u) = stack.pop() {
            if self.unodes[u].reachable {
                continue;
            }
            self.unodes[u].reachable = true;
            for &(target, _) in &self.unodes[u].edges {
                stack.push(target);
            }
        }
    }

    // ------------------------------------------------------------------
    // Subset construction: UFSM -> DFSM

    /// Enumerate every control valuation of every reachable state set.
    /// With `firstmatch`, a valuation that accepts suppresses its
    /// outgoing edges: acceptance wins and the thread does not continue
    /// past the match.
    fn build_dfsm(&mut self, firstmatch: bool) -> SvaResult<()> {
        let mut worklist = vec![vec![self.start_node]];

        while let Some(state) = worklist.pop() {
            if self.dnodes.contains_key(&state) {
                continue;
            }

            let mut dnode = DFsmNode::default();
            for &unode in &state {
                assert!(
                    self.unodes[unode].reachable,
                    "DFSM state references unreachable unode {}",
                    unode
                );
                for (_, s) in &self.unodes[unode].edges {
                    dnode.ctrl.append(s);
                }
                for s in &self.unodes[unode].accept {
                    dnode.ctrl.append(s);
                }
            }
            dnode.ctrl.sort_and_unify();

            if dnode.ctrl.len() > MAX_CTRL_BITS {
                return Err(SvaError::CtrlTooWide {
                    width: dnode.ctrl.len(),
                    limit: MAX_CTRL_BITS,
                });
            }

            for val in 0..(1u32 << dnode.ctrl.len()) {
                let on: HashSet<SigBit> = dnode
                    .ctrl
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| val >> i & 1 == 1)
                    .map(|(_, &bit)| bit)
                    .collect();
                let matches = |s: &SigSpec| s.iter().all(|b| on.contains(b));

                let accept = state
                    .iter()
                    .any(|&u| self.unodes[u].accept.iter().any(|s| matches(s)));

                let mut new_state: Vec<usize> = Vec::new();
                if !(accept && firstmatch) {
                    for &u in &state {
                        for (target, s) in &self.unodes[u].edges {
                            if matches(s) {
                                new_state.push(*target);
                            }
                        }
                    }
                }

                if accept {
                    dnode.accept.push(val);
                }
                if new_state.is_empty() {
                    if !accept {
                        dnode.reject.push(val);
                    }
                } else {
                    new_state.sort_unstable();
                    new_state.dedup();
                    worklist.push(new_state.clone());
                    dnode.edges.push((new_state, val));
                }
            }

            self.dnodes.insert(state, dnode);
        }

        self.dnodes.sort_keys();
        Ok(())
    }

    // ------------------------------------------------------------------
    // DFSM circuit: reject (and optionally accept) signal

    /// The valuation constant as a signal vector, LSB-aligned with `ctrl`.
    fn ctrl_val_spec(val: u32, width: usize) -> SigSpec {
        (0..width)
            .map(|i| {
                if val >> i & 1 == 1 {
                    SigBit::One
                } else {
                    SigBit::Zero
                }
            })
            .collect()
    }

    /// `eq({ctrl, statesig}, {val, 1})` - high iff this state is live and
    /// the control inputs equal the valuation.
    fn decode(module: &mut Module, dnode: &DFsmNode, val: u32) -> SigBit {
        let mut a = dnode.ctrl.clone();
        a.append_bit(dnode.statesig);
        let mut b = Self::ctrl_val_spec(val, dnode.ctrl.len());
        b.append_bit(SigBit::One);
        module.eq(a, b)
    }

    fn reduce_any(module: &mut Module, sig: &SigSpec) -> SigBit {
        match sig.len() {
            0 => SigBit::Zero,
            1 => sig[0],
            _ => module.reduce_or(sig.clone()),
        }
    }

    fn materialize_dfsm(
        &mut self,
        module: &mut Module,
        want_accept: bool,
    ) -> SvaResult<(SigBit, SigBit)> {
        self.begin_materialize();

        self.resolve_links();
        self.mark_reachable();
        self.build_dfsm(true)?;

        let start_state = vec![self.start_node];

        for (key, dnode) in self.dnodes.iter_mut() {
            let w = module.add_wire_init(false);
            dnode.ffout = Some(w);
            dnode.statesig = if *key == start_state {
                module.or(SigBit::Wire(w), self.trigger_sig)
            } else {
                SigBit::Wire(w)
            };
        }

        let mut accept_sig = SigSpec::new();
        let mut reject_sig = SigSpec::new();
        let mut next_contrib: Vec<(Vec<usize>, SigBit)> = Vec::new();

        for dnode in self.dnodes.values() {
            for (target, val) in &dnode.edges {
                let trig = Self::decode(module, dnode, *val);
                next_contrib.push((target.clone(), trig));
            }
            if want_accept {
                for &val in &dnode.accept {
                    accept_sig.append_bit(Self::decode(module, dnode, val));
                }
            }
            for &val in &dnode.reject {
                reject_sig.append_bit(Self::decode(module, dnode, val));
            }
        }

        for (target, trig) in next_contrib {
            self.dnodes[&target].nextstate.append_bit(trig);
        }

        for dnode in self.dnodes.values() {
            let Some(w) = dnode.ffout else { continue };
            let next = Self::reduce_any(module, &dnode.nextstate);
            if next != SigBit::Zero {
                module.dff(self.clock, self.clock_pol, next, w);
            } else {
                module.connect(w, SigBit::Zero);
            }
        }

        let reject = Self::reduce_any(module, &reject_sig);
        let accept = Self::reduce_any(module, &accept_sig);
        Ok((reject, accept))
    }

    /// Determinize and emit the reject circuit; the returned signal is
    /// high in exactly the cycles where no pending thread of the
    /// automaton can still accept.
    pub fn get_reject(&mut self, module: &mut Module) -> SvaResult<SigBit> {
        let (reject, _) = self.materialize_dfsm(module, false)?;
        Ok(reject)
    }

    /// Like [`SvaFsm::get_reject`], additionally decoding the DFSM accept
    /// valuations into an accept signal.
    pub fn get_reject_accept(&mut self, module: &mut Module) -> SvaResult<(SigBit, SigBit)> {
        self.materialize_dfsm(module, true)
    }

    fn begin_materialize(&mut self) {
        assert!(!self.materialized, "FSM already materialized");
        assert!(
            self.disable_stack.is_empty(),
            "unbalanced push_disable at materialization"
        );
        assert!(
            self.throughout_stack.is_empty(),
            "unbalanced push_throughout at materialization"
        );
        self.materialized = true;
    }

    // ------------------------------------------------------------------
    // State dump for verbose log output

    pub fn dump(&self) {
        if !self.nodes.is_empty() {
            log::debug!("  non-deterministic encoding:");
            for (i, node) in self.nodes.iter().enumerate() {
                let tag = if i == self.start_node {
                    " [start]"
                } else if i == self.accept_node {
                    " [accept]"
                } else {
                    ""
                };
                log::debug!("    node {}:{}", i, tag);
                for &(target, c) in &node.edges {
                    log::debug!("      edge {} -> {}", c, target);
                }
                for &(target, c) in &node.links {
                    log::debug!("      link {} -> {}", c, target);
                }
            }
        }

        if !self.unodes.is_empty() {
            log::debug!("  unlinked non-deterministic encoding:");
            for (i, unode) in self.unodes.iter().enumerate() {
                if !unode.reachable {
                    continue;
                }
                let tag = if i == self.start_node { " [start]" } else { "" };
                log::debug!("    unode {}:{}", i, tag);
                for (target, s) in &unode.edges {
                    log::debug!("      edge {} -> {}", s, target);
                }
                for s in &unode.accept {
                    log::debug!("      accept {}", s);
                }
            }
        }

        if !self.dnodes.is_empty() {
            log::debug!("  deterministic encoding:");
            for (key, dnode) in &self.dnodes {
                let tag = if *key == vec![self.start_node] {
                    " [start]"
                } else {
                    ""
                };
                log::debug!("    dnode {:?}:{}", key, tag);
                log::debug!("      ctrl {}", dnode.ctrl);
                let w = dnode.ctrl.len();
                for (target, val) in &dnode.edges {
                    log::debug!("      edge {:0w$b} -> {:?}", val, target, w = w);
                }
                for &val in &dnode.accept {
                    log::debug!("      accept {:0w$b}", val, w = w);
                }
                for &val in &dnode.reject {
                    log::debug!("      reject {:0w$b}", val, w = w);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(module: &mut Module) -> SigBit {
        SigBit::Wire(module.add_wire())
    }

    fn new_fsm() -> SvaFsm {
        SvaFsm::new(SigBit::One, true, SigBit::Zero, SigBit::One)
    }

    #[test]
    fn link_order_increases_along_link_chains() {
        let mut m = Module::new("t");
        let mut fsm = new_fsm();
        let a = fsm.create_node();
        let b = fsm.create_node();
        fsm.create_link(&mut m, fsm.start_node, a, SigBit::One);
        fsm.create_link(&mut m, a, b, SigBit::One);
        fsm.create_link(&mut m, b, fsm.accept_node, SigBit::One);

        let mut order = vec![0usize; 4];
        for i in 0..4 {
            fsm.make_link_order(&mut order, i, 0);
        }
        assert!(order[a] > order[fsm.start_node]);
        assert!(order[b] > order[a]);
        assert!(order[fsm.accept_node] > order[b]);
    }

    #[test]
    fn resolved_ctrl_sets_are_canonical() {
        let mut m = Module::new("t");
        let (x, y) = (wire(&mut m), wire(&mut m));
        let mut fsm = new_fsm();
        // start -link(y)-> a -link(x)-> b -edge(y)-> accept
        let a = fsm.create_node();
        let b = fsm.create_node();
        fsm.create_link(&mut m, fsm.start_node, a, y);
        fsm.create_link(&mut m, a, b, x);
        fsm.create_edge(&mut m, b, fsm.accept_node, y);
        fsm.resolve_links();

        let edges = &fsm.unodes[fsm.start_node].edges;
        assert_eq!(edges.len(), 1);
        let mut canon = edges[0].1.clone();
        canon.sort_and_unify();
        assert_eq!(edges[0].1, canon, "ctrl set must be sorted and unique");
        // y appears both on the link and the edge; the set keeps one copy
        assert_eq!(edges[0].1.len(), 2);
    }

    #[test]
    fn dfsm_partitions_cover_all_valuations() {
        let mut m = Module::new("t");
        let (x, y) = (wire(&mut m), wire(&mut m));
        let mut fsm = new_fsm();
        // start -link(x)-> a -edge-> b -link(y)-> accept
        let a = fsm.create_node();
        let b = fsm.create_node();
        fsm.create_link(&mut m, fsm.start_node, a, x);
        fsm.create_edge(&mut m, a, b, SigBit::One);
        fsm.create_link(&mut m, b, fsm.accept_node, y);

        fsm.resolve_links();
        fsm.mark_reachable();
        fsm.build_dfsm(false).unwrap();

        for (state, dnode) in &fsm.dnodes {
            let total = 1u32 << dnode.ctrl.len();
            for val in 0..total {
                let accepts = dnode.accept.contains(&val);
                let rejects = dnode.reject.contains(&val);
                let edges: Vec<_> = dnode.edges.iter().filter(|(_, v)| *v == val).collect();
                assert!(
                    accepts || rejects || !edges.is_empty(),
                    "valuation {:b} of state {:?} unclassified",
                    val,
                    state
                );
                assert!(!(accepts && rejects));
                assert!(edges.len() <= 1, "duplicate edge for one valuation");
                if rejects {
                    assert!(edges.is_empty(), "reject must have no outgoing edge");
                }
            }
        }
    }

    #[test]
    fn first_match_suppresses_continuation() {
        let mut m = Module::new("t");
        let (x, y) = (wire(&mut m), wire(&mut m));
        let mut fsm = new_fsm();
        // start -link(x)-> a; a -edge-> a (wait); a -link(y)-> accept
        let a = fsm.create_node();
        fsm.create_link(&mut m, fsm.start_node, a, x);
        fsm.create_edge(&mut m, a, a, SigBit::One);
        fsm.create_link(&mut m, a, fsm.accept_node, y);

        fsm.resolve_links();
        fsm.mark_reachable();
        fsm.build_dfsm(true).unwrap();

        for dnode in fsm.dnodes.values() {
            for &val in &dnode.accept {
                assert!(
                    dnode.edges.iter().all(|(_, v)| *v != val),
                    "first-match accept valuation {:b} kept an outgoing edge",
                    val
                );
            }
        }
    }

    #[test]
    fn reject_accept_variant_decodes_both_signals() {
        let mut m = Module::new("t");
        let x = m.add_wire();
        let mut fsm = new_fsm();
        let a = fsm.create_node();
        fsm.create_link(&mut m, fsm.start_node, a, SigBit::Wire(x));
        let accept_node = fsm.accept_node;
        fsm.create_link(&mut m, a, accept_node, SigBit::One);
        let (reject, accept) = fsm.get_reject_accept(&mut m).unwrap();

        let mut sim = verimon_netlist::Sim::new(&m);
        sim.set(x, true).unwrap();
        sim.settle().unwrap();
        assert!(sim.value(accept));
        assert!(!sim.value(reject));

        sim.set(x, false).unwrap();
        sim.settle().unwrap();
        assert!(!sim.value(accept));
        assert!(sim.value(reject));
    }

    #[test]
    fn ctrl_width_limit_is_enforced() {
        let mut m = Module::new("t");
        let mut fsm = new_fsm();
        for _ in 0..(MAX_CTRL_BITS + 1) {
            let sig = wire(&mut m);
            let n = fsm.create_node();
            fsm.create_edge(&mut m, fsm.start_node, n, sig);
        }
        match fsm.get_reject(&mut m) {
            Err(SvaError::CtrlTooWide { width, limit }) => {
                assert_eq!(width, MAX_CTRL_BITS + 1);
                assert_eq!(limit, MAX_CTRL_BITS);
            }
            other => panic!("expected CtrlTooWide, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    #[should_panic(expected = "already materialized")]
    fn build_after_materialize_panics() {
        let mut m = Module::new("t");
        let mut fsm = new_fsm();
        fsm.create_link(&mut m, fsm.start_node, fsm.accept_node, SigBit::One);
        let _ = fsm.get_accept(&mut m);
        fsm.create_node();
    }

    #[test]
    #[should_panic(expected = "unbalanced push_throughout")]
    fn unbalanced_throughout_panics_at_materialization() {
        let mut m = Module::new("t");
        let sig = wire(&mut m);
        let mut fsm = new_fsm();
        fsm.push_throughout(&mut m, sig);
        let _ = fsm.get_accept(&mut m);
    }

    #[test]
    fn throughout_scope_guards_new_edges() {
        let mut m = Module::new("t");
        let (guard, x) = (wire(&mut m), wire(&mut m));
        let mut fsm = new_fsm();
        let a = fsm.create_node();
        fsm.push_throughout(&mut m, guard);
        fsm.create_edge(&mut m, fsm.start_node, a, x);
        fsm.create_edge(&mut m, a, fsm.accept_node, SigBit::One);
        fsm.pop_throughout();
        fsm.create_edge(&mut m, a, a, SigBit::One);

        // inside the scope: ctrl is AND(guard, x) or guard itself
        let scoped = &fsm.nodes[fsm.start_node].edges[0];
        assert_ne!(scoped.1, x);
        let plain_under_scope = &fsm.nodes[a].edges[0];
        assert_eq!(plain_under_scope.1, guard);
        // outside the scope: untouched
        let plain = &fsm.nodes[a].edges[1];
        assert_eq!(plain.1, SigBit::One);
    }
}
