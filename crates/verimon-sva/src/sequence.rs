//! Sequence lowerer: operator tree to NFSM fragments.
//!
//! [`SequenceLowerer::lower`] extends an [`SvaFsm`] so that a path from
//! `start_node` to the returned end node exists iff the sequence matches.
//! It never touches the FSM's accept node; callers attach the returned
//! end themselves.

use verimon_netlist::{Module, SigBit};
use crate::fsm::SvaFsm;
use crate::graph::{PropNetId, PropNode, PropertyGraph};
use crate::{ImportOptions, SvaError, SvaResult, UnsupportedPolicy};

/// Upper bound of a `##[L:H]` / `[*L:H]` range. `"$"` lowers to
/// `Unbounded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatBound {
    Finite(u32),
    Unbounded,
}

pub(crate) struct SequenceLowerer<'a> {
    pub graph: &'a PropertyGraph,
    pub options: &'a ImportOptions,
}

impl SequenceLowerer<'_> {
    /// Lower the sequence driving `net`, starting at `start_node`.
    /// Returns the node the sequence ends in.
    pub fn lower(
        &self,
        module: &mut Module,
        fsm: &mut SvaFsm,
        start_node: usize,
        net: PropNetId,
    ) -> SvaResult<usize> {
        use crate::graph::SvaOp::*;

        let Some(node_id) = self.graph.driver_of(net) else {
            // Expression leaf: one link guarded by the mapped signal.
            let sig = self.sig_of(net)?;
            let node = fsm.create_node();
            fsm.create_link(module, start_node, node, sig);
            return Ok(node);
        };
        let prop_node = self.graph.node(node_id);

        match prop_node.op {
            SeqConcat { left, right } => {
                let (low, high) = parse_range(prop_node)?;

                let mut node = self.lower(module, fsm, start_node, left)?;

                for _ in 0..low {
                    let next = fsm.create_node();
                    fsm.create_edge(module, node, next, SigBit::One);
                    node = next;
                }

                match high {
                    RepeatBound::Unbounded => {
                        fsm.create_edge(module, node, node, SigBit::One);
                    }
                    RepeatBound::Finite(high) => {
                        // Optional extra steps: edge to advance, link to skip.
                        for _ in low..high {
                            let next = fsm.create_node();
                            fsm.create_edge(module, node, next, SigBit::One);
                            fsm.create_link(module, node, next, SigBit::One);
                            node = next;
                        }
                    }
                }

                self.lower(module, fsm, node, right)
            }

            ConsecutiveRepeat { body } => {
                let (low, high) = parse_range(prop_node)?;

                let mut node = self.lower(module, fsm, start_node, body)?;

                for _ in 1..low {
                    let next = fsm.create_node();
                    fsm.create_edge(module, node, next, SigBit::One);
                    node = self.lower(module, fsm, next, body)?;
                }

                match high {
                    RepeatBound::Unbounded => {
                        let next = fsm.create_node();
                        fsm.create_edge(module, node, next, SigBit::One);
                        let end = self.lower(module, fsm, next, body)?;
                        fsm.create_link(module, end, node, SigBit::One);
                    }
                    RepeatBound::Finite(high) => {
                        for _ in low..high {
                            let next = fsm.create_node();
                            fsm.create_edge(module, node, next, SigBit::One);
                            let end = self.lower(module, fsm, next, body)?;
                            fsm.create_link(module, node, end, SigBit::One);
                            node = end;
                        }
                    }
                }

                Ok(node)
            }

            Throughout { cond, body } => {
                let expr = self.sig_of(cond)?;
                fsm.push_throughout(module, expr);
                let result = self.lower(module, fsm, start_node, body);
                fsm.pop_throughout();
                result
            }

            _ => self.unsupported(prop_node, start_node),
        }
    }

    fn sig_of(&self, net: PropNetId) -> SvaResult<SigBit> {
        self.graph
            .sig_of(net)
            .ok_or(SvaError::UnmappedNet { net: net.0 })
    }

    /// Degenerate lowering for unsupported operators: fatal, or warn and
    /// treat the operator as a no-op (the sequence continues where it
    /// started).
    fn unsupported(&self, node: &PropNode, start_node: usize) -> SvaResult<usize> {
        match self.options.unsupported {
            UnsupportedPolicy::Fatal => Err(SvaError::UnsupportedOperator {
                op: node.op.name(),
                loc: node.loc.clone(),
            }),
            UnsupportedPolicy::WarnSkip => {
                log::warn!(
                    "{}: SVA operator `{}` is currently unsupported in sequence position; \
                     lowering as no-op",
                    node.loc,
                    node.op.name()
                );
                Ok(start_node)
            }
        }
    }
}

/// Parse the `sva:low`/`sva:high` range attributes. The low bound is a
/// nonnegative integer; the high bound is either an integer `>=` low or
/// the sentinel `"$"`.
pub(crate) fn parse_range(node: &PropNode) -> SvaResult<(u32, RepeatBound)> {
    let invalid = |reason: String| SvaError::InvalidRange {
        reason,
        loc: node.loc.clone(),
    };

    let low_s = node
        .attr("sva:low")
        .ok_or_else(|| invalid("missing sva:low attribute".to_string()))?;
    let low: u32 = low_s
        .trim()
        .parse()
        .map_err(|_| invalid(format!("bad low bound `{}`", low_s)))?;

    let high_s = node
        .attr("sva:high")
        .ok_or_else(|| invalid("missing sva:high attribute".to_string()))?;
    if high_s.trim() == "$" {
        return Ok((low, RepeatBound::Unbounded));
    }
    let high: u32 = high_s
        .trim()
        .parse()
        .map_err(|_| invalid(format!("bad high bound `{}`", high_s)))?;
    if high < low {
        return Err(invalid(format!("high bound {} below low bound {}", high, low)));
    }
    Ok((low, RepeatBound::Finite(high)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{PropertyGraph, SourceLoc, SvaOp};
    use verimon_netlist::WireId;

    fn concat_node(low: &str, high: &str) -> PropNode {
        let mut g = PropertyGraph::new();
        let sig = g.add_signal_net(SigBit::Wire(WireId(0)));
        let net = g.add_op(SvaOp::SeqConcat {
            left: sig,
            right: sig,
        });
        g.set_attr(net, "sva:low", low);
        g.set_attr(net, "sva:high", high);
        g.node(g.driver_of(net).unwrap()).clone()
    }

    #[test]
    fn range_parsing_accepts_dollar_sentinel() {
        assert_eq!(
            parse_range(&concat_node("1", "$")).unwrap(),
            (1, RepeatBound::Unbounded)
        );
        assert_eq!(
            parse_range(&concat_node("2", "5")).unwrap(),
            (2, RepeatBound::Finite(5))
        );
    }

    #[test]
    fn range_parsing_rejects_bad_bounds() {
        assert!(matches!(
            parse_range(&concat_node("-1", "3")),
            Err(SvaError::InvalidRange { .. })
        ));
        assert!(matches!(
            parse_range(&concat_node("4", "2")),
            Err(SvaError::InvalidRange { .. })
        ));
        assert!(matches!(
            parse_range(&concat_node("1", "many")),
            Err(SvaError::InvalidRange { .. })
        ));
    }

    #[test]
    fn unsupported_operator_respects_policy() {
        let mut g = PropertyGraph::new();
        let sig = g.add_signal_net(SigBit::Wire(WireId(0)));
        let cond = g.add_signal_net(SigBit::Wire(WireId(1)));
        let until = g.add_op(SvaOp::Until {
            expr: sig,
            cond,
        });
        g.set_loc(until, SourceLoc::new("dut.sv", 42));

        let mut module = verimon_netlist::Module::new("t");
        let mut fsm = SvaFsm::new(SigBit::One, true, SigBit::Zero, SigBit::One);

        let fatal = ImportOptions::default();
        let lowerer = SequenceLowerer {
            graph: &g,
            options: &fatal,
        };
        let start = fsm.start_node;
        let err = lowerer
            .lower(&mut module, &mut fsm, start, until)
            .unwrap_err();
        assert!(err.to_string().contains("dut.sv:42"));

        let keep = ImportOptions {
            unsupported: UnsupportedPolicy::WarnSkip,
            ..Default::default()
        };
        let lowerer = SequenceLowerer {
            graph: &g,
            options: &keep,
        };
        let start = fsm.start_node;
        assert_eq!(
            lowerer.lower(&mut module, &mut fsm, start, until).unwrap(),
            start
        );
    }
}
