//! Error paths, degenerate-lowering policy and monitor cell metadata.

use verimon_netlist::{Module, SigBit};
use verimon_sva::graph::SourceLoc;
use verimon_sva::{
    import_sva_assert, ImportOptions, PropNetId, PropNodeId, PropertyGraph, SvaError, SvaOp,
    UnsupportedPolicy,
};

fn clocked_root(
    m: &mut Module,
    g: &mut PropertyGraph,
    prop: PropNetId,
) -> PropNodeId {
    let clk_net = {
        let w = m.add_wire();
        g.add_signal_net(SigBit::Wire(w))
    };
    let pos = g.add_op(SvaOp::Posedge { expr: clk_net });
    let at = g.add_op(SvaOp::At {
        clock: pos,
        expr: prop,
    });
    let root = g.add_op(SvaOp::ImmediateAssert { expr: at });
    g.driver_of(root).expect("root node")
}

fn leaf(m: &mut Module, g: &mut PropertyGraph) -> PropNetId {
    let w = m.add_wire();
    g.add_signal_net(SigBit::Wire(w))
}

#[test]
fn eventually_under_a_clocked_property_is_rejected() {
    let mut m = Module::new("dut");
    let mut g = PropertyGraph::new();
    let a = leaf(&mut m, &mut g);
    let b = leaf(&mut m, &mut g);
    let imp = g.add_op(SvaOp::OverlappedImplication {
        antecedent: a,
        consequent: b,
    });
    let ev = g.add_op(SvaOp::SEventually { expr: imp });
    let root = clocked_root(&mut m, &mut g, ev);

    let err = import_sva_assert(&mut m, &g, root, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, SvaError::EventuallyUnsupported { .. }));
}

#[test]
fn missing_posedge_clock_is_rejected() {
    let mut m = Module::new("dut");
    let mut g = PropertyGraph::new();
    let a = leaf(&mut m, &mut g);
    // @(clk) with a bare signal where the posedge node should be
    let clk = leaf(&mut m, &mut g);
    let at = g.add_op(SvaOp::At {
        clock: clk,
        expr: a,
    });
    let root_net = g.add_op(SvaOp::ImmediateAssert { expr: at });
    let root = g.driver_of(root_net).unwrap();

    let err = import_sva_assert(&mut m, &g, root, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, SvaError::MissingClock { .. }));
}

#[test]
fn unsupported_top_operator_fatal_and_keep() {
    let mut m = Module::new("dut");
    let mut g = PropertyGraph::new();
    let a = leaf(&mut m, &mut g);
    let b = leaf(&mut m, &mut g);
    // `a until b` directly under the clock is not a supported property style
    let until = g.add_op(SvaOp::Until { expr: a, cond: b });
    g.set_loc(until, SourceLoc::new("prop.sv", 7));
    let root = clocked_root(&mut m, &mut g, until);

    let err = import_sva_assert(&mut m, &g, root, &ImportOptions::default()).unwrap_err();
    match &err {
        SvaError::UnsupportedOperator { op, loc } => {
            assert_eq!(*op, "until");
            assert_eq!(loc.line, 7);
        }
        other => panic!("expected UnsupportedOperator, got {other:?}"),
    }

    let keep = ImportOptions {
        unsupported: UnsupportedPolicy::WarnSkip,
        ..Default::default()
    };
    let cells_before = m.cells.len();
    let result = import_sva_assert(&mut m, &g, root, &keep).unwrap();
    assert!(result.is_none(), "keep mode drops the property");
    assert_eq!(m.cells.len(), cells_before, "no monitor cell emitted");
}

#[test]
fn malformed_range_attributes_are_rejected() {
    let mut m = Module::new("dut");
    let mut g = PropertyGraph::new();
    let a = leaf(&mut m, &mut g);
    let b = leaf(&mut m, &mut g);
    let c = leaf(&mut m, &mut g);
    let seq = g.add_op(SvaOp::SeqConcat { left: a, right: b });
    g.set_attr(seq, "sva:low", "2");
    g.set_attr(seq, "sva:high", "1");
    let imp = g.add_op(SvaOp::OverlappedImplication {
        antecedent: seq,
        consequent: c,
    });
    let root = clocked_root(&mut m, &mut g, imp);

    let err = import_sva_assert(&mut m, &g, root, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, SvaError::InvalidRange { .. }));
}

#[test]
fn root_attributes_are_copied_to_the_monitor_cell() {
    let mut m = Module::new("dut");
    let mut g = PropertyGraph::new();
    let a = leaf(&mut m, &mut g);
    let b = leaf(&mut m, &mut g);
    let imp = g.add_op(SvaOp::OverlappedImplication {
        antecedent: a,
        consequent: b,
    });
    let root = clocked_root(&mut m, &mut g, imp);
    g.node_mut(root)
        .attributes
        .insert("src".to_string(), "prop.sv:12".to_string());
    g.node_mut(root).name = Some("req_gets_ack".to_string());

    let cell = import_sva_assert(&mut m, &g, root, &ImportOptions::default())
        .unwrap()
        .unwrap();
    let cell = m.cell(cell);
    assert_eq!(cell.name.as_deref(), Some("req_gets_ack"));
    assert_eq!(cell.attributes.get("src").map(String::as_str), Some("prop.sv:12"));
}

#[test]
fn monitor_names_are_uniquified() {
    let mut m = Module::new("dut");
    let mut g = PropertyGraph::new();

    for _ in 0..2 {
        let a = leaf(&mut m, &mut g);
        let b = leaf(&mut m, &mut g);
        let imp = g.add_op(SvaOp::OverlappedImplication {
            antecedent: a,
            consequent: b,
        });
        let root = clocked_root(&mut m, &mut g, imp);
        g.node_mut(root).name = Some("dup".to_string());
        import_sva_assert(&mut m, &g, root, &ImportOptions::default())
            .unwrap()
            .unwrap();
    }

    let names: Vec<_> = m
        .cells
        .iter()
        .filter_map(|c| c.name.as_deref())
        .collect();
    assert_eq!(names, vec!["dup", "dup_1"]);
}

#[test]
fn unmapped_net_is_reported() {
    let mut m = Module::new("dut");
    let mut g = PropertyGraph::new();
    let unmapped = g.add_net();
    let root_net = g.add_op(SvaOp::ImmediateAssert { expr: unmapped });
    let root = g.driver_of(root_net).unwrap();

    let err = import_sva_assert(&mut m, &g, root, &ImportOptions::default()).unwrap_err();
    assert!(matches!(err, SvaError::UnmappedNet { .. }));
}
