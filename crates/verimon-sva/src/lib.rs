//! Verimon SVA - SystemVerilog Assertion compiler core
//!
//! Translates an SVA property, given as a graph of primitive operator
//! nodes, into a clocked monitor circuit in a [`verimon_netlist::Module`].
//! The pipeline is:
//!
//! ```text
//! PropertyGraph → sequence lowerer → NFSM (SvaFsm)
//!                                      ↓ get_accept: one flop per state
//!                                      ↓ get_reject: links resolved (UFSM),
//!                                        subset construction (DFSM),
//!                                        eq-decoded one-hot circuit
//! property driver → antecedent/until/consequent FSMs → assert/assume/cover
//! ```
//!
//! Key types:
//! - [`PropertyGraph`] - the operator graph handed over by the frontend
//! - [`SvaFsm`] - the per-property automaton container
//! - [`import_sva_assert`]/[`import_sva_assume`]/[`import_sva_cover`] -
//!   the per-property entry points
//!
//! Supported property styles: `not seq`, `seq |=> seq`, `seq |=> not seq`,
//! `seq |=> seq until seq`, plus bare sequences in cover mode. Supported
//! sequence operators: `##[N:M]`, `[*N:M]`, `throughout`.

pub mod fsm;
pub mod graph;
pub mod import;
pub mod sequence;

use graph::SourceLoc;
use thiserror::Error;

/// Hard cap on the control alphabet of a single DFSM state. Each state
/// enumerates all `2^n` control valuations, so this bounds design size.
pub const MAX_CTRL_BITS: usize = 10;

#[derive(Error, Debug)]
pub enum SvaError {
    #[error("{loc}: SVA operator `{op}` is currently unsupported in this context")]
    UnsupportedOperator { op: &'static str, loc: SourceLoc },
    #[error("{loc}: invalid repeat range: {reason}")]
    InvalidRange { reason: String, loc: SourceLoc },
    #[error(
        "property DFSM state ctrl signal has {width} bits, over the limit of {limit}; \
         stopping to prevent exponential design size explosion"
    )]
    CtrlTooWide { width: usize, limit: usize },
    #[error("{loc}: no support for s_eventually in clocked properties yet")]
    EventuallyUnsupported { loc: SourceLoc },
    #[error("{loc}: clocked property has no posedge clock specification")]
    MissingClock { loc: SourceLoc },
    #[error("property net {net} has no host signal mapping")]
    UnmappedNet { net: u32 },
}

pub type SvaResult<T> = Result<T, SvaError>;

/// What to do when the lowerer meets an operator it does not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsupportedPolicy {
    /// Fail the property with [`SvaError::UnsupportedOperator`].
    #[default]
    Fatal,
    /// Warn and lower the operator to a no-op (the sequence continues at
    /// the node where the operator started).
    WarnSkip,
}

/// Per-property configuration.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub unsupported: UnsupportedPolicy,
    /// Dump the NFSM/UFSM/DFSM tables of every materialized FSM via
    /// `log::debug!`.
    pub verbose: bool,
}

pub use fsm::SvaFsm;
pub use graph::{PropNetId, PropNode, PropNodeId, PropertyGraph, SvaOp};
pub use import::{import_sva_assert, import_sva_assume, import_sva_cover};
