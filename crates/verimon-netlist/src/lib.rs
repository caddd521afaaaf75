//! Verimon netlist - single-bit circuit IR for monitor synthesis
//!
//! This crate provides the host-side circuit representation that the SVA
//! compiler emits into. The flow is:
//!
//! ```text
//! PropertyGraph → SvaFsm pipeline (verimon-sva) → Module (this crate)
//!                                                    ↓
//!                                             sim::Sim (cycle-accurate
//!                                             interpretation for tests)
//! ```
//!
//! Key types:
//! - [`Module`] - container of wires, cells and connections
//! - [`SigBit`] - a single-bit signal (constant or wire)
//! - [`SigSpec`] - an ordered vector of signal bits
//! - [`CellKind`] - gate, flip-flop and monitor cell variants
//!
//! The IR is deliberately narrow: everything is one bit wide, and the only
//! cells are the ones monitor synthesis needs (inverter, 2-input and/or,
//! reduction-or, vector equality, DFF, and the five monitor kinds).

pub mod netlist;
pub mod sim;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetlistError {
    #[error("net values did not settle after {0} iterations (combinational loop?)")]
    CombLoop(usize),
    #[error("wire {0} is driven inside the module and cannot be set from outside")]
    DrivenWire(u32),
}

pub type NetlistResult<T> = Result<T, NetlistError>;

pub use netlist::{Cell, CellId, CellKind, Module, MonitorKind, SigBit, SigSpec, Wire, WireId};
pub use sim::Sim;
