//! Virtual Machine and bytecode execution
//!
//! This module contains the single-step interpreter that tasks drive. It
//! knows nothing about scheduling: it executes one instruction against an
//! execution context and reports how control should continue.

pub use errors::{Trap, VMResult};
pub use executor::{exec_instr, ExecContext, Flow, SysHost, VMConfig};
pub use frames::ControlFrame;
pub use instructions::Instr;

mod errors;
mod executor;
mod frames;
mod instructions;

#[cfg(test)]
mod tests;
