//! Runtime system
//!
//! Script values, programs, the clock, and the cooperative scheduler.

pub mod clock;
pub mod env;
pub mod program;
pub mod scheduler;
pub mod value;

pub use env::{ScriptEnv, StartError};
