//! Script values
//!
//! The value model scripts see on their operand stack, locals and globals.

pub mod runtime_value;
pub use runtime_value::*;

#[cfg(test)]
mod tests;
