//! VM errors

use thiserror::Error;

use crate::runtime::value::ValueType;
use crate::std::Role;

/// VM result
pub type VMResult<T> = Result<T, Trap>;

/// An interpreter-level fault raised while executing one instruction.
///
/// A trap is always task-local: it ends the task that raised it and nothing
/// else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Trap {
    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Type error: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid local variable {0}")]
    InvalidLocal(u16),

    #[error("Invalid global variable {0}")]
    InvalidGlobal(u16),

    #[error("Invalid jump target {0}")]
    InvalidJump(usize),

    #[error("Call stack overflow (depth {0})")]
    CallStackOverflow(usize),

    #[error("Module {0} is not attached")]
    MissingModule(Role),

    #[error("Unknown function {role}::{name}")]
    UnknownFunction { role: Role, name: String },

    #[error("Invalid argument to {function}: {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("Script cannot block without the os module")]
    CannotBlock,

    #[error("{0}")]
    Raised(String),
}
