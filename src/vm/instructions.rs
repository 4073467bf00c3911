//! VM instructions

use std::fmt;
use std::sync::Arc;

use crate::runtime::value::Value;
use crate::std::Role;

/// One VM instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Nop,
    /// Push a constant
    Push(Value),
    Pop,
    Dup,
    Swap,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// Pop two values, push 1 if equal else 0
    Eq,
    /// Pop b then a, push 1 if a < b else 0 (integers only)
    Lt,
    /// Pop a value, push the negation of its truthiness
    Not,
    LoadLocal(u16),
    StoreLocal(u16),
    LoadGlobal(u16),
    StoreGlobal(u16),
    Jump(usize),
    /// Pop a value, jump if it is false
    JumpIfFalse(usize),
    /// Call the function at `target`; the top `argc` values become its first locals
    Call { target: usize, argc: u8 },
    /// Return to the caller; the return value is whatever the callee left on the stack
    Return,
    /// Call a function provided by an attached capability module
    Sys {
        role: Role,
        name: Arc<str>,
        argc: u8,
    },
    /// Raise a trap with the given message
    Trap(Arc<str>),
    /// Finish the script
    Exit,
}

impl Instr {
    /// Build a capability call instruction.
    pub fn sys(
        role: Role,
        name: &str,
        argc: u8,
    ) -> Self {
        Instr::Sys {
            role,
            name: Arc::from(name),
            argc,
        }
    }

    /// Jump target of a branching instruction, if it has one.
    pub fn target(&self) -> Option<usize> {
        match self {
            Instr::Jump(t) | Instr::JumpIfFalse(t) => Some(*t),
            Instr::Call { target, .. } => Some(*target),
            _ => None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Instr::Push(v) => write!(f, "push {}", v),
            Instr::LoadLocal(n) => write!(f, "load_local {}", n),
            Instr::StoreLocal(n) => write!(f, "store_local {}", n),
            Instr::LoadGlobal(n) => write!(f, "load_global {}", n),
            Instr::StoreGlobal(n) => write!(f, "store_global {}", n),
            Instr::Jump(t) => write!(f, "jump {}", t),
            Instr::JumpIfFalse(t) => write!(f, "jump_if_false {}", t),
            Instr::Call { target, argc } => write!(f, "call {} {}", target, argc),
            Instr::Sys { role, name, argc } => write!(f, "sys {}.{} {}", role, name, argc),
            Instr::Trap(msg) => write!(f, "trap \"{}\"", msg),
            other => {
                let name = format!("{:?}", other);
                f.write_str(&name.to_lowercase())
            }
        }
    }
}
