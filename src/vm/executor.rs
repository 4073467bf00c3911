//! Virtual Machine executor
//!
//! Executes exactly one instruction per call against an [`ExecContext`].
//! Everything the interpreter cannot do by itself (I/O, sleeping, event
//! waits) goes through [`SysHost`], which the owning task implements on top
//! of its attached capability modules.

use smallvec::SmallVec;

use crate::runtime::value::{Value, ValueType};
use crate::std::{BlockRequest, Role, SysOutcome};
use crate::vm::errors::{Trap, VMResult};
use crate::vm::frames::ControlFrame;
use crate::vm::instructions::Instr;

/// VM 配置
#[derive(Debug, Clone)]
pub struct VMConfig {
    /// 最大调用深度
    pub max_call_depth: usize,
}

impl Default for VMConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
        }
    }
}

/// How execution continues after one instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// More instructions to run
    Continue,
    /// The script finished normally
    Exit,
    /// The script asked to be suspended; pc already points past the call
    Block(BlockRequest),
}

/// Dispatch target for `Sys` instructions.
pub trait SysHost {
    fn sys(
        &mut self,
        role: Role,
        name: &str,
        args: &[Value],
    ) -> VMResult<SysOutcome>;
}

/// Per-task interpreter state.
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    /// Program counter
    pub pc: usize,
    /// Operand stack
    pub value_stack: Vec<Value>,
    /// Locals of the current frame
    pub locals: Vec<Value>,
    /// Saved locals of every caller frame, innermost last
    pub upper_locals: Vec<Vec<Value>>,
    /// Control-flow stack for call/return
    pub control_stack: Vec<ControlFrame>,
    /// Script globals
    pub globals: Vec<Value>,
}

impl ExecContext {
    /// Create a fresh context positioned at the first instruction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a value onto the operand stack.
    #[inline]
    pub fn push(
        &mut self,
        value: Value,
    ) {
        self.value_stack.push(value);
    }

    /// Pop a value from the operand stack.
    #[inline]
    pub fn pop(&mut self) -> VMResult<Value> {
        self.value_stack.pop().ok_or(Trap::StackUnderflow)
    }

    fn pop_int(&mut self) -> VMResult<i64> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(Trap::TypeMismatch {
                expected: ValueType::Int,
                found: other.value_type(),
            }),
        }
    }

    /// Pop `count` values, first-pushed first.
    fn pop_n(
        &mut self,
        count: usize,
    ) -> VMResult<SmallVec<[Value; 4]>> {
        let len = self.value_stack.len();
        if count > len {
            return Err(Trap::StackUnderflow);
        }
        Ok(self.value_stack.drain(len - count..).collect())
    }
}

/// Execute the instruction at `ctx.pc`.
///
/// On a trap the program counter is left on the faulting instruction.
pub fn exec_instr(
    ctx: &mut ExecContext,
    code: &[Instr],
    host: &mut dyn SysHost,
    config: &VMConfig,
) -> VMResult<Flow> {
    let Some(instr) = code.get(ctx.pc) else {
        return Ok(Flow::Exit);
    };
    let mut next = ctx.pc + 1;

    match instr {
        Instr::Nop => {}
        Instr::Push(v) => ctx.push(v.clone()),
        Instr::Pop => {
            ctx.pop()?;
        }
        Instr::Dup => {
            let top = ctx.value_stack.last().cloned().ok_or(Trap::StackUnderflow)?;
            ctx.push(top);
        }
        Instr::Swap => {
            let b = ctx.pop()?;
            let a = ctx.pop()?;
            ctx.push(b);
            ctx.push(a);
        }
        Instr::Add => {
            let b = ctx.pop()?;
            let a = ctx.pop()?;
            let sum = match (&a, &b) {
                (Value::Int(x), Value::Int(y)) => Value::Int(x.wrapping_add(*y)),
                (Value::Str(x), _) => Value::from(format!("{}{}", x, plain(&b))),
                (_, Value::Str(y)) => Value::from(format!("{}{}", plain(&a), y)),
                (Value::Int(_), other) | (other, _) => {
                    return Err(Trap::TypeMismatch {
                        expected: ValueType::Int,
                        found: other.value_type(),
                    })
                }
            };
            ctx.push(sum);
        }
        Instr::Sub | Instr::Mul | Instr::Div | Instr::Mod => {
            let b = ctx.pop_int()?;
            let a = ctx.pop_int()?;
            let result = match instr {
                Instr::Sub => a.wrapping_sub(b),
                Instr::Mul => a.wrapping_mul(b),
                Instr::Div if b == 0 => return Err(Trap::DivisionByZero),
                Instr::Div => a.wrapping_div(b),
                _ if b == 0 => return Err(Trap::DivisionByZero),
                _ => a.wrapping_rem(b),
            };
            ctx.push(Value::Int(result));
        }
        Instr::Eq => {
            let b = ctx.pop()?;
            let a = ctx.pop()?;
            ctx.push(Value::from(a == b));
        }
        Instr::Lt => {
            let b = ctx.pop_int()?;
            let a = ctx.pop_int()?;
            ctx.push(Value::from(a < b));
        }
        Instr::Not => {
            let v = ctx.pop()?;
            ctx.push(Value::from(!v.is_true()));
        }
        Instr::LoadLocal(n) => {
            let v = ctx
                .locals
                .get(*n as usize)
                .cloned()
                .ok_or(Trap::InvalidLocal(*n))?;
            ctx.push(v);
        }
        Instr::StoreLocal(n) => {
            let v = ctx.pop()?;
            store_slot(&mut ctx.locals, *n as usize, v);
        }
        Instr::LoadGlobal(n) => {
            let v = ctx
                .globals
                .get(*n as usize)
                .cloned()
                .ok_or(Trap::InvalidGlobal(*n))?;
            ctx.push(v);
        }
        Instr::StoreGlobal(n) => {
            let v = ctx.pop()?;
            store_slot(&mut ctx.globals, *n as usize, v);
        }
        Instr::Jump(target) => {
            next = check_target(*target, code.len())?;
        }
        Instr::JumpIfFalse(target) => {
            let cond = ctx.pop()?;
            if !cond.is_true() {
                next = check_target(*target, code.len())?;
            }
        }
        Instr::Call { target, argc } => {
            let target = check_target(*target, code.len())?;
            if ctx.control_stack.len() >= config.max_call_depth {
                return Err(Trap::CallStackOverflow(ctx.control_stack.len()));
            }
            let args = ctx.pop_n(*argc as usize)?;
            let caller_locals = std::mem::replace(&mut ctx.locals, args.into_vec());
            ctx.upper_locals.push(caller_locals);
            ctx.control_stack
                .push(ControlFrame::new(next, ctx.value_stack.len()));
            next = target;
        }
        Instr::Return => {
            let Some(frame) = ctx.control_stack.pop() else {
                return Ok(Flow::Exit);
            };
            let ret = if ctx.value_stack.len() > frame.stack_base {
                ctx.value_stack.pop().unwrap_or_default()
            } else {
                Value::Unit
            };
            ctx.value_stack.truncate(frame.stack_base);
            ctx.push(ret);
            ctx.locals = ctx.upper_locals.pop().unwrap_or_default();
            next = frame.return_pc;
        }
        Instr::Sys { role, name, argc } => {
            let args = ctx.pop_n(*argc as usize)?;
            match host.sys(*role, name, &args)? {
                SysOutcome::Value(v) => ctx.push(v),
                SysOutcome::Block(request) => {
                    ctx.pc = next;
                    return Ok(Flow::Block(request));
                }
            }
        }
        Instr::Trap(msg) => return Err(Trap::Raised(msg.to_string())),
        Instr::Exit => {
            ctx.pc = code.len();
            return Ok(Flow::Exit);
        }
    }

    ctx.pc = next;
    if ctx.pc >= code.len() {
        Ok(Flow::Exit)
    } else {
        Ok(Flow::Continue)
    }
}

fn check_target(
    target: usize,
    len: usize,
) -> VMResult<usize> {
    // Jumping to `len` is a jump to the end of the program.
    if target > len {
        Err(Trap::InvalidJump(target))
    } else {
        Ok(target)
    }
}

fn store_slot(
    slots: &mut Vec<Value>,
    index: usize,
    value: Value,
) {
    if index >= slots.len() {
        slots.resize(index + 1, Value::Unit);
    }
    slots[index] = value;
}

/// Unquoted rendering used for string concatenation.
fn plain(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    }
}
