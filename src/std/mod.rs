//! Capability modules
//!
//! A task reaches the host only through capability modules attached to it at
//! creation time. Each module owns one [`Role`] and exports a table of native
//! functions that scripts reach with `sys <role>.<name> <argc>`.
//!
//! The scheduler and the task core never look inside a module: they attach
//! it, dispatch calls to it by role, and drop it when the task is destroyed.

pub mod basic;
pub mod io;
pub mod math;
pub mod os;

use std::fmt;
use std::str::FromStr;

use hashbrown::HashMap;
use indexmap::IndexMap;
use tracing::trace;

use crate::runtime::clock::ClockValue;
use crate::runtime::scheduler::{EventQueue, Pid};
use crate::runtime::value::{Value, ValueType};
use crate::vm::{Trap, VMResult};

/// The closed set of capability roles a deployment knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// String and conversion helpers
    Basic,
    /// Script output
    Io,
    /// Integer math
    Math,
    /// Process control: sleeping, events, pid. The completion module
    /// a task needs before the scheduler can suspend and resume it.
    Os,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Basic, Role::Io, Role::Math, Role::Os];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Basic => "basic",
            Role::Io => "io",
            Role::Math => "math",
            Role::Os => "os",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown module role `{}`", s))
    }
}

/// Why a script wants to stop running for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockRequest {
    /// Sleep for the given number of clock ticks
    Sleep(u64),
    /// Wait for an event, optionally giving up after the given number of ticks
    WaitEvent { timeout: Option<u64> },
}

/// Result of a native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysOutcome {
    /// The call completed; push this value
    Value(Value),
    /// The call must suspend the task; its value is produced on wake-up
    Block(BlockRequest),
}

impl From<Value> for SysOutcome {
    fn from(v: Value) -> Self {
        SysOutcome::Value(v)
    }
}

/// What a native function may see of the task calling it.
#[derive(Debug)]
pub struct CallContext<'a> {
    pub pid: Pid,
    pub script_name: &'a str,
    pub now: ClockValue,
    pub running_to_completion: bool,
    pub events: &'a mut EventQueue,
    /// Fixed when the task is built
    pub critical: bool,
}

/// Native function signature.
pub type NativeFn = fn(&[Value], &mut CallContext<'_>) -> VMResult<SysOutcome>;

/// A function exported from a capability module.
#[derive(Debug, Clone, Copy)]
pub struct NativeExport {
    /// Short name (e.g., "sleep")
    pub name: &'static str,
    /// Signature, for listings (e.g., "(ticks: Int) -> Int")
    pub signature: &'static str,
    pub func: NativeFn,
}

impl NativeExport {
    pub const fn new(
        name: &'static str,
        signature: &'static str,
        func: NativeFn,
    ) -> Self {
        Self {
            name,
            signature,
            func,
        }
    }
}

/// An attachable module.
pub trait Capability: fmt::Debug {
    fn role(&self) -> Role;

    fn exports(&self) -> &'static [NativeExport];

    /// Dispatch a call by function name.
    fn call(
        &mut self,
        name: &str,
        args: &[Value],
        cx: &mut CallContext<'_>,
    ) -> VMResult<SysOutcome> {
        let export = self
            .exports()
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Trap::UnknownFunction {
                role: self.role(),
                name: name.to_string(),
            })?;
        (export.func)(args, cx)
    }
}

/// Modules attached to one task, in attachment order.
#[derive(Debug, Default)]
pub struct CapabilitySet {
    modules: IndexMap<Role, Box<dyn Capability>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a module. Returns false, dropping `module`, if its role is
    /// already taken.
    pub fn attach(
        &mut self,
        module: Box<dyn Capability>,
    ) -> bool {
        let role = module.role();
        if self.modules.contains_key(&role) {
            return false;
        }
        self.modules.insert(role, module);
        true
    }

    #[inline]
    pub fn contains(
        &self,
        role: Role,
    ) -> bool {
        self.modules.contains_key(&role)
    }

    pub fn get_mut(
        &mut self,
        role: Role,
    ) -> Option<&mut (dyn Capability + 'static)> {
        self.modules.get_mut(&role).map(|m| m.as_mut())
    }

    /// Attached roles, in attachment order.
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.modules.keys().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Drop for CapabilitySet {
    fn drop(&mut self) {
        for (role, _module) in self.modules.drain(..) {
            trace!(module = %role, "capability released");
        }
    }
}

/// Factory producing a fresh module instance.
pub type CapabilityFactory = fn() -> Box<dyn Capability>;

/// Role-keyed module factories.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    factories: HashMap<Role, CapabilityFactory>,
}

impl CapabilityRegistry {
    /// Registry with no factories.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for a role.
    pub fn register(
        &mut self,
        role: Role,
        factory: CapabilityFactory,
    ) {
        self.factories.insert(role, factory);
    }

    /// Build a module for `role` and attach it to `set`.
    ///
    /// Returns false if no factory is registered or the role is already attached.
    pub fn attach(
        &self,
        set: &mut CapabilitySet,
        role: Role,
    ) -> bool {
        match self.factories.get(&role) {
            Some(factory) => set.attach(factory()),
            None => false,
        }
    }

    /// Attach every role in order; returns the roles that could not be attached.
    pub fn attach_all(
        &self,
        set: &mut CapabilitySet,
        roles: &[Role],
    ) -> Vec<Role> {
        roles
            .iter()
            .copied()
            .filter(|role| !self.attach(set, *role))
            .collect()
    }

    /// Roles every task gets.
    pub fn common_roles() -> &'static [Role] {
        &[Role::Basic, Role::Io, Role::Math]
    }

    /// Common roles plus the os module, for tasks run by the scheduler.
    pub fn full_roles() -> &'static [Role] {
        &[Role::Basic, Role::Io, Role::Math, Role::Os]
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Role::Basic, || Box::new(basic::BasicModule));
        registry.register(Role::Io, || Box::new(io::IoModule));
        registry.register(Role::Math, || Box::new(math::MathModule));
        registry.register(Role::Os, || Box::new(os::OsModule));
        registry
    }
}

// ============================================================================
// Argument helpers shared by the built-in modules
// ============================================================================

pub(crate) fn expect_args(
    function: &str,
    args: &[Value],
    count: usize,
) -> VMResult<()> {
    if args.len() != count {
        return Err(Trap::InvalidArgument {
            function: function.to_string(),
            reason: format!("expected {} arguments, got {}", count, args.len()),
        });
    }
    Ok(())
}

pub(crate) fn arg_int(
    function: &str,
    args: &[Value],
    index: usize,
) -> VMResult<i64> {
    match args.get(index) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(Trap::TypeMismatch {
            expected: ValueType::Int,
            found: other.value_type(),
        }),
        None => Err(Trap::InvalidArgument {
            function: function.to_string(),
            reason: format!("missing argument {}", index),
        }),
    }
}

pub(crate) fn arg_str<'v>(
    function: &str,
    args: &'v [Value],
    index: usize,
) -> VMResult<&'v str> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s),
        Some(other) => Err(Trap::TypeMismatch {
            expected: ValueType::Str,
            found: other.value_type(),
        }),
        None => Err(Trap::InvalidArgument {
            function: function.to_string(),
            reason: format!("missing argument {}", index),
        }),
    }
}

#[cfg(test)]
mod tests;
