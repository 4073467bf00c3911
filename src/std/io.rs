//! Io module: script output
//!
//! Script output goes through `tracing` under the `script` target, so hosts
//! route it with the same subscriber they use for their own logs.

use tracing::info;

use crate::runtime::value::Value;
use crate::std::{expect_args, CallContext, Capability, NativeExport, Role, SysOutcome};
use crate::vm::VMResult;

static EXPORTS: [NativeExport; 1] = [NativeExport::new("print", "(value: Any) -> Unit", native_print)];

/// Io module implementation.
#[derive(Debug, Default)]
pub struct IoModule;

impl Capability for IoModule {
    fn role(&self) -> Role {
        Role::Io
    }

    fn exports(&self) -> &'static [NativeExport] {
        &EXPORTS
    }
}

fn native_print(
    args: &[Value],
    cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("print", args, 1)?;
    match &args[0] {
        Value::Str(s) => info!(target: "script", "{}: {}", cx.script_name, s),
        other => info!(target: "script", "{}: {}", cx.script_name, other),
    }
    Ok(Value::Unit.into())
}
