//! Basic module: string helpers and conversions

use crate::runtime::value::Value;
use crate::std::{arg_str, expect_args, CallContext, Capability, NativeExport, Role, SysOutcome};
use crate::vm::VMResult;

static EXPORTS: [NativeExport; 5] = [
    NativeExport::new("len", "(s: String) -> Int", native_len),
    NativeExport::new("upper", "(s: String) -> String", native_upper),
    NativeExport::new("lower", "(s: String) -> String", native_lower),
    NativeExport::new("cstr", "(v: Any) -> String", native_cstr),
    NativeExport::new("cint", "(v: Any) -> Int", native_cint),
];

/// Basic module implementation.
#[derive(Debug, Default)]
pub struct BasicModule;

impl Capability for BasicModule {
    fn role(&self) -> Role {
        Role::Basic
    }

    fn exports(&self) -> &'static [NativeExport] {
        &EXPORTS
    }
}

fn native_len(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("len", args, 1)?;
    let s = arg_str("len", args, 0)?;
    Ok(Value::Int(s.chars().count() as i64).into())
}

fn native_upper(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("upper", args, 1)?;
    Ok(Value::from(arg_str("upper", args, 0)?.to_uppercase()).into())
}

fn native_lower(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("lower", args, 1)?;
    Ok(Value::from(arg_str("lower", args, 0)?.to_lowercase()).into())
}

fn native_cstr(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("cstr", args, 1)?;
    let s = match &args[0] {
        Value::Str(s) => s.to_string(),
        other => other.to_string(),
    };
    Ok(Value::from(s).into())
}

/// Strings that do not parse convert to 0, like every other non-integer.
fn native_cint(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("cint", args, 1)?;
    let n = match &args[0] {
        Value::Int(n) => *n,
        Value::Str(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    Ok(Value::Int(n).into())
}
