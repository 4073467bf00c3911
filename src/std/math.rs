//! Math module

use crate::runtime::value::Value;
use crate::std::{arg_int, expect_args, CallContext, Capability, NativeExport, Role, SysOutcome};
use crate::vm::{Trap, VMResult};

static EXPORTS: [NativeExport; 5] = [
    NativeExport::new("abs", "(n: Int) -> Int", native_abs),
    NativeExport::new("min", "(a: Int, b: Int) -> Int", native_min),
    NativeExport::new("max", "(a: Int, b: Int) -> Int", native_max),
    NativeExport::new("pow", "(base: Int, exp: Int) -> Int", native_pow),
    NativeExport::new("clamp", "(v: Int, lo: Int, hi: Int) -> Int", native_clamp),
];

/// Math module implementation.
#[derive(Debug, Default)]
pub struct MathModule;

impl Capability for MathModule {
    fn role(&self) -> Role {
        Role::Math
    }

    fn exports(&self) -> &'static [NativeExport] {
        &EXPORTS
    }
}

fn native_abs(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("abs", args, 1)?;
    Ok(Value::Int(arg_int("abs", args, 0)?.wrapping_abs()).into())
}

fn native_min(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("min", args, 2)?;
    let (a, b) = (arg_int("min", args, 0)?, arg_int("min", args, 1)?);
    Ok(Value::Int(a.min(b)).into())
}

fn native_max(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("max", args, 2)?;
    let (a, b) = (arg_int("max", args, 0)?, arg_int("max", args, 1)?);
    Ok(Value::Int(a.max(b)).into())
}

fn native_pow(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("pow", args, 2)?;
    let base = arg_int("pow", args, 0)?;
    let exp = arg_int("pow", args, 1)?;
    let exp = u32::try_from(exp).map_err(|_| Trap::InvalidArgument {
        function: "pow".to_string(),
        reason: format!("negative or oversized exponent {}", exp),
    })?;
    Ok(Value::Int(base.wrapping_pow(exp)).into())
}

fn native_clamp(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("clamp", args, 3)?;
    let v = arg_int("clamp", args, 0)?;
    let lo = arg_int("clamp", args, 1)?;
    let hi = arg_int("clamp", args, 2)?;
    if lo > hi {
        return Err(Trap::InvalidArgument {
            function: "clamp".to_string(),
            reason: format!("empty range {}..={}", lo, hi),
        });
    }
    Ok(Value::Int(v.clamp(lo, hi)).into())
}
