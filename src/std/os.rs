//! Os module: sleeping, events and process identity
//!
//! This is the module that lets a scheduled task suspend itself. The module
//! only *requests* a block; the owning task and scheduler perform it.

use crate::runtime::clock::TICKS_PER_SEC;
use crate::runtime::value::Value;
use crate::std::{arg_int, expect_args, BlockRequest, CallContext, Capability, NativeExport, Role, SysOutcome};
use crate::vm::VMResult;

static EXPORTS: [NativeExport; 6] = [
    NativeExport::new("sleep", "(seconds: Int) -> Int", native_sleep),
    NativeExport::new("sleepms", "(millis: Int) -> Int", native_sleepms),
    NativeExport::new("wait_for_event", "(seconds: Int) -> Any", native_wait_for_event),
    NativeExport::new("events_waiting", "() -> Int", native_events_waiting),
    NativeExport::new("getpid", "() -> Int", native_getpid),
    NativeExport::new("is_critical", "() -> Int", native_is_critical),
];

/// Os module implementation.
#[derive(Debug, Default)]
pub struct OsModule;

impl Capability for OsModule {
    fn role(&self) -> Role {
        Role::Os
    }

    fn exports(&self) -> &'static [NativeExport] {
        &EXPORTS
    }
}

fn native_sleep(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("sleep", args, 1)?;
    let secs = arg_int("sleep", args, 0)?.max(0) as u64;
    Ok(SysOutcome::Block(BlockRequest::Sleep(
        secs.saturating_mul(TICKS_PER_SEC),
    )))
}

fn native_sleepms(
    args: &[Value],
    _cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("sleepms", args, 1)?;
    let millis = arg_int("sleepms", args, 0)?.max(0) as u64;
    Ok(SysOutcome::Block(BlockRequest::Sleep(
        millis.saturating_mul(TICKS_PER_SEC) / 1000,
    )))
}

/// `wait_for_event(0)` polls, a negative timeout waits forever.
fn native_wait_for_event(
    args: &[Value],
    cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("wait_for_event", args, 1)?;
    let secs = arg_int("wait_for_event", args, 0)?;
    if let Some(event) = cx.events.pop() {
        return Ok(event.into());
    }
    let timeout = match secs {
        0 => return Ok(Value::Int(0).into()),
        s if s < 0 => None,
        s => Some((s as u64).saturating_mul(TICKS_PER_SEC)),
    };
    Ok(SysOutcome::Block(BlockRequest::WaitEvent { timeout }))
}

fn native_events_waiting(
    args: &[Value],
    cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("events_waiting", args, 0)?;
    Ok(Value::Int(cx.events.len() as i64).into())
}

fn native_getpid(
    args: &[Value],
    cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("getpid", args, 0)?;
    Ok(Value::Int(cx.pid.inner() as i64).into())
}

fn native_is_critical(
    args: &[Value],
    cx: &mut CallContext<'_>,
) -> VMResult<SysOutcome> {
    expect_args("is_critical", args, 0)?;
    Ok(Value::from(cx.critical).into())
}
