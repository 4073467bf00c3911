//! Capability module tests

use super::*;
use crate::runtime::clock::TICKS_PER_SEC;

struct Harness {
    events: EventQueue,
    critical: bool,
}

impl Harness {
    fn new() -> Self {
        Self {
            events: EventQueue::new(4, false),
            critical: false,
        }
    }

    fn call(
        &mut self,
        module: &mut dyn Capability,
        name: &str,
        args: &[Value],
    ) -> VMResult<SysOutcome> {
        let mut cx = CallContext {
            pid: Pid(7),
            script_name: "test",
            now: ClockValue(100),
            running_to_completion: false,
            events: &mut self.events,
            critical: self.critical,
        };
        module.call(name, args, &mut cx)
    }

    fn value(
        &mut self,
        module: &mut dyn Capability,
        name: &str,
        args: &[Value],
    ) -> Value {
        match self.call(module, name, args) {
            Ok(SysOutcome::Value(v)) => v,
            other => panic!("{} did not return a value: {:?}", name, other),
        }
    }
}

#[cfg(test)]
mod role_tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("disk".parse::<Role>().is_err());
        assert_eq!(Role::Os.to_string(), "os");
    }
}

#[cfg(test)]
mod capability_set_tests {
    use super::*;

    #[test]
    fn test_attach_keeps_order_and_rejects_duplicates() {
        let mut set = CapabilitySet::new();
        assert!(set.attach(Box::new(math::MathModule)));
        assert!(set.attach(Box::new(io::IoModule)));
        assert!(!set.attach(Box::new(math::MathModule)));
        assert_eq!(set.roles().collect::<Vec<_>>(), vec![Role::Math, Role::Io]);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Role::Io));
        assert!(!set.contains(Role::Os));
    }

    #[test]
    fn test_registry_attach_all_reports_missing() {
        let mut registry = CapabilityRegistry::empty();
        registry.register(Role::Basic, || Box::new(basic::BasicModule));
        let mut set = CapabilitySet::new();
        let missing = registry.attach_all(&mut set, CapabilityRegistry::full_roles());
        assert_eq!(missing, vec![Role::Io, Role::Math, Role::Os]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_default_registry_has_every_role() {
        let registry = CapabilityRegistry::default();
        let mut set = CapabilitySet::new();
        assert!(registry.attach_all(&mut set, &Role::ALL).is_empty());
        assert_eq!(set.len(), Role::ALL.len());
        assert!(!CapabilityRegistry::common_roles().contains(&Role::Os));
    }

    #[test]
    fn test_unknown_function_traps() {
        let mut h = Harness::new();
        let err = h.call(&mut math::MathModule, "sqrt", &[]).unwrap_err();
        assert_eq!(
            err,
            Trap::UnknownFunction {
                role: Role::Math,
                name: "sqrt".to_string()
            }
        );
    }
}

#[cfg(test)]
mod basic_tests {
    use super::*;

    #[test]
    fn test_string_helpers() {
        let mut h = Harness::new();
        let m = &mut basic::BasicModule;
        assert_eq!(h.value(m, "len", &[Value::str("four")]), Value::Int(4));
        assert_eq!(h.value(m, "upper", &[Value::str("ab")]), Value::str("AB"));
        assert_eq!(h.value(m, "lower", &[Value::str("AB")]), Value::str("ab"));
    }

    #[test]
    fn test_conversions() {
        let mut h = Harness::new();
        let m = &mut basic::BasicModule;
        assert_eq!(h.value(m, "cstr", &[Value::Int(12)]), Value::str("12"));
        assert_eq!(h.value(m, "cstr", &[Value::str("x")]), Value::str("x"));
        assert_eq!(h.value(m, "cint", &[Value::str(" 42 ")]), Value::Int(42));
        assert_eq!(h.value(m, "cint", &[Value::str("nope")]), Value::Int(0));
        assert_eq!(h.value(m, "cint", &[Value::Unit]), Value::Int(0));
    }

    #[test]
    fn test_type_mismatch() {
        let mut h = Harness::new();
        let err = h.call(&mut basic::BasicModule, "len", &[Value::Int(1)]).unwrap_err();
        assert!(matches!(err, Trap::TypeMismatch { .. }));
    }
}

#[cfg(test)]
mod math_tests {
    use super::*;

    #[test]
    fn test_math_functions() {
        let mut h = Harness::new();
        let m = &mut math::MathModule;
        assert_eq!(h.value(m, "abs", &[Value::Int(-3)]), Value::Int(3));
        assert_eq!(h.value(m, "min", &[Value::Int(2), Value::Int(5)]), Value::Int(2));
        assert_eq!(h.value(m, "max", &[Value::Int(2), Value::Int(5)]), Value::Int(5));
        assert_eq!(h.value(m, "pow", &[Value::Int(2), Value::Int(10)]), Value::Int(1024));
        assert_eq!(
            h.value(m, "clamp", &[Value::Int(9), Value::Int(0), Value::Int(5)]),
            Value::Int(5)
        );
    }

    #[test]
    fn test_invalid_arguments() {
        let mut h = Harness::new();
        let m = &mut math::MathModule;
        assert!(matches!(
            h.call(m, "pow", &[Value::Int(2), Value::Int(-1)]),
            Err(Trap::InvalidArgument { .. })
        ));
        assert!(matches!(
            h.call(m, "clamp", &[Value::Int(1), Value::Int(5), Value::Int(0)]),
            Err(Trap::InvalidArgument { .. })
        ));
        assert!(matches!(
            h.call(m, "abs", &[]),
            Err(Trap::InvalidArgument { .. })
        ));
    }
}

#[cfg(test)]
mod io_tests {
    use super::*;

    #[test]
    fn test_print_returns_unit() {
        let mut h = Harness::new();
        assert_eq!(h.value(&mut io::IoModule, "print", &[Value::str("hi")]), Value::Unit);
    }
}

#[cfg(test)]
mod os_tests {
    use super::*;

    #[test]
    fn test_sleep_requests_block() {
        let mut h = Harness::new();
        let m = &mut os::OsModule;
        assert_eq!(
            h.call(m, "sleep", &[Value::Int(2)]),
            Ok(SysOutcome::Block(BlockRequest::Sleep(2 * TICKS_PER_SEC)))
        );
        assert_eq!(
            h.call(m, "sleepms", &[Value::Int(250)]),
            Ok(SysOutcome::Block(BlockRequest::Sleep(250 * TICKS_PER_SEC / 1000)))
        );
        assert_eq!(
            h.call(m, "sleep", &[Value::Int(-5)]),
            Ok(SysOutcome::Block(BlockRequest::Sleep(0)))
        );
    }

    #[test]
    fn test_sleep_signatures_name_their_units() {
        let signature = |name: &str| {
            os::OsModule
                .exports()
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.signature)
        };
        assert_eq!(signature("sleep"), Some("(seconds: Int) -> Int"));
        assert_eq!(signature("sleepms"), Some("(millis: Int) -> Int"));
        assert_eq!(signature("wait_for_event"), Some("(seconds: Int) -> Any"));
        assert_eq!(signature("set_critical"), None);
    }

    #[test]
    fn test_wait_for_event_timeouts() {
        let mut h = Harness::new();
        let m = &mut os::OsModule;
        assert_eq!(h.value(m, "wait_for_event", &[Value::Int(0)]), Value::Int(0));
        assert_eq!(
            h.call(m, "wait_for_event", &[Value::Int(-1)]),
            Ok(SysOutcome::Block(BlockRequest::WaitEvent { timeout: None }))
        );
        assert_eq!(
            h.call(m, "wait_for_event", &[Value::Int(3)]),
            Ok(SysOutcome::Block(BlockRequest::WaitEvent {
                timeout: Some(3 * TICKS_PER_SEC)
            }))
        );
    }

    #[test]
    fn test_wait_for_event_takes_queued_event() {
        let mut h = Harness::new();
        h.events.push(Value::str("ping")).unwrap();
        h.events.push(Value::Int(2)).unwrap();
        let m = &mut os::OsModule;
        assert_eq!(h.value(m, "events_waiting", &[]), Value::Int(2));
        assert_eq!(h.value(m, "wait_for_event", &[Value::Int(-1)]), Value::str("ping"));
        assert_eq!(h.value(m, "wait_for_event", &[Value::Int(5)]), Value::Int(2));
        assert_eq!(h.value(m, "events_waiting", &[]), Value::Int(0));
    }

    #[test]
    fn test_pid_and_critical_flag() {
        let mut h = Harness::new();
        let m = &mut os::OsModule;
        assert_eq!(h.value(m, "getpid", &[]), Value::Int(7));
        assert_eq!(h.value(m, "is_critical", &[]), Value::Int(0));
        h.critical = true;
        assert_eq!(h.value(m, "is_critical", &[]), Value::Int(1));
        assert!(h.call(m, "set_critical", &[Value::Int(0)]).is_err());
    }
}
