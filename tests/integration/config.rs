//! Configuration file tests

use std::fs;
use std::rc::Rc;

use scriptrt::runtime::scheduler::SignalError;
use scriptrt::{
    ManualClock, ProgramStore, RuntimeConfig, Scheduler, ScriptDescriptor, ScriptEnv, Value,
    TICKS_PER_SEC,
};

use crate::common::Scripts;

const CONFIG: &str = r#"
[scheduler]
instructions_per_tick = 50
max_idle_secs = 5

[events]
max_event_queue = 1
"#;

#[test]
fn test_partial_file_keeps_defaults() {
    let scripts = Scripts::new();
    let path = scripts.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = RuntimeConfig::load(Some(&path)).unwrap();
    let sched = config.scheduler_config();
    assert_eq!(sched.instructions_per_tick, 50);
    assert_eq!(sched.max_idle, 5 * TICKS_PER_SEC);
    assert_eq!(config.events.max_event_queue, 1);
    assert!(!config.events.discard_old_events);
    assert_eq!(config.log.level, "info");
    assert_eq!(config.rtc.report_interval, 1000);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let scripts = Scripts::new();
    assert!(RuntimeConfig::load(Some(&scripts.path().join("absent.toml"))).is_err());
}

#[test]
fn test_mailbox_capacity_from_config() {
    let scripts = Scripts::new();
    scripts.write("sleeper", "push 10\nsys os.sleep 1\n");

    let config = RuntimeConfig::from_toml(CONFIG).unwrap();
    let clock = Rc::new(ManualClock::new());
    let mut env = ScriptEnv::new(ProgramStore::with_root(scripts.path()), config, clock.clone());
    let mut sched = Scheduler::new(env.config.scheduler_config(), clock);

    let pid = sched
        .start_script(&mut env, &ScriptDescriptor::logical("sleeper"), [])
        .unwrap();
    sched.step_scripts();

    sched.signal_event(pid, Value::Int(1)).unwrap();
    assert_eq!(
        sched.signal_event(pid, Value::Int(2)),
        Err(SignalError::QueueFull { pid, capacity: 1 })
    );
    assert_eq!(sched.find(pid).unwrap().events().len(), 1);
}

#[test]
fn test_config_round_trips_through_toml() {
    let config = RuntimeConfig::from_toml(CONFIG).unwrap();
    let text = config.to_toml().unwrap();
    let back = RuntimeConfig::from_toml(&text).unwrap();
    assert_eq!(back.scheduler.instructions_per_tick, 50);
    assert_eq!(back.events.max_event_queue, 1);
}
