//! Host loop tests through `run_files`

use scriptrt::runtime::scheduler::TaskStatus;
use scriptrt::{run_files, HostOptions, RuntimeConfig};

use crate::common::Scripts;

fn manual() -> HostOptions {
    HostOptions {
        manual_clock: true,
        ..HostOptions::default()
    }
}

#[test]
fn test_sleeper_and_quick_script_both_finish() {
    let scripts = Scripts::new();
    let sleeper = scripts.write("sleeper", "push 5\nsys os.sleepms 1\npop\npush 42\n");
    let quick = scripts.write("quick", "push 1\npush 2\nadd\n");

    let summary = run_files(&[sleeper, quick], &manual()).unwrap();

    assert_eq!(summary.tasks.len(), 2);
    assert!(summary
        .tasks
        .iter()
        .all(|t| t.status == TaskStatus::Finished));
    // start, wake, finish
    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.stats.wakeups_ontime, 1);
    assert_eq!(summary.stats.wakeups_late, 0);
    assert_eq!(summary.stats.tasks_scheduled, 2);
}

#[test]
fn test_max_ticks_stops_a_spinning_script() {
    let scripts = Scripts::new();
    let spin = scripts.write("spin", "top:\n  jump top\n");

    let options = HostOptions {
        max_ticks: Some(3),
        ..manual()
    };
    let summary = run_files(&[spin], &options).unwrap();

    assert_eq!(summary.ticks, 3);
    assert_eq!(summary.stats.ticks, 3);
    assert_eq!(summary.stats.instructions, 3000);
    assert_eq!(summary.tasks[0].status, TaskStatus::Runnable);
}

#[test]
fn test_budget_follows_configuration() {
    let scripts = Scripts::new();
    let spin = scripts.write("spin", "top:\n  jump top\n");

    let mut config = RuntimeConfig::default();
    config.scheduler.instructions_per_tick = 10;
    let options = HostOptions {
        config,
        max_ticks: Some(2),
        manual_clock: true,
    };
    let summary = run_files(&[spin], &options).unwrap();
    assert_eq!(summary.stats.instructions, 20);
}

#[test]
fn test_event_waiter_does_not_keep_host_alive() {
    let scripts = Scripts::new();
    let waiter = scripts.write("waiter", "push -1\nsys os.wait_for_event 1\n");

    let summary = run_files(&[waiter], &manual()).unwrap();

    assert_eq!(summary.ticks, 1);
    assert_eq!(summary.tasks[0].status, TaskStatus::WaitingEvent);
    assert_eq!(summary.tasks[0].wake_at, None);
}

#[test]
fn test_trapping_script_is_reported() {
    let scripts = Scripts::new();
    let bad = scripts.write("bad", "push 1\npush 0\ndiv\n");
    let good = scripts.write("good", "push 1\n");

    let summary = run_files(&[bad, good], &manual()).unwrap();

    assert_eq!(summary.stats.traps, 1);
    let bad = &summary.tasks[0];
    assert_eq!(bad.status, TaskStatus::Errored);
    assert_eq!(bad.fault.as_ref().map(|f| f.pc), Some(2));
    assert_eq!(summary.tasks[1].status, TaskStatus::Finished);
}

#[test]
fn test_missing_script_fails_to_start() {
    let scripts = Scripts::new();
    let missing = scripts.path().join("nowhere.scr");

    let err = run_files(&[missing], &manual()).unwrap_err();
    assert!(err.to_string().contains("Failed to start script"));
}

#[test]
fn test_syntax_error_fails_to_start() {
    let scripts = Scripts::new();
    let broken = scripts.write("broken", "frobnicate 1 2 3\n");

    assert!(run_files(&[broken], &manual()).is_err());
}

#[test]
fn test_long_sleep_is_capped_by_max_idle() {
    let scripts = Scripts::new();
    // two minutes, longer than the default one minute idle cap
    let nap = scripts.write("nap", "push 120\nsys os.sleep 1\n");

    let summary = run_files(&[nap], &manual()).unwrap();

    // start, idle one minute, wake, exit
    assert_eq!(summary.ticks, 4);
    assert_eq!(summary.stats.wakeups_ontime, 1);
    assert_eq!(summary.tasks[0].status, TaskStatus::Finished);
}

#[test]
fn test_listing_serializes_to_json() {
    let scripts = Scripts::new();
    let quick = scripts.write("quick", "push 1\n");

    let summary = run_files(&[quick], &manual()).unwrap();
    let json = serde_json::to_value(&summary.tasks).unwrap();

    assert_eq!(json[0]["status"], "finished");
    assert_eq!(json[0]["pid"], 1);
}
