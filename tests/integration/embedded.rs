//! Run-to-completion tests against script files

use std::rc::Rc;

use scriptrt::runtime::value::{EXITED_WITH_ERROR, UNABLE_TO_READ_SCRIPT};
use scriptrt::{
    call_script, run_executor_to_completion, run_script_to_completion, ManualClock, ProgramStore,
    RuntimeConfig, ScriptDescriptor, ScriptEnv, Value,
};

use crate::common::Scripts;

fn env_for(scripts: &Scripts) -> ScriptEnv {
    ScriptEnv::new(
        ProgramStore::with_root(scripts.path()),
        RuntimeConfig::default(),
        Rc::new(ManualClock::new()),
    )
}

#[test]
fn test_result_is_top_of_stack() {
    let scripts = Scripts::new();
    scripts.write("answer", "push 40\npush 2\nadd\n");
    let mut env = env_for(&scripts);

    let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("answer"), []);
    assert_eq!(value, Value::Int(42));
}

#[test]
fn test_first_argument_is_on_top() {
    let scripts = Scripts::new();
    scripts.write("second", "pop\n");
    let mut env = env_for(&scripts);

    let value = run_executor_to_completion(
        &mut env,
        &ScriptDescriptor::logical("second"),
        [Value::Int(7), Value::Int(9)],
    );
    assert_eq!(value, Value::Int(9));
}

#[test]
fn test_sleep_runs_straight_through() {
    let scripts = Scripts::new();
    scripts.write("ai/patrol", "push 3600\nsys os.sleep 1\npop\npush 5\n");
    let mut env = env_for(&scripts);

    let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("ai/patrol"), []);
    assert_eq!(value, Value::Int(5));
}

#[test]
fn test_errors_become_values() {
    let scripts = Scripts::new();
    scripts.write("crash", "push 1\npush 0\ndiv\n");
    let mut env = env_for(&scripts);

    let crash = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("crash"), []);
    assert_eq!(crash, Value::error(EXITED_WITH_ERROR));

    let missing = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("ghost"), []);
    assert_eq!(missing, Value::error(UNABLE_TO_READ_SCRIPT));
}

#[test]
fn test_call_script_truthiness() {
    let scripts = Scripts::new();
    scripts.write("yes", "push 1\n");
    scripts.write("no", "push 0\n");
    let mut env = env_for(&scripts);

    assert!(call_script(&mut env, &ScriptDescriptor::logical("yes"), []));
    assert!(!call_script(&mut env, &ScriptDescriptor::logical("no"), []));
    assert!(!call_script(&mut env, &ScriptDescriptor::logical("ghost"), []));
}

#[test]
fn test_run_script_to_completion_by_path() {
    let scripts = Scripts::new();
    let ok = scripts.write("ok", "push 1\npop\n");
    let bad = scripts.write("bad", "push 1\npush 0\ndiv\n");
    let mut env = env_for(&scripts);

    assert!(run_script_to_completion(&mut env, &ok, []));
    assert!(!run_script_to_completion(&mut env, &bad, []));
    assert!(!run_script_to_completion(
        &mut env,
        &scripts.path().join("ghost.scr"),
        []
    ));
}

#[test]
fn test_programs_are_cached_after_first_run() {
    let scripts = Scripts::new();
    scripts.write("once", "push 1\n");
    let mut env = env_for(&scripts);

    assert!(call_script(&mut env, &ScriptDescriptor::logical("once"), []));
    assert!(env.store.get("once").is_some());
    assert_eq!(env.store.len(), 1);
}
