//! Run-to-completion executor
//!
//! Drives one task inside the caller's stack until it finishes or traps.
//! Tasks run here never enter the scheduler's queues, and a block request
//! completes immediately instead of suspending.

use std::path::Path;
use std::rc::Rc;

use tracing::{debug, error, info};

use crate::runtime::clock::Clock;
use crate::runtime::env::{ScriptEnv, StartError};
use crate::runtime::program::ScriptDescriptor;
use crate::runtime::scheduler::{DebugLevel, Task};
use crate::runtime::value::{Value, EXITED_WITH_ERROR, UNABLE_TO_READ_SCRIPT};
use crate::util::config::RtcSection;

/// Synchronous executor.
///
/// # Usage
/// ```rust,ignore
/// let runtime = EmbeddedRuntime::from_env(&env);
/// let ok = runtime.run_worker(&mut task);
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddedRuntime {
    /// Log progress of long-running scripts
    report: bool,
    /// Instructions between progress reports
    interval: u64,
    clock: Rc<dyn Clock>,
}

impl EmbeddedRuntime {
    pub fn new(
        rtc: &RtcSection,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            report: rtc.report_rtc_scripts,
            interval: rtc.report_interval.max(1),
            clock,
        }
    }

    pub fn from_env(env: &ScriptEnv) -> Self {
        Self::new(&env.config.rtc, env.clock())
    }

    /// Step `task` until it is no longer runnable.
    ///
    /// Progress is logged every `interval` instructions when reporting is on;
    /// the pacing never hands control to anything else. Returns whether the
    /// script reported progress at least once.
    fn drive(
        &self,
        task: &mut Task,
    ) -> bool {
        task.set_debug_level(DebugLevel::None);
        task.set_running_to_completion(true);

        let mut chunk = 0;
        let mut reported = false;
        while task.runnable() {
            task.step(self.clock.now());
            chunk += 1;
            if chunk == self.interval {
                chunk = 0;
                if self.report {
                    info!(script = task.name(), pc = task.pc(), "script running..");
                    reported = true;
                }
            }
        }
        reported
    }

    /// Run a task for its side effects. True iff it did not trap.
    pub fn run_worker(
        &self,
        task: &mut Task,
    ) -> bool {
        if self.report {
            info!(script = task.name(), "script running");
        }
        self.drive(task);
        !task.error()
    }

    /// Run a task for its result.
    ///
    /// Yields the top of the value stack, `1` if the stack is empty, or an
    /// error value if the script trapped.
    pub fn run_for_value(
        &self,
        task: &mut Task,
    ) -> Value {
        if self.drive(task) {
            info!(script = task.name(), "script done");
        }
        if task.error() {
            return Value::error(EXITED_WITH_ERROR);
        }
        task.value_stack().last().cloned().unwrap_or(Value::Int(1))
    }
}

/// Bind a program for run-to-completion, keeping hollow programs.
fn bind_for_rtc(
    env: &mut ScriptEnv,
    descriptor: &ScriptDescriptor,
    args: Vec<Value>,
) -> Result<Task, StartError> {
    let program = env.resolve(descriptor).ok_or_else(|| {
        error!("Error reading script {}", descriptor);
        StartError::NoSuchProgram(descriptor.name())
    })?;
    let builder = env.builder().args(args);
    env.bind(program, builder)
}

/// Run a script file to completion for its side effects.
///
/// True iff the program was found and ran without trapping. A program with
/// no body counts as success.
pub fn run_script_to_completion(
    env: &mut ScriptEnv,
    filename: &Path,
    args: impl IntoIterator<Item = Value>,
) -> bool {
    let descriptor = ScriptDescriptor::exact(filename);
    match bind_for_rtc(env, &descriptor, args.into_iter().collect()) {
        Ok(mut task) => EmbeddedRuntime::from_env(env).run_worker(&mut task),
        Err(e) => {
            debug!("{}", e);
            false
        }
    }
}

/// Run a script to completion for its result.
///
/// A missing program yields the `Unable to read script` error value; it never
/// fails at the host level.
pub fn run_executor_to_completion(
    env: &mut ScriptEnv,
    descriptor: &ScriptDescriptor,
    args: impl IntoIterator<Item = Value>,
) -> Value {
    match bind_for_rtc(env, descriptor, args.into_iter().collect()) {
        Ok(mut task) => EmbeddedRuntime::from_env(env).run_for_value(&mut task),
        Err(StartError::NoSuchProgram(_)) => Value::error(UNABLE_TO_READ_SCRIPT),
        Err(e) => Value::error(e.to_string()),
    }
}

/// Run a script to completion and report whether its result is true.
pub fn call_script(
    env: &mut ScriptEnv,
    descriptor: &ScriptDescriptor,
    args: impl IntoIterator<Item = Value>,
) -> bool {
    run_executor_to_completion(env, descriptor, args).is_true()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::clock::ManualClock;
    use crate::runtime::program::{parse_program, Program, ProgramStore};
    use crate::std::Role;
    use crate::util::config::RuntimeConfig;

    fn env_with(sources: &[(&str, &str)]) -> ScriptEnv {
        let mut env = ScriptEnv::new(
            ProgramStore::new(),
            RuntimeConfig::default(),
            Rc::new(ManualClock::new()),
        );
        for (name, source) in sources {
            env.store.insert(parse_program(name, source).unwrap());
        }
        env
    }

    #[test]
    fn test_empty_stack_returns_one() {
        let mut env = env_with(&[("side_effect", "push 5\nstore_global 0\nexit\n")]);
        let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("side_effect"), []);
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn test_returns_top_of_stack() {
        let mut env = env_with(&[("add", "add\n")]);
        let value = run_executor_to_completion(
            &mut env,
            &ScriptDescriptor::logical("add"),
            [Value::Int(2), Value::Int(40)],
        );
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn test_first_argument_is_popped_first() {
        let mut env = env_with(&[("first", "store_local 0\npop\nload_local 0\n")]);
        let value = run_executor_to_completion(
            &mut env,
            &ScriptDescriptor::logical("first"),
            [Value::str("a"), Value::str("b")],
        );
        assert_eq!(value, Value::str("a"));
    }

    #[test]
    fn test_trap_returns_error_value() {
        let mut env = env_with(&[("boom", "push 1\npush 0\ndiv\n")]);
        let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("boom"), []);
        assert_eq!(value, Value::error(EXITED_WITH_ERROR));
        assert!(!call_script(&mut env, &ScriptDescriptor::logical("boom"), []));
    }

    #[test]
    fn test_missing_program_returns_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = env_with(&[]);
        env.store = ProgramStore::with_root(dir.path());
        let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("ghost"), []);
        assert_eq!(value, Value::error(UNABLE_TO_READ_SCRIPT));
        assert!(!run_script_to_completion(
            &mut env,
            &dir.path().join("ghost.scr"),
            []
        ));
    }

    #[test]
    fn test_hollow_program_succeeds() {
        let mut env = env_with(&[]);
        env.store.insert(Program::empty("hollow"));
        let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("hollow"), []);
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn test_sleep_does_not_suspend() {
        let mut env = env_with(&[("nap", "push 30\nsys os.sleep 1\npop\npush 7\n")]);
        let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("nap"), []);
        assert_eq!(value, Value::Int(7));
    }

    #[test]
    fn test_wait_for_event_returns_zero() {
        let mut env = env_with(&[("wait", "push -1\nsys os.wait_for_event 1\n")]);
        let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("wait"), []);
        assert_eq!(value, Value::Int(0));
    }

    #[test]
    fn test_call_script_truthiness() {
        let mut env = env_with(&[("yes", "push 3\n"), ("no", "push 0\n")]);
        assert!(call_script(&mut env, &ScriptDescriptor::logical("yes"), []));
        assert!(!call_script(&mut env, &ScriptDescriptor::logical("no"), []));
    }

    #[test]
    fn test_run_worker_reports_trap() {
        let mut env = env_with(&[("ok", "push 1\n"), ("bad", "trap \"nope\"\n")]);
        let runtime = EmbeddedRuntime::from_env(&env);

        let mut ok = env
            .create_task(&ScriptDescriptor::logical("ok"), env.builder())
            .unwrap();
        assert!(runtime.run_worker(&mut ok));

        let mut bad = env
            .create_task(&ScriptDescriptor::logical("bad"), env.builder())
            .unwrap();
        assert!(!runtime.run_worker(&mut bad));
        assert_eq!(bad.fault().unwrap().message, "nope");
        assert!(bad.running_to_completion());
    }

    #[test]
    fn test_progress_reporting_does_not_change_result() {
        let mut env = env_with(&[(
            "loop",
            "push 50\nstore_local 0\ntop:\nload_local 0\njump_if_false done\nload_local 0\npush 1\nsub\nstore_local 0\njump top\ndone:\npush 9\n",
        )]);
        env.config.rtc.report_rtc_scripts = true;
        env.config.rtc.report_interval = 7;
        let value = run_executor_to_completion(&mut env, &ScriptDescriptor::logical("loop"), []);
        assert_eq!(value, Value::Int(9));
    }

    #[test]
    fn test_os_call_without_os_module_traps() {
        let mut env = env_with(&[("nap", "push 1\nsys os.sleep 1\n")]);
        let builder = env.builder().roles(&[Role::Basic]);
        let mut task = env
            .create_task(&ScriptDescriptor::logical("nap"), builder)
            .unwrap();
        assert!(!EmbeddedRuntime::from_env(&env).run_worker(&mut task));
        assert!(task.fault().unwrap().message.contains("os"));
    }
}
