//! scriptrt: a cooperative script runtime
//!
//! Drives many small scripts inside one host process without a thread per
//! script. Each host tick the [`Scheduler`] gives runnable scripts a shared
//! instruction budget, wakes sleepers whose deadline has passed, and tells
//! the host how long it may idle.
//!
//! # Example
//!
//! ```no_run
//! use scriptrt::{run_files, HostOptions, Result};
//! use std::path::PathBuf;
//!
//! fn main() -> Result<()> {
//!     let summary = run_files(&[PathBuf::from("hello.scr")], &HostOptions::default())?;
//!     println!("{} ticks", summary.ticks);
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

// Public modules
pub mod embedded;
pub mod runtime;
pub mod std;
pub mod vm;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use embedded::{call_script, run_executor_to_completion, run_script_to_completion};
pub use runtime::clock::{Clock, ClockValue, ManualClock, MonotonicClock, TICKS_PER_SEC};
pub use runtime::program::{Program, ProgramStore, ScriptDescriptor};
pub use runtime::scheduler::{Pid, Scheduler, SchedulerStats, Selector, TaskInfo};
pub use runtime::value::Value;
pub use runtime::{ScriptEnv, StartError};
pub use util::config::RuntimeConfig;

use ::std::path::PathBuf;
use ::std::rc::Rc;
use tracing::debug;

use crate::runtime::clock::ticks_to_duration;

/// Runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime name
pub const NAME: &str = "scriptrt";

/// How [`run_files`] drives the scheduler.
#[derive(Debug, Clone, Default)]
pub struct HostOptions {
    pub config: RuntimeConfig,
    /// Stop after this many ticks
    pub max_ticks: Option<u64>,
    /// Advance a simulated clock instead of sleeping
    pub manual_clock: bool,
}

/// What a host run left behind.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub ticks: u64,
    pub tasks: Vec<TaskInfo>,
    pub stats: SchedulerStats,
}

/// Schedule every file and tick until nothing is left that time can advance.
///
/// Tasks waiting for an event with no timeout do not keep the loop alive.
pub fn run_files(
    files: &[PathBuf],
    options: &HostOptions,
) -> Result<RunSummary> {
    let manual = options.manual_clock.then(ManualClock::new);
    let clock: Rc<dyn Clock> = match &manual {
        Some(clock) => Rc::new(clock.clone()),
        None => Rc::new(MonotonicClock::new()),
    };

    let mut env = ScriptEnv::new(ProgramStore::new(), options.config.clone(), Rc::clone(&clock));
    let mut scheduler = Scheduler::new(env.config.scheduler_config(), clock);

    for file in files {
        let descriptor = ScriptDescriptor::exact(file);
        scheduler
            .start_script(&mut env, &descriptor, [])
            .with_context(|| format!("Failed to start script: {}", file.display()))?;
    }

    let mut ticks = 0;
    while scheduler.has_pending_work() {
        if options.max_ticks.is_some_and(|max| ticks >= max) {
            debug!(ticks, "tick limit reached");
            break;
        }
        let report = scheduler.step_scripts();
        ticks += 1;
        if !scheduler.has_pending_work() {
            break;
        }
        match &manual {
            // One tick of simulated time per host tick, more when idle
            Some(clock) => clock.advance(report.clocks_left.max(1)),
            None if report.clocks_left > 0 => {
                ::std::thread::sleep(ticks_to_duration(report.clocks_left))
            }
            None => {}
        }
    }

    Ok(RunSummary {
        ticks,
        tasks: scheduler.list(&Selector::default()),
        stats: scheduler.stats().clone(),
    })
}
