//! Scheduler unit tests


use std::rc::Rc;

use crate::runtime::clock::ManualClock;
use crate::runtime::env::ScriptEnv;
use crate::runtime::program::{parse_program, ProgramStore, ScriptDescriptor};
use crate::runtime::scheduler::{Pid, Scheduler, SchedulerConfig};
use crate::util::config::RuntimeConfig;

/// Scheduler, environment and clock sharing one manual time source.
pub(super) struct World {
    pub clock: ManualClock,
    pub env: ScriptEnv,
    pub sched: Scheduler,
}

impl World {
    pub fn new(instructions_per_tick: usize) -> Self {
        let clock = ManualClock::new();
        let env = ScriptEnv::new(
            ProgramStore::new(),
            RuntimeConfig::default(),
            Rc::new(clock.clone()),
        );
        let sched = Scheduler::new(
            SchedulerConfig {
                instructions_per_tick,
                max_idle: 60_000,
            },
            Rc::new(clock.clone()),
        );
        Self { clock, env, sched }
    }

    pub fn load(
        &mut self,
        name: &str,
        source: &str,
    ) {
        self.env
            .store
            .insert(parse_program(name, source).expect("test program parses"));
    }

    pub fn start(
        &mut self,
        name: &str,
    ) -> Pid {
        self.sched
            .start_script(&mut self.env, &ScriptDescriptor::logical(name), [])
            .expect("script starts")
    }

    pub fn assert_invariants(&self) {
        if let Err(e) = self.sched.check_invariants() {
            panic!("scheduler invariant broken: {}", e);
        }
    }
}

pub(super) const SPIN: &str = "top:\n  jump top\n";
