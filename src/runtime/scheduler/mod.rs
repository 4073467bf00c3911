//! Cooperative script scheduler
//!
//! One [`Scheduler`] owns every scheduled task and four collections: the run
//! queue, the timed-hold queue, the event-hold set and the ran list. A task
//! is in exactly one of them at any time. The host calls
//! [`Scheduler::step_scripts`] once per tick and sleeps for the reported
//! number of clock ticks.

pub mod event;
pub mod queue;
pub mod task;

pub use event::{EventQueue, QueueFull, DEFAULT_MAX_EVENT_QUEUE};
pub use queue::{HoldKey, HoldQueue, RunQueue};
pub use task::{
    DebugLevel, Pid, ReviveError, Task, TaskBuilder, TaskFault, TaskIdGenerator, TaskInfo,
    TaskState, TaskStatus,
};

use std::mem;
use std::rc::Rc;

use hashbrown::HashMap;
use indexmap::IndexSet;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::runtime::clock::{Clock, ClockValue, TICKS_PER_SEC};
use crate::runtime::env::{ScriptEnv, StartError};
use crate::runtime::program::ScriptDescriptor;
use crate::runtime::value::Value;
use task::Slot;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Instructions executed per tick, shared by all runnable tasks.
    pub instructions_per_tick: usize,
    /// Longest idle period ever reported to the host, in clock ticks.
    pub max_idle: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            instructions_per_tick: 1000,
            max_idle: 60 * TICKS_PER_SEC,
        }
    }
}

/// Scheduler counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub tasks_scheduled: u64,
    pub tasks_rejected: u64,
    pub instructions: u64,
    /// Blocked tasks summed over every hold scan
    pub sleep_cycles: u64,
    pub wakeups_ontime: u64,
    pub wakeups_late: u64,
    pub traps: u64,
}

/// Why [`Scheduler::schedule`] dropped a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// No program body, already finished, errored or blocked
    NotRunnable,
    /// Run-to-completion tasks never enter the queues
    RunToCompletion,
    DuplicatePid,
}

/// Result of [`Scheduler::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    Queued(Pid),
    Discarded(DiscardReason),
}

impl ScheduleOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, ScheduleOutcome::Queued(_))
    }
}

/// Result of one host tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Whether any task was runnable when the tick started
    pub activity: bool,
    /// Clock ticks the host may idle before the next tick
    pub clocks_left: u64,
}

/// Which collection a task is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    RunQueue,
    TimedHold,
    EventHold,
    Ran,
}

/// Rejected call to [`Scheduler::signal_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("no task with pid {0}")]
    NoSuchTask(Pid),
    #[error("task {0} is no longer running")]
    NotRunning(Pid),
    #[error("event queue of task {pid} is full ({capacity} events)")]
    QueueFull { pid: Pid, capacity: usize },
}

/// Which collections a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// Run queue and both hold queues
    Running,
    Ran,
    /// Both hold queues
    Holding,
    #[default]
    All,
}

/// Listing filter.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub scope: Scope,
    pub critical_only: bool,
    pub name_pattern: Option<Regex>,
}

impl Selector {
    pub fn new(scope: Scope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    pub fn critical_only(mut self) -> Self {
        self.critical_only = true;
        self
    }

    pub fn matching(
        mut self,
        pattern: Regex,
    ) -> Self {
        self.name_pattern = Some(pattern);
        self
    }

    fn accepts(
        &self,
        task: &Task,
    ) -> bool {
        if self.critical_only && !task.critical() {
            return false;
        }
        match &self.name_pattern {
            Some(re) => re.is_match(task.name()),
            None => true,
        }
    }
}

/// The cooperative scheduler.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    clock: Rc<dyn Clock>,
    tasks: HashMap<Pid, Task>,
    run_queue: RunQueue,
    hold: HoldQueue,
    event_hold: IndexSet<Pid>,
    ran: IndexSet<Pid>,
    stats: SchedulerStats,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            clock,
            tasks: HashMap::new(),
            run_queue: RunQueue::new(),
            hold: HoldQueue::new(),
            event_hold: IndexSet::new(),
            ran: IndexSet::new(),
            stats: SchedulerStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn now(&self) -> ClockValue {
        self.clock.now()
    }

    #[inline]
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Hand a freshly built task to the scheduler.
    ///
    /// A task that is not runnable is dropped here and never queued.
    pub fn schedule(
        &mut self,
        mut task: Task,
    ) -> ScheduleOutcome {
        let pid = task.pid();
        let reason = if task.running_to_completion() {
            Some(DiscardReason::RunToCompletion)
        } else if !task.runnable() {
            Some(DiscardReason::NotRunnable)
        } else if self.tasks.contains_key(&pid) {
            Some(DiscardReason::DuplicatePid)
        } else {
            None
        };
        if let Some(reason) = reason {
            debug!(%pid, script = task.name(), ?reason, "task discarded");
            self.stats.tasks_rejected += 1;
            return ScheduleOutcome::Discarded(reason);
        }

        debug!(%pid, script = task.name(), "task scheduled");
        task.slot = Slot::Run;
        self.tasks.insert(pid, task);
        self.run_queue.push(pid);
        self.stats.tasks_scheduled += 1;
        ScheduleOutcome::Queued(pid)
    }

    /// Resolve, build and schedule a script with the full module set.
    pub fn start_script(
        &mut self,
        env: &mut ScriptEnv,
        descriptor: &ScriptDescriptor,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<Pid, StartError> {
        let builder = env.builder().args(args);
        self.start_script_with(env, descriptor, builder)
    }

    /// Resolve and schedule a script built from `builder`.
    ///
    /// Use [`ScriptEnv::common_builder`] for a task that never needs to
    /// block; such a task traps if it tries.
    pub fn start_script_with(
        &mut self,
        env: &mut ScriptEnv,
        descriptor: &ScriptDescriptor,
        builder: TaskBuilder,
    ) -> Result<Pid, StartError> {
        let task = env.create_task(descriptor, builder)?;
        match self.schedule(task) {
            ScheduleOutcome::Queued(pid) => Ok(pid),
            ScheduleOutcome::Discarded(reason) => Err(StartError::BindFailed(format!(
                "{} was not scheduled: {:?}",
                descriptor, reason
            ))),
        }
    }

    /// Step the tasks queued at tick start, sharing one instruction budget.
    ///
    /// Tasks scheduled during the tick wait for the next one. A task that
    /// exhausts the budget stays runnable and keeps its place ahead of the
    /// tasks already stepped this tick.
    pub fn run_ready(&mut self) {
        let now = self.clock.now();
        let mut pending = mem::take(&mut self.run_queue);
        let mut stepped = RunQueue::new();
        let mut budget = self.config.instructions_per_tick;

        while budget > 0 {
            let Some(pid) = pending.pop_front() else {
                break;
            };
            let Some(task) = self.tasks.get_mut(&pid) else {
                error!(%pid, "queued pid has no task");
                continue;
            };
            while budget > 0 && task.runnable() {
                task.step(now);
                budget -= 1;
                self.stats.instructions += 1;
            }
            if task.runnable() {
                stepped.push(pid);
            } else {
                self.settle(pid);
            }
        }

        let mut scheduled_mid_tick = mem::take(&mut self.run_queue);
        pending.append(&mut stepped);
        pending.append(&mut scheduled_mid_tick);
        self.run_queue = pending;
    }

    /// Move a task that stopped running into the collection its state calls for.
    fn settle(
        &mut self,
        pid: Pid,
    ) {
        let Some(task) = self.tasks.get_mut(&pid) else {
            return;
        };
        task.slot = match task.state() {
            TaskState::Runnable => {
                self.run_queue.push(pid);
                Slot::Run
            }
            TaskState::Blocked {
                wake_at: Some(wake_at),
                ..
            } => {
                debug!(%pid, %wake_at, "task on timed hold");
                Slot::TimedHold(self.hold.insert(wake_at, pid))
            }
            TaskState::Blocked { wake_at: None, .. } => {
                debug!(%pid, "task waiting for an event");
                self.event_hold.insert(pid);
                Slot::EventHold
            }
            TaskState::Finished => {
                debug!(%pid, script = task.name(), "task finished");
                self.ran.insert(pid);
                Slot::Ran
            }
            TaskState::Errored => {
                self.stats.traps += 1;
                self.ran.insert(pid);
                Slot::Ran
            }
        };
    }

    /// Revive every timed-hold task that is due and report the idle time.
    ///
    /// Returns 0 if anything is runnable, otherwise the ticks until the next
    /// wake-up, capped at the configured maximum.
    pub fn check_blocked(&mut self) -> u64 {
        let now = self.clock.now();
        self.stats.sleep_cycles += (self.hold.len() + self.event_hold.len()) as u64;

        while let Some((key, pid)) = self.hold.pop_due(now) {
            if key.wake_at == now {
                self.stats.wakeups_ontime += 1;
            } else {
                self.stats.wakeups_late += 1;
            }
            let Some(task) = self.tasks.get_mut(&pid) else {
                error!(%pid, "held pid has no task");
                continue;
            };
            match task.revive() {
                Ok(()) => {
                    task.slot = Slot::Run;
                    self.run_queue.push(pid);
                }
                Err(e) => {
                    error!(%pid, "timed hold held a task that was not blocked: {}", e);
                    task.slot = Slot::Detached;
                    self.settle(pid);
                }
            }
        }
        self.idle_duration()
    }

    /// Clock ticks the host may idle, without changing anything.
    pub fn idle_duration(&self) -> u64 {
        if !self.run_queue.is_empty() {
            return 0;
        }
        let now = self.clock.now();
        match self.hold.next_wake() {
            Some(wake_at) => now.ticks_until(wake_at).min(self.config.max_idle),
            None => self.config.max_idle,
        }
    }

    /// Advance the world by one host tick.
    pub fn step_scripts(&mut self) -> TickReport {
        let activity = !self.run_queue.is_empty();
        self.stats.ticks += 1;
        self.run_ready();
        let clocks_left = self.check_blocked();
        TickReport {
            activity,
            clocks_left,
        }
    }

    /// Look up a live task in any collection.
    pub fn find(
        &self,
        pid: Pid,
    ) -> Option<&Task> {
        self.tasks.get(&pid)
    }

    pub fn location(
        &self,
        pid: Pid,
    ) -> Option<Location> {
        match self.tasks.get(&pid)?.slot {
            Slot::Run => Some(Location::RunQueue),
            Slot::TimedHold(_) => Some(Location::TimedHold),
            Slot::EventHold => Some(Location::EventHold),
            Slot::Ran => Some(Location::Ran),
            Slot::Detached => None,
        }
    }

    /// Take a task off whichever hold queue it is in and queue it to run.
    fn release_hold(
        &mut self,
        pid: Pid,
    ) {
        let Some(task) = self.tasks.get_mut(&pid) else {
            return;
        };
        match task.slot {
            Slot::TimedHold(key) => {
                self.hold.remove(&key);
            }
            Slot::EventHold => {
                self.event_hold.shift_remove(&pid);
            }
            _ => {}
        }
        task.slot = Slot::Run;
        self.run_queue.push(pid);
    }

    /// Wake a blocked task on behalf of an external event.
    ///
    /// The blocking call returns 0. A task that is not blocked is rejected
    /// and left where it is.
    pub fn revive(
        &mut self,
        pid: Pid,
    ) -> Result<(), ReviveError> {
        let task = self
            .tasks
            .get_mut(&pid)
            .ok_or(ReviveError::NoSuchTask(pid))?;
        task.revive()?;
        self.release_hold(pid);
        Ok(())
    }

    /// Deliver an event to a task.
    ///
    /// A task blocked in `wait_for_event` receives the event as the call's
    /// result and is revived. Anything else gets it queued in its mailbox.
    pub fn signal_event(
        &mut self,
        pid: Pid,
        event: Value,
    ) -> Result<(), SignalError> {
        let task = self
            .tasks
            .get_mut(&pid)
            .ok_or(SignalError::NoSuchTask(pid))?;
        if task.state().is_terminal() {
            return Err(SignalError::NotRunning(pid));
        }

        if task.waiting_for_event() {
            if task.revive_with(event).is_ok() {
                self.release_hold(pid);
            }
            return Ok(());
        }

        match task.events_mut().push(event) {
            Ok(Some(dropped)) => {
                debug!(%pid, "event queue full, discarded oldest event {}", dropped);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(full) => {
                debug!(%pid, "event rejected: {}", full);
                Err(SignalError::QueueFull {
                    pid,
                    capacity: full.capacity,
                })
            }
        }
    }

    /// Destroy every task in the ran list. Returns how many were dropped.
    pub fn purge_ran(&mut self) -> usize {
        let count = self.ran.len();
        for pid in self.ran.drain(..) {
            self.tasks.remove(&pid);
        }
        if count > 0 {
            debug!(count, "purged ran tasks");
        }
        count
    }

    /// Remove one task from the ran list, handing it to the caller.
    pub fn take_ran(
        &mut self,
        pid: Pid,
    ) -> Option<Task> {
        if !self.ran.shift_remove(&pid) {
            return None;
        }
        let mut task = self.tasks.remove(&pid)?;
        task.slot = Slot::Detached;
        Some(task)
    }

    fn pids_in(
        &self,
        scope: Scope,
    ) -> Vec<Pid> {
        let holding = || {
            self.hold
                .iter()
                .map(|(_, pid)| pid)
                .chain(self.event_hold.iter().copied())
        };
        match scope {
            Scope::Running => self.run_queue.iter().chain(holding()).collect(),
            Scope::Holding => holding().collect(),
            Scope::Ran => self.ran.iter().copied().collect(),
            Scope::All => self
                .run_queue
                .iter()
                .chain(holding())
                .chain(self.ran.iter().copied())
                .collect(),
        }
    }

    /// Snapshot the tasks a selector matches, run queue first.
    pub fn list(
        &self,
        selector: &Selector,
    ) -> Vec<TaskInfo> {
        self.pids_in(selector.scope)
            .into_iter()
            .filter_map(|pid| self.tasks.get(&pid))
            .filter(|task| selector.accepts(task))
            .map(Task::info)
            .collect()
    }

    fn log_listing(
        &self,
        critical_only: bool,
    ) {
        let running = Selector {
            scope: Scope::Running,
            critical_only,
            name_pattern: None,
        };
        let ran = Selector {
            scope: Scope::Ran,
            ..running.clone()
        };
        info!("Running:");
        for info in self.list(&running) {
            info!("  {}", info);
        }
        info!("Ran:");
        for info in self.list(&ran) {
            info!("  {}", info);
        }
    }

    /// Log the running and ran sets.
    pub fn list_scripts(&self) {
        self.log_listing(false);
    }

    /// Log the critical tasks of the running and ran sets.
    pub fn list_crit_scripts(&self) {
        self.log_listing(true);
    }

    /// Cross-check every task's recorded slot against the collections.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen: HashMap<Pid, Location> = HashMap::new();
        let mut record = |pid: Pid, location: Location| -> Result<(), String> {
            match seen.insert(pid, location) {
                Some(previous) => Err(format!(
                    "task {} is in both {:?} and {:?}",
                    pid, previous, location
                )),
                None => Ok(()),
            }
        };
        for pid in self.run_queue.iter() {
            record(pid, Location::RunQueue)?;
        }
        for (_, pid) in self.hold.iter() {
            record(pid, Location::TimedHold)?;
        }
        for pid in self.event_hold.iter() {
            record(*pid, Location::EventHold)?;
        }
        for pid in self.ran.iter() {
            record(*pid, Location::Ran)?;
        }

        let mut previous_wake = ClockValue::ZERO;
        for (key, _) in self.hold.iter() {
            if key.wake_at < previous_wake {
                return Err("timed hold is out of order".to_string());
            }
            previous_wake = key.wake_at;
        }

        if seen.len() != self.tasks.len() {
            return Err(format!(
                "{} tasks owned but {} queued",
                self.tasks.len(),
                seen.len()
            ));
        }
        for (pid, task) in &self.tasks {
            let location = self.location(*pid);
            if location != seen.get(pid).copied() {
                return Err(format!(
                    "task {} records {:?} but sits in {:?}",
                    pid,
                    location,
                    seen.get(pid)
                ));
            }
            let timed = matches!(task.slot, Slot::TimedHold(_));
            if timed != task.sleep_until().is_some() {
                return Err(format!("task {} wake time does not match its queue", pid));
            }
            if let Some(wake_at) = task.sleep_until() {
                if wake_at.is_zero() {
                    return Err(format!("task {} is held with a zero wake time", pid));
                }
            }
            if task.error() && location == Some(Location::RunQueue) {
                return Err(format!("errored task {} is in the run queue", pid));
            }
        }
        Ok(())
    }

    /// Live tasks, in every collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[inline]
    pub fn run_queue_len(&self) -> usize {
        self.run_queue.len()
    }

    #[inline]
    pub fn hold_len(&self) -> usize {
        self.hold.len()
    }

    #[inline]
    pub fn event_hold_len(&self) -> usize {
        self.event_hold.len()
    }

    #[inline]
    pub fn ran_len(&self) -> usize {
        self.ran.len()
    }

    /// Whether the scheduler still has work that time alone can advance.
    pub fn has_pending_work(&self) -> bool {
        !self.run_queue.is_empty() || !self.hold.is_empty()
    }
}

#[cfg(test)]
mod tests;
