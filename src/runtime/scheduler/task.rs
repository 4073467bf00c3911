//! Task definitions for the scheduler.
//!
//! A [`Task`] is one script's execution state: its program, interpreter
//! context, attached capability modules, event mailbox and scheduling state.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, trace, warn};

use crate::runtime::clock::ClockValue;
use crate::runtime::program::Program;
use crate::runtime::scheduler::event::{EventQueue, DEFAULT_MAX_EVENT_QUEUE};
use crate::runtime::scheduler::queue::HoldKey;
use crate::runtime::value::Value;
use crate::std::{BlockRequest, CallContext, CapabilityRegistry, CapabilitySet, Role, SysOutcome};
use crate::vm::{exec_instr, ExecContext, Flow, SysHost, Trap, VMConfig, VMResult};

/// Process id, unique among live tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Pid(pub u32);

impl Pid {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Pid {
    fn from(val: u32) -> Self {
        Self(val)
    }
}

impl fmt::Display for Pid {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generator for process ids.
#[derive(Debug)]
pub struct TaskIdGenerator {
    next_id: u32,
}

impl TaskIdGenerator {
    /// Ids start at 1.
    #[inline]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Generate the next pid. Zero is never handed out.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Pid {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        Pid(id)
    }
}

impl Default for TaskIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Scheduling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to execute.
    Runnable,
    /// Suspended by the script itself.
    Blocked {
        /// Deadline, if the block has a timeout.
        wake_at: Option<ClockValue>,
        /// Whether an incoming event ends the block.
        wants_event: bool,
    },
    /// Ran to the end of its program.
    Finished,
    /// Stopped by a trap.
    Errored,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Errored)
    }
}

/// Instruction tracing level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    #[default]
    None,
    /// Trace every executed instruction
    Instructions,
}

/// Where and why a task trapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFault {
    pub pc: usize,
    pub message: String,
}

impl fmt::Display for TaskFault {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} (PC={})", self.message, self.pc)
    }
}

/// Rejected call to [`Task::revive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReviveError {
    #[error("no task with pid {0}")]
    NoSuchTask(Pid),
    #[error("task {0} is not blocked")]
    NotBlocked(Pid),
}

/// Which scheduler collection a task is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Detached,
    Run,
    TimedHold(HoldKey),
    EventHold,
    Ran,
}

/// Status column of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Runnable,
    Sleeping,
    WaitingEvent,
    Finished,
    Errored,
}

/// Read-only snapshot of a task, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskInfo {
    pub pid: Pid,
    pub name: String,
    pub status: TaskStatus,
    pub critical: bool,
    pub pc: usize,
    pub instr_cycles: u64,
    pub globals: usize,
    pub locals: usize,
    pub value_stack: usize,
    pub upper_locals: usize,
    pub control_stack: usize,
    pub wake_at: Option<ClockValue>,
    pub fault: Option<TaskFault>,
}

impl fmt::Display for TaskInfo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.name)?;
        let counters = [
            ("Gl", self.globals),
            ("Lc", self.locals),
            ("VS", self.value_stack),
            ("UL", self.upper_locals),
            ("CS", self.control_stack),
        ];
        for (label, count) in counters {
            if count > 0 {
                write!(f, " {}={}", label, count)?;
            }
        }
        if let Some(fault) = &self.fault {
            write!(f, " ERR: {}", fault)?;
        }
        Ok(())
    }
}

/// Options for building a task.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    name: Option<String>,
    critical: bool,
    args: Vec<Value>,
    roles: Vec<Role>,
    debug_level: DebugLevel,
    vm_config: VMConfig,
    max_event_queue: usize,
    discard_old_events: bool,
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self {
            name: None,
            critical: false,
            args: Vec::new(),
            roles: CapabilityRegistry::full_roles().to_vec(),
            debug_level: DebugLevel::None,
            vm_config: VMConfig::default(),
            max_event_queue: DEFAULT_MAX_EVENT_QUEUE,
            discard_old_events: false,
        }
    }
}

impl TaskBuilder {
    /// Builder attaching the full module set.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the script name; defaults to the program name.
    #[inline]
    pub fn name(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    pub fn critical(
        mut self,
        critical: bool,
    ) -> Self {
        self.critical = critical;
        self
    }

    /// Arguments, in the order the script pops them.
    #[inline]
    pub fn args(
        mut self,
        args: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.args = args.into_iter().collect();
        self
    }

    /// Replace the set of modules to attach.
    #[inline]
    pub fn roles(
        mut self,
        roles: &[Role],
    ) -> Self {
        self.roles = roles.to_vec();
        self
    }

    #[inline]
    pub fn debug_level(
        mut self,
        level: DebugLevel,
    ) -> Self {
        self.debug_level = level;
        self
    }

    #[inline]
    pub fn vm_config(
        mut self,
        config: VMConfig,
    ) -> Self {
        self.vm_config = config;
        self
    }

    #[inline]
    pub fn events(
        mut self,
        max_event_queue: usize,
        discard_old_events: bool,
    ) -> Self {
        self.max_event_queue = max_event_queue;
        self.discard_old_events = discard_old_events;
        self
    }

    pub fn requested_roles(&self) -> &[Role] {
        &self.roles
    }

    /// Build a task bound to `program`.
    ///
    /// A program without a body yields a task with no usable program: it is
    /// not runnable and its arguments are not pushed. Roles the registry
    /// cannot provide are returned alongside the task.
    pub fn build(
        self,
        pid: Pid,
        registry: &CapabilityRegistry,
        program: Arc<Program>,
    ) -> (Task, Vec<Role>) {
        let mut capabilities = CapabilitySet::new();
        let missing = registry.attach_all(&mut capabilities, &self.roles);

        let name = self.name.unwrap_or_else(|| program.name().to_string());
        let mut task = Task {
            pid,
            name,
            critical: self.critical,
            program: None,
            ctx: ExecContext::new(),
            capabilities,
            events: EventQueue::new(self.max_event_queue, self.discard_old_events),
            running_to_completion: false,
            debug_level: self.debug_level,
            vm_config: self.vm_config,
            state: TaskState::Finished,
            fault: None,
            instr_cycles: 0,
            slot: Slot::Detached,
        };

        if program.has_body() {
            for arg in self.args.into_iter().rev() {
                task.ctx.push(arg);
            }
            task.program = Some(program);
            task.state = TaskState::Runnable;
        }
        (task, missing)
    }
}

/// One script's execution state.
#[derive(Debug)]
pub struct Task {
    pid: Pid,
    name: String,
    critical: bool,
    program: Option<Arc<Program>>,
    ctx: ExecContext,
    capabilities: CapabilitySet,
    events: EventQueue,
    running_to_completion: bool,
    debug_level: DebugLevel,
    vm_config: VMConfig,
    state: TaskState,
    fault: Option<TaskFault>,
    instr_cycles: u64,
    pub(crate) slot: Slot,
}

/// Borrowed view of a task that module calls are dispatched through.
struct TaskHost<'a> {
    capabilities: &'a mut CapabilitySet,
    cx: CallContext<'a>,
}

impl SysHost for TaskHost<'_> {
    fn sys(
        &mut self,
        role: Role,
        name: &str,
        args: &[Value],
    ) -> VMResult<SysOutcome> {
        let module = self
            .capabilities
            .get_mut(role)
            .ok_or(Trap::MissingModule(role))?;
        module.call(name, args, &mut self.cx)
    }
}

impl Task {
    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn critical(&self) -> bool {
        self.critical
    }

    /// The bound program, if it had a body.
    #[inline]
    pub fn program(&self) -> Option<&Arc<Program>> {
        self.program.as_ref()
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Not errored, not finished and not blocked.
    #[inline]
    pub fn runnable(&self) -> bool {
        self.state == TaskState::Runnable
    }

    #[inline]
    pub fn blocked(&self) -> bool {
        matches!(self.state, TaskState::Blocked { .. })
    }

    /// Wake deadline while blocked with a timeout.
    #[inline]
    pub fn sleep_until(&self) -> Option<ClockValue> {
        match self.state {
            TaskState::Blocked { wake_at, .. } => wake_at,
            _ => None,
        }
    }

    /// Whether the task stopped on a trap.
    #[inline]
    pub fn error(&self) -> bool {
        self.state == TaskState::Errored
    }

    #[inline]
    pub fn fault(&self) -> Option<&TaskFault> {
        self.fault.as_ref()
    }

    #[inline]
    pub fn pc(&self) -> usize {
        self.ctx.pc
    }

    #[inline]
    pub fn value_stack(&self) -> &[Value] {
        &self.ctx.value_stack
    }

    #[inline]
    pub fn context(&self) -> &ExecContext {
        &self.ctx
    }

    #[inline]
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    #[inline]
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    #[inline]
    pub fn instr_cycles(&self) -> u64 {
        self.instr_cycles
    }

    #[inline]
    pub fn running_to_completion(&self) -> bool {
        self.running_to_completion
    }

    /// In run-to-completion mode block requests complete immediately.
    pub fn set_running_to_completion(
        &mut self,
        on: bool,
    ) {
        self.running_to_completion = on;
    }

    pub fn set_debug_level(
        &mut self,
        level: DebugLevel,
    ) {
        self.debug_level = level;
    }

    /// Push an argument for the script to pop.
    pub fn push_arg(
        &mut self,
        value: Value,
    ) {
        self.ctx.push(value);
    }

    /// Execute one instruction.
    ///
    /// Status is read back through [`runnable`](Self::runnable),
    /// [`blocked`](Self::blocked) and [`error`](Self::error). Stepping a task
    /// that is not runnable does nothing.
    pub fn step(
        &mut self,
        now: ClockValue,
    ) {
        if self.state != TaskState::Runnable {
            error!(pid = %self.pid, script = %self.name, state = ?self.state, "step on a task that is not runnable");
            return;
        }
        let Some(program) = self.program.as_ref() else {
            self.state = TaskState::Finished;
            return;
        };

        let pc = self.ctx.pc;
        if self.debug_level == DebugLevel::Instructions {
            if let Some(instr) = program.code().get(pc) {
                trace!(pid = %self.pid, pc, "{}", instr);
            }
        }

        let mut host = TaskHost {
            capabilities: &mut self.capabilities,
            cx: CallContext {
                pid: self.pid,
                script_name: &self.name,
                now,
                running_to_completion: self.running_to_completion,
                events: &mut self.events,
                critical: self.critical,
            },
        };
        let result = exec_instr(&mut self.ctx, program.code(), &mut host, &self.vm_config);
        self.instr_cycles += 1;

        match result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => self.state = TaskState::Finished,
            Ok(Flow::Block(request)) => self.block(request, now, pc),
            Err(trap) => self.fail(trap, pc),
        }
    }

    fn block(
        &mut self,
        request: BlockRequest,
        now: ClockValue,
        pc: usize,
    ) {
        if self.running_to_completion {
            // Nothing can wake a task that is not queued: complete the call now.
            self.ctx.push(Value::Int(0));
            return;
        }
        if !self.capabilities.contains(Role::Os) {
            self.fail(Trap::CannotBlock, pc);
            return;
        }
        self.state = match request {
            BlockRequest::Sleep(ticks) => TaskState::Blocked {
                wake_at: Some(now.after(ticks)),
                wants_event: false,
            },
            BlockRequest::WaitEvent { timeout } => TaskState::Blocked {
                wake_at: timeout.map(|ticks| now.after(ticks)),
                wants_event: true,
            },
        };
    }

    fn fail(
        &mut self,
        trap: Trap,
        pc: usize,
    ) {
        let fault = TaskFault {
            pc,
            message: trap.to_string(),
        };
        if self.critical {
            warn!(pid = %self.pid, script = %self.name, "critical script exited with an error: {}", fault);
        } else {
            debug!(pid = %self.pid, script = %self.name, "script exited with an error: {}", fault);
        }
        self.fault = Some(fault);
        self.state = TaskState::Errored;
    }

    /// Return a blocked task to runnable; the blocking call returns 0.
    pub fn revive(&mut self) -> Result<(), ReviveError> {
        self.revive_with(Value::Int(0))
    }

    /// Return a blocked task to runnable with `value` as the blocking call's result.
    pub(crate) fn revive_with(
        &mut self,
        value: Value,
    ) -> Result<(), ReviveError> {
        if !self.blocked() {
            return Err(ReviveError::NotBlocked(self.pid));
        }
        self.ctx.push(value);
        self.state = TaskState::Runnable;
        Ok(())
    }

    /// Whether the task is blocked in a wait that an event would end.
    pub fn waiting_for_event(&self) -> bool {
        matches!(
            self.state,
            TaskState::Blocked {
                wants_event: true,
                ..
            }
        )
    }

    /// Listing snapshot.
    pub fn info(&self) -> TaskInfo {
        let status = match self.state {
            TaskState::Runnable => TaskStatus::Runnable,
            TaskState::Blocked {
                wants_event: true, ..
            } => TaskStatus::WaitingEvent,
            TaskState::Blocked { .. } => TaskStatus::Sleeping,
            TaskState::Finished => TaskStatus::Finished,
            TaskState::Errored => TaskStatus::Errored,
        };
        TaskInfo {
            pid: self.pid,
            name: self.name.clone(),
            status,
            critical: self.critical,
            pc: self.ctx.pc,
            instr_cycles: self.instr_cycles,
            globals: self.ctx.globals.len(),
            locals: self.ctx.locals.len(),
            value_stack: self.ctx.value_stack.len(),
            upper_locals: self.ctx.upper_locals.len(),
            control_stack: self.ctx.control_stack.len(),
            wake_at: self.sleep_until(),
            fault: self.fault.clone(),
        }
    }
}
