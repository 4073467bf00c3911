//! Script environment
//!
//! Bundles what every task needs at creation time: the program store, the
//! capability registry, the pid generator, the runtime configuration and
//! the clock. Both the scheduler and the run-to-completion driver build
//! their tasks through [`ScriptEnv::create_task`].

use std::rc::Rc;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::runtime::clock::{Clock, MonotonicClock};
use crate::runtime::program::{Program, ProgramResolver, ProgramStore, ScriptDescriptor};
use crate::runtime::scheduler::{Task, TaskBuilder, TaskIdGenerator};
use crate::std::CapabilityRegistry;
use crate::util::config::RuntimeConfig;

/// Why a script could not be started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("no such program: {0}")]
    NoSuchProgram(String),
    #[error("program has no body: {0}")]
    NoBody(String),
    #[error("bind failed: {0}")]
    BindFailed(String),
}

/// Shared state for creating tasks.
#[derive(Debug)]
pub struct ScriptEnv {
    pub store: ProgramStore,
    pub registry: CapabilityRegistry,
    pub config: RuntimeConfig,
    pids: TaskIdGenerator,
    clock: Rc<dyn Clock>,
}

impl ScriptEnv {
    pub fn new(
        store: ProgramStore,
        config: RuntimeConfig,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry: CapabilityRegistry::default(),
            config,
            pids: TaskIdGenerator::new(),
            clock,
        }
    }

    /// Environment with an empty store, default config and the wall clock.
    pub fn with_defaults() -> Self {
        Self::new(
            ProgramStore::new(),
            RuntimeConfig::default(),
            Rc::new(MonotonicClock::new()),
        )
    }

    #[inline]
    pub fn clock(&self) -> Rc<dyn Clock> {
        Rc::clone(&self.clock)
    }

    /// A builder carrying the configured limits and the full module set.
    pub fn builder(&self) -> TaskBuilder {
        TaskBuilder::new()
            .vm_config(self.config.vm_config())
            .events(
                self.config.events.max_event_queue,
                self.config.events.discard_old_events,
            )
    }

    /// Like [`builder`](Self::builder) but with the common modules only.
    pub fn common_builder(&self) -> TaskBuilder {
        self.builder().roles(CapabilityRegistry::common_roles())
    }

    /// Look up a program through the store.
    pub fn resolve(
        &mut self,
        descriptor: &ScriptDescriptor,
    ) -> Option<Arc<Program>> {
        self.store.resolve(descriptor)
    }

    /// Build a task for an already resolved program.
    ///
    /// A program without a body still yields a task, one that is not runnable.
    pub fn bind(
        &mut self,
        program: Arc<Program>,
        builder: TaskBuilder,
    ) -> Result<Task, StartError> {
        let pid = self.pids.next();
        let (task, missing) = builder.build(pid, &self.registry, program);
        if !missing.is_empty() {
            let roles: Vec<String> = missing.iter().map(ToString::to_string).collect();
            return Err(StartError::BindFailed(format!(
                "cannot attach module(s) {} to {}",
                roles.join(", "),
                task.name()
            )));
        }
        debug!(%pid, script = task.name(), "task created");
        Ok(task)
    }

    /// Resolve a program and build a runnable task for it.
    ///
    /// A missing program, a program without a body and a module the registry
    /// cannot provide are each reported distinctly.
    pub fn create_task(
        &mut self,
        descriptor: &ScriptDescriptor,
        builder: TaskBuilder,
    ) -> Result<Task, StartError> {
        let program = self
            .resolve(descriptor)
            .ok_or_else(|| StartError::NoSuchProgram(descriptor.name()))?;
        if !program.has_body() {
            return Err(StartError::NoBody(program.name().to_string()));
        }
        self.bind(program, builder)
    }
}
