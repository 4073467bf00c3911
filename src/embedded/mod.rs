//! Run-to-completion driver
//!
//! Executes a script synchronously inside the calling stack, for call sites
//! that need a result now and cannot wait for a scheduler tick:
//! - no queues: the task never enters the scheduler
//! - block requests complete immediately
//! - progress logging is paced in fixed instruction chunks

pub mod executor;
pub use executor::{
    call_script, run_executor_to_completion, run_script_to_completion, EmbeddedRuntime,
};
