//! Per-task event mailbox

use std::collections::VecDeque;

use thiserror::Error;

use crate::runtime::value::Value;

/// Default mailbox capacity.
pub const DEFAULT_MAX_EVENT_QUEUE: usize = 20;

/// The mailbox is at capacity and discarding is disabled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event queue full ({capacity} events)")]
pub struct QueueFull {
    pub capacity: usize,
}

/// Bounded FIFO of events waiting for a task to pick them up.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: VecDeque<Value>,
    capacity: usize,
    discard_old: bool,
}

impl EventQueue {
    /// `capacity` is clamped to at least one event.
    pub fn new(
        capacity: usize,
        discard_old: bool,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_MAX_EVENT_QUEUE)),
            capacity,
            discard_old,
        }
    }

    /// Enqueue an event.
    ///
    /// When full, either drops the oldest event and returns it, or rejects
    /// the new one, depending on how the queue was configured.
    pub fn push(
        &mut self,
        event: Value,
    ) -> Result<Option<Value>, QueueFull> {
        let mut discarded = None;
        if self.events.len() >= self.capacity {
            if !self.discard_old {
                return Err(QueueFull {
                    capacity: self.capacity,
                });
            }
            discarded = self.events.pop_front();
        }
        self.events.push_back(event);
        Ok(discarded)
    }

    pub fn pop(&mut self) -> Option<Value> {
        self.events.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn discards_old(&self) -> bool {
        self.discard_old
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENT_QUEUE, false)
    }
}
