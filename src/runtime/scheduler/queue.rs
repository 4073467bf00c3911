//! Scheduler queues
//!
//! The run queue is plain FIFO. The timed-hold queue is ordered by wake time
//! with ties broken by insertion order, so the scheduler can stop scanning at
//! the first entry that is not yet due.

use std::collections::{BTreeMap, VecDeque};

use crate::runtime::clock::ClockValue;
use crate::runtime::scheduler::task::Pid;

/// FIFO of runnable tasks.
#[derive(Debug, Default, Clone)]
pub struct RunQueue {
    inner: VecDeque<Pid>,
}

impl RunQueue {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(
        &mut self,
        pid: Pid,
    ) {
        self.inner.push_back(pid);
    }

    #[inline]
    pub fn pop_front(&mut self) -> Option<Pid> {
        self.inner.pop_front()
    }

    /// Append every task of `other`, keeping its order.
    pub fn append(
        &mut self,
        other: &mut RunQueue,
    ) {
        self.inner.append(&mut other.inner);
    }

    pub fn iter(&self) -> impl Iterator<Item = Pid> + '_ {
        self.inner.iter().copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Position of a task in the timed-hold queue.
///
/// Field order matters: keys sort by wake time first, then by the order in
/// which tasks were put on hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HoldKey {
    pub wake_at: ClockValue,
    seq: u64,
}

/// Tasks blocked until a clock deadline.
#[derive(Debug, Default, Clone)]
pub struct HoldQueue {
    entries: BTreeMap<HoldKey, Pid>,
    next_seq: u64,
}

impl HoldQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        wake_at: ClockValue,
        pid: Pid,
    ) -> HoldKey {
        let key = HoldKey {
            wake_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.entries.insert(key, pid);
        key
    }

    pub fn remove(
        &mut self,
        key: &HoldKey,
    ) -> Option<Pid> {
        self.entries.remove(key)
    }

    /// Remove and return the earliest entry if it is due at `now`.
    pub fn pop_due(
        &mut self,
        now: ClockValue,
    ) -> Option<(HoldKey, Pid)> {
        let (key, _) = self.entries.first_key_value()?;
        if key.wake_at > now {
            return None;
        }
        self.entries.pop_first()
    }

    /// Earliest wake time, if any task is waiting.
    pub fn next_wake(&self) -> Option<ClockValue> {
        self.entries.keys().next().map(|k| k.wake_at)
    }

    /// Entries in wake order.
    pub fn iter(&self) -> impl Iterator<Item = (HoldKey, Pid)> + '_ {
        self.entries.iter().map(|(k, p)| (*k, *p))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
