//! Cooperative deferred-callback scheduler.
//!
//! Entries fire only from [`Scheduler::run_due`], which the pump calls on
//! every pass. Order is strictly by absolute deadline; entries sharing a
//! deadline fire in the order they were (re-)armed. There is no cancel.

use core::cmp::Ordering;

use heapless::binary_heap::{BinaryHeap, Min};
use smoltcp::time::{Duration, Instant};

use crate::error::SchedulerError;

/// Deferred work. Runs to completion with exclusive access to the context.
pub type Callback<C> = fn(&mut C);

/// Stable handle of a scheduled entry, kept across periodic re-arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId(u16);

struct Entry<C> {
    deadline: Instant,
    seq: u32,
    period: Option<Duration>,
    callback: Callback<C>,
    id: TaskId,
}

impl<C> Entry<C> {
    fn key(&self) -> (Instant, u32) {
        (self.deadline, self.seq)
    }
}

impl<C> PartialEq for Entry<C> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl<C> Eq for Entry<C> {}

impl<C> PartialOrd for Entry<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for Entry<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

pub struct Scheduler<C, const SLOTS: usize> {
    queue: BinaryHeap<Entry<C>, Min, SLOTS>,
    next_seq: u32,
    next_id: u16,
}

impl<C, const SLOTS: usize> Scheduler<C, SLOTS> {
    pub const fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            next_seq: 0,
            next_id: 0,
        }
    }

    /// Fires `callback` once, `delay` after `now`.
    pub fn schedule_after(
        &mut self,
        now: Instant,
        delay: Duration,
        callback: Callback<C>,
    ) -> Result<TaskId, SchedulerError> {
        self.insert(now + delay, None, callback)
    }

    /// Fires `callback` at `now + first_delay` and then `period` after
    /// the pass that last fired it.
    pub fn schedule_every(
        &mut self,
        now: Instant,
        first_delay: Duration,
        period: Duration,
        callback: Callback<C>,
    ) -> Result<TaskId, SchedulerError> {
        if period == Duration::ZERO {
            return Err(SchedulerError::ZeroPeriod);
        }
        self.insert(now + first_delay, Some(period), callback)
    }

    fn insert(
        &mut self,
        deadline: Instant,
        period: Option<Duration>,
        callback: Callback<C>,
    ) -> Result<TaskId, SchedulerError> {
        if self.queue.len() == SLOTS {
            return Err(SchedulerError::Full);
        }
        let id = TaskId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        let entry = Entry {
            deadline,
            seq: self.bump_seq(),
            period,
            callback,
            id,
        };
        self.queue
            .push(entry)
            .map_err(|_| SchedulerError::Full)?;
        Ok(id)
    }

    fn bump_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    /// Fires every entry whose deadline is at or before `now`.
    ///
    /// Periodic entries are re-armed at `now + period` before their
    /// callback runs, so the successor always exists even if the callback
    /// bails out early. A late pass fires a periodic entry once and missed
    /// deadlines are not replayed. Returns the number of callbacks fired.
    pub fn run_due(&mut self, now: Instant, ctx: &mut C) -> usize {
        let mut fired = 0;
        while self.queue.peek().is_some_and(|e| e.deadline <= now) {
            let Some(entry) = self.queue.pop() else {
                break;
            };
            if let Some(period) = entry.period {
                let successor = Entry {
                    deadline: now + period,
                    seq: self.bump_seq(),
                    period: entry.period,
                    callback: entry.callback,
                    id: entry.id,
                };
                // The slot just freed by `pop` guarantees room.
                let _ = self.queue.push(successor);
            }
            (entry.callback)(ctx);
            fired += 1;
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|e| e.deadline)
    }

    /// Time left until the earliest entry is due, zero if it already is.
    pub fn delay_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_deadline().map(|deadline| {
            if deadline > now {
                deadline - now
            } else {
                Duration::ZERO
            }
        })
    }

    /// Pending deadline of the entry `id`, if it is still queued.
    pub fn deadline_of(&self, id: TaskId) -> Option<Instant> {
        self.queue.iter().find(|e| e.id == id).map(|e| e.deadline)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<C, const SLOTS: usize> Default for Scheduler<C, SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}
