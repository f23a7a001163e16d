// src/core/tasks/timer_queue.rs

//! A single-threaded min-heap of scheduled tasks.
//!
//! The queue never runs anything itself. The session pops due entries with
//! [`TimerQueue::pop_due`], interprets the task, and hands interval entries
//! back through [`TimerQueue::rearm`] so their next firing is measured from
//! when the previous one completed.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;
use tokio::time::Instant;

/// Identifies a scheduled entry for cancellation. Interval entries keep the
/// same id every time they are re-armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

struct Entry<T> {
    due: Instant,
    /// Insertion order, used to keep equal due times first-in first-out.
    seq: u64,
    id: TimerId,
    period: Option<Duration>,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// A task that has come due. Interval tasks should be passed back to
/// [`TimerQueue::rearm`] once they have run.
#[derive(Debug)]
pub struct Fired<T> {
    pub id: TimerId,
    pub task: T,
    period: Option<Duration>,
}

impl<T> Fired<T> {
    pub fn is_interval(&self) -> bool {
        self.period.is_some()
    }
}

pub struct TimerQueue<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    cancelled: HashSet<TimerId>,
    next_seq: u64,
    next_id: u64,
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
            next_id: 0,
        }
    }

    /// Schedules `task` to fire once, `delay` from now.
    pub fn schedule_once(&mut self, delay: Duration, task: T) -> TimerId {
        self.schedule_at(Instant::now() + delay, task)
    }

    /// Schedules `task` to fire once at `due`.
    pub fn schedule_at(&mut self, due: Instant, task: T) -> TimerId {
        let id = self.allocate_id();
        self.push(due, id, None, task);
        id
    }

    /// Schedules `task` to fire every `period`, starting one period from now.
    pub fn schedule_interval(&mut self, period: Duration, task: T) -> TimerId {
        let id = self.allocate_id();
        self.push(Instant::now() + period, id, Some(period), task);
        id
    }

    /// Prevents the entry (or interval series) with this id from firing again.
    /// Cancelling an id that already fired is a no-op.
    pub fn cancel(&mut self, id: TimerId) {
        if self.heap.iter().any(|Reverse(e)| e.id == id) {
            self.cancelled.insert(id);
        }
    }

    /// Pops the earliest entry if it is due at `now`. Cancelled entries are
    /// discarded on the way.
    pub fn pop_due(&mut self, now: Instant) -> Option<Fired<T>> {
        loop {
            let head_due = self.heap.peek().map(|Reverse(e)| e.due)?;
            if head_due > now {
                return None;
            }
            let Reverse(entry) = self.heap.pop()?;
            if self.cancelled.remove(&entry.id) {
                continue;
            }
            return Some(Fired {
                id: entry.id,
                task: entry.task,
                period: entry.period,
            });
        }
    }

    /// Puts an interval task back on the queue, one period after `completed_at`.
    /// One-shot tasks are dropped.
    pub fn rearm(&mut self, fired: Fired<T>, completed_at: Instant) {
        if let Some(period) = fired.period {
            self.push(completed_at + period, fired.id, Some(period), fired.task);
        }
    }

    /// The due time of the next live entry, if any.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap
            .iter()
            .filter(|Reverse(e)| !self.cancelled.contains(&e.id))
            .map(|Reverse(e)| e.due)
            .min()
    }

    /// Number of entries that can still fire.
    pub fn len(&self) -> usize {
        self.heap
            .iter()
            .filter(|Reverse(e)| !self.cancelled.contains(&e.id))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn allocate_id(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn push(&mut self, due: Instant, id: TimerId, period: Option<Duration>, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            due,
            seq,
            id,
            period,
            task,
        }));
    }
}
