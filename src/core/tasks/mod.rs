// src/core/tasks/mod.rs

//! Deferred and periodic work for the session's cooperative scheduler.

pub mod timer_queue;
pub mod watchdog;

pub use timer_queue::{Fired, TimerId, TimerQueue};
pub use watchdog::Watchdog;

/// Work the session knows how to run when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Send a keepalive probe.
    Ping,
    /// Fault the connection if the last probe went unanswered.
    PingCheck,
    /// Turn the moderated timeout command back on.
    ReenableTimeout,
    /// Post a configured announcement.
    Announce { channel: String, text: String },
}
