// src/core/tasks/watchdog.rs

//! Detects connections that died without a clean close.
//!
//! Every `interval` the session sends a `PING` and arms a `PingCheck` for
//! `grace` later. Any `PONG` in between clears the pending flag; a check that
//! still finds the flag set is a dead peer.

use super::Task;
use super::timer_queue::{TimerId, TimerQueue};
use crate::core::TransportFault;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Watchdog {
    interval: Duration,
    grace: Duration,
    pending: bool,
    probe_timer: Option<TimerId>,
    check_timer: Option<TimerId>,
}

impl Watchdog {
    pub fn new(interval: Duration, grace: Duration) -> Self {
        Self {
            interval,
            grace,
            pending: false,
            probe_timer: None,
            check_timer: None,
        }
    }

    /// Starts probing a fresh connection. Whatever was armed for the previous
    /// connection is cancelled first.
    pub fn arm(&mut self, timers: &mut TimerQueue<Task>) {
        self.disarm(timers);
        self.probe_timer = Some(timers.schedule_interval(self.interval, Task::Ping));
    }

    pub fn disarm(&mut self, timers: &mut TimerQueue<Task>) {
        if let Some(id) = self.probe_timer.take() {
            timers.cancel(id);
        }
        if let Some(id) = self.check_timer.take() {
            timers.cancel(id);
        }
        self.pending = false;
    }

    /// Whether a new probe may go out. Only one probe is ever outstanding.
    pub fn should_probe(&self) -> bool {
        !self.pending
    }

    /// Records that a probe was written and arms its follow-up check.
    pub fn probe_sent(&mut self, timers: &mut TimerQueue<Task>) {
        self.pending = true;
        self.check_timer = Some(timers.schedule_once(self.grace, Task::PingCheck));
    }

    pub fn pong_received(&mut self) {
        if self.pending {
            debug!("PONG received, connection is alive.");
        }
        self.pending = false;
    }

    /// Runs the follow-up check for the last probe.
    pub fn check(&mut self) -> Result<(), TransportFault> {
        self.check_timer = None;
        if self.pending {
            return Err(TransportFault::DeadPeer(self.grace));
        }
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
