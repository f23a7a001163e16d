// src/core/commands/moderation.rs

//! State behind the moderated `!timeout` command.

use crate::core::tasks::TimerId;
use std::collections::HashMap;

/// How many times each speaker has used `!timeout`. Lives for the whole
/// process, across reconnects.
#[derive(Debug, Default)]
pub struct TimeoutCounter {
    counts: HashMap<String, u64>,
}

/// Who a `!timeout` invocation ends up silencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutVictim {
    /// The user named in the command.
    Target,
    /// The user who issued it.
    Speaker,
}

impl TimeoutCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one invocation by `speaker` and decides its outcome. Only every
    /// third use (the first, fourth, seventh...) hits the named target.
    pub fn record(&mut self, speaker: &str) -> TimeoutVictim {
        let count = self.counts.entry(speaker.to_string()).or_insert(0);
        let victim = if *count % 3 == 0 {
            TimeoutVictim::Target
        } else {
            TimeoutVictim::Speaker
        };
        *count += 1;
        victim
    }

    pub fn count(&self, speaker: &str) -> u64 {
        self.counts.get(speaker).copied().unwrap_or(0)
    }
}

/// On/off switch for `!timeout`, with the timer that will switch it back on.
#[derive(Debug)]
pub struct FeatureGate {
    enabled: bool,
    reenable: Option<TimerId>,
}

impl Default for FeatureGate {
    fn default() -> Self {
        Self {
            enabled: true,
            reenable: None,
        }
    }
}

impl FeatureGate {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turns the feature off until `reenable` fires. Returns the previous
    /// re-enable timer, which the caller must cancel.
    pub fn disable(&mut self, reenable: TimerId) -> Option<TimerId> {
        self.enabled = false;
        self.reenable.replace(reenable)
    }

    /// Turns the feature on. Returns the pending re-enable timer, if any, for
    /// the caller to cancel.
    pub fn enable(&mut self) -> Option<TimerId> {
        self.enabled = true;
        self.reenable.take()
    }

    /// Called when the scheduled re-enable fires.
    pub fn reenable_fired(&mut self) {
        self.enabled = true;
        self.reenable = None;
    }

    pub fn pending_reenable(&self) -> Option<TimerId> {
        self.reenable
    }
}
