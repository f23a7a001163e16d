// src/core/commands/dispatcher.rs

//! Routes chat messages to command handlers.
//!
//! The dispatcher owns the moderation state but never a connection. Replies,
//! joins and timers all go through an [`Outbound`] implementation that the
//! session builds around whichever connection is live at the time.

use super::moderation::{FeatureGate, TimeoutCounter, TimeoutVictim};
use super::phrases::{PHRASE_REPLY, mentions_curated_phrase};
use super::table::{Action, CommandDef, Resolved, parse_command, resolve};
use crate::core::leaderboard::Leaderboard;
use crate::core::metrics;
use crate::core::protocol::ChatMessage;
use crate::core::tasks::{Task, TimerId};
use crate::core::{RelayError, TransportFault};
use async_trait::async_trait;
use futures::FutureExt;
use lazy_static::lazy_static;
use regex::Regex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^\w+$").unwrap();
    static ref RELAY_RE: Regex = Regex::new(r"^(\w+) +(.*)$").unwrap();
}

/// The side effects a handler may cause.
#[async_trait]
pub trait Outbound: Send {
    /// Sends `text` to `#channel`.
    async fn say(&mut self, channel: &str, text: &str) -> Result<(), TransportFault>;

    /// Joins `#channel`, returning once membership is confirmed.
    async fn join(&mut self, channel: &str) -> Result<(), TransportFault>;

    fn schedule_once(&mut self, delay: Duration, task: Task) -> TimerId;

    fn cancel(&mut self, id: TimerId);
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub bot_name: String,
    pub home_channel: String,
    /// The only user allowed to toggle `!timeout`.
    pub privileged_user: String,
    /// How long `!disabletimeout` lasts before timeouts switch back on.
    pub disable_duration: Duration,
    pub target_timeout: Duration,
    pub speaker_timeout: Duration,
}

pub struct Dispatcher {
    config: DispatcherConfig,
    leaderboard: Arc<dyn Leaderboard>,
    timeout_counts: TimeoutCounter,
    timeout_gate: FeatureGate,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, leaderboard: Arc<dyn Leaderboard>) -> Self {
        Self {
            config,
            leaderboard,
            timeout_counts: TimeoutCounter::new(),
            timeout_gate: FeatureGate::default(),
        }
    }

    pub fn timeout_count(&self, speaker: &str) -> u64 {
        self.timeout_counts.count(speaker)
    }

    pub fn timeouts_enabled(&self) -> bool {
        self.timeout_gate.is_enabled()
    }

    /// Handles one chat message behind an error barrier.
    ///
    /// Query failures are answered with their message and any other failure,
    /// panics included, with an abbreviated `Oops!!` line. Only transport
    /// faults escape, since they mean the connection itself is gone.
    pub async fn dispatch(
        &mut self,
        out: &mut dyn Outbound,
        msg: &ChatMessage,
    ) -> Result<(), TransportFault> {
        let outcome = AssertUnwindSafe(self.handle(out, msg))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(RelayError::Unexpected(panic_message(panic))));

        match outcome {
            Ok(()) => Ok(()),
            Err(RelayError::Transport(fault)) => Err(fault),
            Err(RelayError::Query(failure)) => {
                warn!("Leaderboard query failed: {failure}");
                metrics::HANDLER_ERRORS_TOTAL
                    .with_label_values(&["query"])
                    .inc();
                out.say(&msg.channel, &failure.0).await
            }
            Err(RelayError::Unexpected(detail)) => {
                error!(
                    "Command from {} in #{} failed: {detail:?} (message: {:?})",
                    msg.speaker, msg.channel, msg.text
                );
                metrics::HANDLER_ERRORS_TOTAL
                    .with_label_values(&["unexpected"])
                    .inc();
                let flat = detail.replace(['\r', '\n'], " ");
                out.say(&msg.channel, &format!("Oops!! {flat}")).await
            }
        }
    }

    /// Handles one chat message without the barrier.
    pub async fn handle(
        &mut self,
        out: &mut dyn Outbound,
        msg: &ChatMessage,
    ) -> Result<(), RelayError> {
        let in_home = msg.channel == self.config.home_channel;
        if in_home && mentions_curated_phrase(&msg.text) {
            out.say(&msg.channel, PHRASE_REPLY).await?;
        }

        let Some((token, args)) = parse_command(&msg.text) else {
            return Ok(());
        };

        match resolve(token, in_home) {
            Resolved::Command(def) => {
                metrics::COMMANDS_DISPATCHED_TOTAL
                    .with_label_values(&[def.name()])
                    .inc();
                self.run(out, msg, def, args).await
            }
            Resolved::Place(place) => {
                metrics::COMMANDS_DISPATCHED_TOTAL
                    .with_label_values(&["place"])
                    .inc();
                let text = self.leaderboard.rank_lookup(place).await?;
                Ok(out.say(&msg.channel, &text).await?)
            }
            Resolved::Unrecognized if in_home => Ok(out
                .say(&msg.channel, &format!("!{token}: unrecognized command :("))
                .await?),
            Resolved::Unrecognized => Ok(()),
        }
    }

    async fn run(
        &mut self,
        out: &mut dyn Outbound,
        msg: &ChatMessage,
        def: &'static CommandDef,
        args: &str,
    ) -> Result<(), RelayError> {
        let channel = msg.channel.as_str();
        match def.action {
            Action::Reply(text) => out.say(channel, text).await?,
            Action::ReplyLines(lines) => {
                for line in lines {
                    out.say(channel, line).await?;
                }
            }
            Action::Template(template) => {
                out.say(channel, &template.replace("{user}", &msg.speaker))
                    .await?
            }
            // Aliases are resolved by the table before we get here.
            Action::Alias(target) => {
                return Err(RelayError::Unexpected(format!(
                    "alias !{} -> !{target} reached a handler",
                    def.name()
                )));
            }
            Action::UserLookup => {
                let text = if args.is_empty() {
                    "Please provide a valid speedrun.com username to lookup.".to_string()
                } else if !USERNAME_RE.is_match(args) {
                    format!("Invalid username: {args}")
                } else {
                    self.leaderboard.user_lookup(args).await?
                };
                out.say(channel, &text).await?;
            }
            Action::LatestRun => {
                let text = self.leaderboard.latest_run().await?;
                out.say(channel, &text).await?;
            }
            Action::UpCheck => {
                let text = if self.leaderboard.up_check().await {
                    "speedrun.com appears to be UP."
                } else {
                    "speedrun.com appears to be DOWN."
                };
                out.say(channel, text).await?;
            }
            Action::Timeout => self.timeout(out, channel, &msg.speaker, args).await?,
            Action::EnableTimeout => self.enable_timeouts(out, channel, &msg.speaker).await?,
            Action::DisableTimeout => self.disable_timeouts(out, channel, &msg.speaker).await?,
            Action::Relay => self.relay(out, channel, &msg.speaker, args).await?,
        }
        Ok(())
    }

    async fn timeout(
        &mut self,
        out: &mut dyn Outbound,
        channel: &str,
        speaker: &str,
        args: &str,
    ) -> Result<(), TransportFault> {
        if !self.timeout_gate.is_enabled() {
            return out.say(channel, "Timeouts are currently disabled.").await;
        }
        if args.is_empty() {
            return out.say(channel, "Please specify a user to timeout.").await;
        }
        if !USERNAME_RE.is_match(args) {
            return out
                .say(channel, &format!("Invalid username to timeout: {args}"))
                .await;
        }

        // Counted before anything is sent, so a failed write cannot skip it.
        let (victim, duration) = match self.timeout_counts.record(speaker) {
            TimeoutVictim::Target => (args, self.config.target_timeout),
            TimeoutVictim::Speaker => (speaker, self.config.speaker_timeout),
        };
        self.time_out(out, channel, victim, duration).await
    }

    async fn time_out(
        &self,
        out: &mut dyn Outbound,
        channel: &str,
        victim: &str,
        duration: Duration,
    ) -> Result<(), TransportFault> {
        let secs = duration.as_secs();
        out.say(channel, &format!("/timeout {victim} {secs}")).await?;
        out.say(
            channel,
            &format!("User {victim} timed out for {secs} seconds."),
        )
        .await
    }

    fn is_privileged(&self, speaker: &str) -> bool {
        speaker.eq_ignore_ascii_case(&self.config.privileged_user)
    }

    async fn disable_timeouts(
        &mut self,
        out: &mut dyn Outbound,
        channel: &str,
        speaker: &str,
    ) -> Result<(), TransportFault> {
        if !self.is_privileged(speaker) {
            return out
                .say(
                    channel,
                    &format!("Only {} can disable timeouts.", self.config.privileged_user),
                )
                .await;
        }

        let reenable = out.schedule_once(self.config.disable_duration, Task::ReenableTimeout);
        if let Some(stale) = self.timeout_gate.disable(reenable) {
            out.cancel(stale);
        }
        info!(
            "Timeouts disabled by {speaker} for {:?}.",
            self.config.disable_duration
        );
        out.say(
            channel,
            &format!(
                "Timeouts disabled for {}.",
                describe_duration(self.config.disable_duration)
            ),
        )
        .await
    }

    async fn enable_timeouts(
        &mut self,
        out: &mut dyn Outbound,
        channel: &str,
        speaker: &str,
    ) -> Result<(), TransportFault> {
        if !self.is_privileged(speaker) {
            info!("{speaker} tried to re-enable timeouts without permission.");
            return self
                .time_out(out, channel, speaker, self.config.speaker_timeout)
                .await;
        }

        if let Some(pending) = self.timeout_gate.enable() {
            out.cancel(pending);
        }
        info!("Timeouts re-enabled by {speaker}.");
        out.say(channel, "Timeouts enabled.").await
    }

    /// Runs the scheduled re-enable after `!disabletimeout`.
    pub fn reenable_timeouts(&mut self) {
        info!("Timeout disable period elapsed, re-enabling timeouts.");
        self.timeout_gate.reenable_fired();
    }

    async fn relay(
        &mut self,
        out: &mut dyn Outbound,
        channel: &str,
        speaker: &str,
        args: &str,
    ) -> Result<(), RelayError> {
        let Some(caps) = RELAY_RE.captures(args) else {
            return Ok(out
                .say(
                    channel,
                    "Usage example to send a message to someone else's stream: !msg alist_ Yo Alist, get over here",
                )
                .await?);
        };
        let (target, text) = (&caps[1], &caps[2]);
        // A join requested from chat that never completes is not a connection fault.
        // An unconfirmed join here is the requester's problem, not the connection's.
        match out.join(target).await {
            Ok(()) => {}
            Err(TransportFault::JoinTimeout(unconfirmed)) => {
                return Err(RelayError::Unexpected(format!("could not join #{unconfirmed}")));
            }
            Err(fault) => return Err(fault.into()),
        }
        out.say(target, &format!("{speaker} says: {text}")).await?;
        Ok(out.say(channel, "Message sent.").await?)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// Renders whole minutes as minutes, anything else as seconds.
pub fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 60, secs % 60) {
        (1, 0) => "1 minute".to_string(),
        (minutes, 0) if minutes > 0 => format!("{minutes} minutes"),
        _ if secs == 1 => "1 second".to_string(),
        _ => format!("{secs} seconds"),
    }
}
