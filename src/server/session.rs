// src/server/session.rs

//! The connection lifecycle: connect, authenticate, join, serve, reconnect.
//!
//! A `Session` owns everything that must outlive a single connection (the
//! timer queue, the watchdog, the dispatcher and its moderation state). The
//! `Connection` itself is a local of one cycle and is dropped on any fault.

use crate::config::{Config, Credential, TimingConfig};
use crate::connection::{Connection, Connector};
use crate::core::commands::{Dispatcher, DispatcherConfig, Outbound};
use crate::core::leaderboard::Leaderboard;
use crate::core::metrics;
use crate::core::protocol::message::{self, shape_text};
use crate::core::protocol::InboundLine;
use crate::core::tasks::{Task, TimerId, TimerQueue, Watchdog};
use crate::core::TransportFault;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Where the session is in its connection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Authenticating,
    Joining,
    Active,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Disconnected => "disconnected",
            Phase::Connecting => "connecting",
            Phase::Authenticating => "authenticating",
            Phase::Joining => "joining",
            Phase::Active => "active",
        };
        f.write_str(name)
    }
}

pub struct Session<C: Connector> {
    connector: C,
    credential: Credential,
    /// Used as the token of our keepalive probes.
    server_name: String,
    bot_name: String,
    home_channel: String,
    channels: Vec<String>,
    timing: TimingConfig,
    max_message_len: usize,
    phase: Phase,
    timers: TimerQueue<Task>,
    watchdog: Watchdog,
    dispatcher: Dispatcher,
}

impl<C: Connector> Session<C> {
    pub fn new(
        config: &Config,
        connector: C,
        credential: Credential,
        leaderboard: Arc<dyn Leaderboard>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            DispatcherConfig {
                bot_name: config.bot_name.clone(),
                home_channel: config.home_channel.clone(),
                privileged_user: config.privileged_user.clone(),
                disable_duration: config.moderation.disable_duration,
                target_timeout: config.moderation.target_timeout,
                speaker_timeout: config.moderation.speaker_timeout,
            },
            leaderboard,
        );

        // Announcements are armed once and survive reconnects.
        let mut timers = TimerQueue::new();
        for a in &config.announcements {
            timers.schedule_interval(
                a.interval,
                Task::Announce {
                    channel: a.channel.to_lowercase(),
                    text: a.text.clone(),
                },
            );
        }

        Self {
            connector,
            credential,
            server_name: config.host.clone(),
            bot_name: config.bot_name.clone(),
            home_channel: config.home_channel.clone(),
            channels: config.channels_to_join(),
            timing: config.timing.clone(),
            max_message_len: config.max_message_len,
            phase: Phase::Disconnected,
            timers,
            watchdog: Watchdog::new(config.timing.ping_interval, config.timing.ping_grace),
            dispatcher,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn timers(&self) -> &TimerQueue<Task> {
        &self.timers
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            info!("Session {} -> {}", self.phase, phase);
            self.phase = phase;
        }
        metrics::CONNECTED.set(if phase == Phase::Active { 1.0 } else { 0.0 });
    }

    /// Runs connection cycles until `shutdown_rx` fires. Every fault is logged
    /// and followed by `reconnect_backoff` before the next attempt.
    pub async fn run(&mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                fault = self.run_cycle() => {
                    metrics::RECONNECTS_TOTAL.inc();
                    warn!(
                        "Connection to {} lost: {fault}. Reconnecting in {:?}.",
                        self.connector.describe(),
                        self.timing.reconnect_backoff
                    );
                }
                _ = shutdown_rx.recv() => {
                    info!("Session shutting down.");
                    self.set_phase(Phase::Disconnected);
                    return;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.timing.reconnect_backoff) => {}
                _ = shutdown_rx.recv() => {
                    info!("Session shutting down during backoff.");
                    return;
                }
            }
        }
    }

    /// One full connection cycle. Only returns once the connection has failed;
    /// by then it has been dropped and the watchdog disarmed.
    pub async fn run_cycle(&mut self) -> TransportFault {
        let fault = match self.connect().await {
            Ok(mut conn) => {
                let fault = self.serve(&mut conn).await;
                conn.close().await;
                fault
            }
            Err(fault) => fault,
        };
        if matches!(fault, TransportFault::DeadPeer(_)) {
            metrics::DEAD_PEER_TOTAL.inc();
        }
        self.watchdog.disarm(&mut self.timers);
        self.set_phase(Phase::Disconnected);
        fault
    }

    /// Dials, authenticates and joins every configured channel.
    pub async fn connect(&mut self) -> Result<Connection<C::Stream>, TransportFault> {
        self.set_phase(Phase::Connecting);
        info!("Connecting to {}", self.connector.describe());
        let stream = self.connector.connect().await?;
        let mut conn = Connection::new(stream, self.timing.read_timeout);

        self.set_phase(Phase::Authenticating);
        conn.send_masked(message::pass(self.credential.expose()))
            .await?;
        conn.send(message::nick(&self.bot_name)).await?;
        conn.send(message::user(&self.bot_name)).await?;

        self.set_phase(Phase::Joining);
        for channel in &self.channels {
            conn.join_channel(channel, &self.bot_name, self.timing.join_timeout)
                .await?;
            info!("Joined #{channel}");
        }

        // A check armed for the previous connection must not fault this one.
        conn.take_join_pong();
        self.watchdog.arm(&mut self.timers);
        self.set_phase(Phase::Active);
        Ok(conn)
    }

    /// Reads and handles lines until the connection faults. Each iteration
    /// handles either one line or one batch of due timers.
    pub async fn serve(&mut self, conn: &mut Connection<C::Stream>) -> TransportFault {
        loop {
            let step = match conn.receive_line().await {
                Ok(None) => self.run_due(conn).await,
                Ok(Some(line)) => self.handle_line(conn, &line).await,
                Err(fault) => Err(fault),
            };
            if let Err(fault) = step {
                return fault;
            }
        }
    }

    async fn handle_line(
        &mut self,
        conn: &mut Connection<C::Stream>,
        line: &str,
    ) -> Result<(), TransportFault> {
        match InboundLine::parse(line) {
            InboundLine::Ping(token) => conn.send(message::pong(&token)).await,
            InboundLine::Pong => {
                self.watchdog.pong_received();
                Ok(())
            }
            InboundLine::Chat(msg) if msg.speaker.eq_ignore_ascii_case(&self.bot_name) => Ok(()),
            InboundLine::Chat(msg) => {
                let mut io = SessionIo {
                    conn,
                    timers: &mut self.timers,
                    nick: &self.bot_name,
                    join_timeout: self.timing.join_timeout,
                    max_message_len: self.max_message_len,
                };
                let result = self.dispatcher.dispatch(&mut io, &msg).await;
                // A handler-initiated join may have consumed the answer to our probe.
                if conn.take_join_pong() {
                    self.watchdog.pong_received();
                }
                result
            }
            InboundLine::NamesEnd { .. } | InboundLine::Other => Ok(()),
        }
    }

    /// Pops and runs every task due now. An error stops the batch and leaves
    /// the remaining tasks queued; the failed task is still re-armed.
    pub async fn run_due(
        &mut self,
        conn: &mut Connection<C::Stream>,
    ) -> Result<(), TransportFault> {
        while let Some(fired) = self.timers.pop_due(Instant::now()) {
            metrics::TIMERS_FIRED_TOTAL.inc();
            let result = self.run_task(conn, &fired.task).await;
            self.timers.rearm(fired, Instant::now());
            result?;
        }
        Ok(())
    }

    async fn run_task(
        &mut self,
        conn: &mut Connection<C::Stream>,
        task: &Task,
    ) -> Result<(), TransportFault> {
        match task {
            Task::Ping => {
                if !self.watchdog.should_probe() {
                    return Ok(());
                }
                conn.send(message::ping(&self.server_name)).await?;
                self.watchdog.probe_sent(&mut self.timers);
                Ok(())
            }
            Task::PingCheck => self.watchdog.check(),
            Task::ReenableTimeout => {
                self.dispatcher.reenable_timeouts();
                if !conn.has_joined(&self.home_channel) {
                    return Ok(());
                }
                let line = message::privmsg(&self.home_channel, "Timeouts enabled.");
                conn.send(line).await
            }
            Task::Announce { channel, text } => {
                if !conn.has_joined(channel) {
                    debug!("Skipping announcement for #{channel}: not joined.");
                    return Ok(());
                }
                let text = shape_text(text, self.max_message_len);
                conn.send(message::privmsg(channel, &text)).await
            }
        }
    }
}

/// The dispatcher's view of the live connection, rebuilt for every message.
struct SessionIo<'a, S> {
    conn: &'a mut Connection<S>,
    timers: &'a mut TimerQueue<Task>,
    nick: &'a str,
    join_timeout: Duration,
    max_message_len: usize,
}

#[async_trait]
impl<S> Outbound for SessionIo<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn say(&mut self, channel: &str, text: &str) -> Result<(), TransportFault> {
        let text = shape_text(text, self.max_message_len);
        self.conn
            .send(message::privmsg(&channel.to_lowercase(), &text))
            .await
    }

    async fn join(&mut self, channel: &str) -> Result<(), TransportFault> {
        self.conn
            .join_channel(&channel.to_lowercase(), self.nick, self.join_timeout)
            .await
    }

    fn schedule_once(&mut self, delay: Duration, task: Task) -> TimerId {
        self.timers.schedule_once(delay, task)
    }

    fn cancel(&mut self, id: TimerId) {
        self.timers.cancel(id);
    }
}
