// src/connection/transport.rs

//! A single live connection to the chat server.

use crate::core::TransportFault;
use crate::core::metrics;
use crate::core::protocol::message;
use crate::core::protocol::{InboundLine, LineCodec};
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::debug;

/// One framed stream plus the channels joined on it. A `Connection` is never
/// reused across a fault: the session builds a new one for every cycle.
pub struct Connection<S> {
    framed: Framed<S, LineCodec>,
    read_timeout: Duration,
    joined: HashSet<String>,
    /// Set when a PONG arrived while we were waiting on a join.
    pong_during_join: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, read_timeout: Duration) -> Self {
        Self {
            framed: Framed::new(stream, LineCodec::new()),
            read_timeout,
            joined: HashSet::new(),
            pong_during_join: false,
        }
    }

    /// Writes one line and flushes it.
    pub async fn send(&mut self, line: String) -> Result<(), TransportFault> {
        debug!("Sent:      {line}");
        self.write(line).await
    }

    /// Like [`Connection::send`], but the line never appears in logs.
    pub async fn send_masked(&mut self, line: String) -> Result<(), TransportFault> {
        debug!("Sent:      {}", "*".repeat(line.chars().count()));
        self.write(line).await
    }

    async fn write(&mut self, line: String) -> Result<(), TransportFault> {
        self.framed.send(line).await.map_err(|e| match e {
            // The codec reports io errors as read faults; on this path they are writes.
            TransportFault::Read(io) => TransportFault::Write(io),
            other => other,
        })?;
        metrics::LINES_SENT_TOTAL.inc();
        Ok(())
    }

    /// Returns the next line, reading from the socket at most once and for at
    /// most `read_timeout`. `Ok(None)` means nothing arrived in time.
    pub async fn receive_line(&mut self) -> Result<Option<String>, TransportFault> {
        match tokio::time::timeout(self.read_timeout, self.framed.next()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportFault::Closed),
            Ok(Some(Err(e))) => Err(e),
            Ok(Some(Ok(line))) => {
                debug!("Received:  {line}");
                metrics::LINES_RECEIVED_TOTAL.inc();
                Ok(Some(line))
            }
        }
    }

    /// Joins `#channel` and waits for the server's membership confirmation.
    ///
    /// Lines that arrive during the wait are dropped, apart from keepalive
    /// probes which are answered so the server does not give up on us, and
    /// PONGs, which are remembered for [`Connection::take_join_pong`].
    pub async fn join_channel(
        &mut self,
        channel: &str,
        nick: &str,
        join_timeout: Duration,
    ) -> Result<(), TransportFault> {
        if self.joined.contains(channel) {
            return Ok(());
        }

        self.send(message::join(channel)).await?;
        let deadline = Instant::now() + join_timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(TransportFault::JoinTimeout(channel.to_string()));
            }
            let Some(line) = self.receive_line().await? else {
                continue;
            };
            match InboundLine::parse(&line) {
                InboundLine::NamesEnd {
                    nick: who,
                    channel: joined,
                } if who.eq_ignore_ascii_case(nick) && joined.eq_ignore_ascii_case(channel) => {
                    break;
                }
                InboundLine::Ping(token) => self.send(message::pong(&token)).await?,
                InboundLine::Pong => self.pong_during_join = true,
                _ => debug!("Dropped while joining #{channel}: {line}"),
            }
        }

        self.joined.insert(channel.to_string());
        Ok(())
    }

    pub fn has_joined(&self, channel: &str) -> bool {
        self.joined.contains(channel)
    }

    /// Returns whether a PONG was swallowed by a join wait since the last call.
    pub fn take_join_pong(&mut self) -> bool {
        std::mem::take(&mut self.pong_during_join)
    }

    /// Flushes and shuts the stream down, ignoring errors: the peer may
    /// already be gone.
    pub async fn close(mut self) {
        let _ = SinkExt::<String>::close(&mut self.framed).await;
    }
}
