// src/core/errors.rs

//! Defines the error taxonomy for the relay.
//!
//! Errors fall into three families. A `TransportFault` is always fatal to the
//! current connection and sends the session back through its reconnect loop.
//! A `QueryFailure` comes from the leaderboard service and is rendered as a
//! one-line chat reply. Anything else raised while handling a command is
//! `Unexpected` and is reported (abbreviated) in chat as well.

use std::sync::Arc;
use thiserror::Error;

/// Socket-level failures. Every variant ends the current connection.
#[derive(Error, Debug, Clone)]
pub enum TransportFault {
    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("TLS handshake failed: {0}")]
    Tls(String),

    #[error("Write failed: {0}")]
    Write(Arc<std::io::Error>),

    #[error("Read failed: {0}")]
    Read(Arc<std::io::Error>),

    #[error("Connection closed by peer")]
    Closed,

    #[error("No PONG received within {0:?} of the last PING")]
    DeadPeer(std::time::Duration),

    #[error("Timed out waiting to join #{0}")]
    JoinTimeout(String),

    #[error("Protocol framing error: {0}")]
    Framing(String),
}

impl PartialEq for TransportFault {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TransportFault::Write(e1), TransportFault::Write(e2))
            | (TransportFault::Read(e1), TransportFault::Read(e2)) => e1.kind() == e2.kind(),
            (TransportFault::JoinTimeout(c1), TransportFault::JoinTimeout(c2)) => c1 == c2,
            (TransportFault::Framing(s1), TransportFault::Framing(s2)) => s1 == s2,
            (TransportFault::Tls(s1), TransportFault::Tls(s2)) => s1 == s2,
            (
                TransportFault::Connect { addr: a1, .. },
                TransportFault::Connect { addr: a2, .. },
            ) => a1 == a2,
            (TransportFault::DeadPeer(d1), TransportFault::DeadPeer(d2)) => d1 == d2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

/// The leaderboard service could not produce an answer. The message is meant
/// to be shown to chat as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct QueryFailure(pub String);

/// The main error enum for the relay.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelayError {
    #[error("Transport fault: {0}")]
    Transport(#[from] TransportFault),

    #[error("{0}")]
    Query(#[from] QueryFailure),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

// --- From trait implementations for easy error conversion ---

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Unexpected(format!("JSON deserialization error: {e}"))
    }
}

impl From<chrono::ParseError> for RelayError {
    fn from(e: chrono::ParseError) -> Self {
        RelayError::Unexpected(format!("Date parse error: {e}"))
    }
}

impl From<std::io::Error> for TransportFault {
    fn from(e: std::io::Error) -> Self {
        TransportFault::Read(Arc::new(e))
    }
}
