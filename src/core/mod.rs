// src/core/mod.rs

//! The central module containing the protocol, scheduling and command logic of the relay.

pub mod commands;
pub mod errors;
pub mod leaderboard;
pub mod metrics;
pub mod protocol;
pub mod tasks;

pub use errors::{QueryFailure, RelayError, TransportFault};
