// src/core/commands/mod.rs

//! Chat command parsing, the command table and its handlers.

pub mod dispatcher;
pub mod moderation;
pub mod phrases;
pub mod place;
pub mod table;

pub use dispatcher::{Dispatcher, DispatcherConfig, Outbound};
pub use place::Place;
