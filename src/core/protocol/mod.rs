// src/core/protocol/mod.rs

pub mod line_codec;
pub mod message;
pub use line_codec::{LineCodec, MAX_LINE_LENGTH};
pub use message::{ChatMessage, InboundLine};
