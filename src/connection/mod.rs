// src/connection/mod.rs

pub mod stream;
pub mod transport;

pub use stream::{ChatStream, Connector, TlsDialer};
pub use transport::Connection;
