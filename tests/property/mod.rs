// tests/property/mod.rs

//! Property-based tests for chatrelay
//!
//! These tests use property-based testing to verify invariants and properties
//! that should always hold, regardless of input values.

pub mod codec_test;
pub mod timer_order_test;
