// tests/integration/mod.rs

pub mod dispatcher_test;
