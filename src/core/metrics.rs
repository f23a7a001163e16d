// src/core/metrics.rs

//! Defines and registers Prometheus metrics for the relay.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};

lazy_static! {
    /// 1 while a connection is in the active serve phase, 0 otherwise.
    pub static ref CONNECTED: Gauge =
        register_gauge!("chatrelay_connected", "Whether the relay is connected and serving (1 or 0).").unwrap();

    pub static ref LINES_RECEIVED_TOTAL: Counter =
        register_counter!("chatrelay_lines_received_total", "Total protocol lines received.").unwrap();
    pub static ref LINES_SENT_TOTAL: Counter =
        register_counter!("chatrelay_lines_sent_total", "Total protocol lines sent.").unwrap();
    pub static ref RECONNECTS_TOTAL: Counter =
        register_counter!("chatrelay_reconnects_total", "Total connection cycles that ended in a fault.").unwrap();
    pub static ref DEAD_PEER_TOTAL: Counter =
        register_counter!("chatrelay_dead_peer_total", "Total connections declared dead by the ping watchdog.").unwrap();
    pub static ref TIMERS_FIRED_TOTAL: Counter =
        register_counter!("chatrelay_timers_fired_total", "Total scheduled tasks run.").unwrap();

    /// Commands dispatched, labelled by the resolved command name.
    pub static ref COMMANDS_DISPATCHED_TOTAL: CounterVec =
        register_counter_vec!("chatrelay_commands_dispatched_total", "Total chat commands dispatched, labelled by command.", &["command"]).unwrap();
    /// Handler failures, labelled by kind (query or unexpected).
    pub static ref HANDLER_ERRORS_TOTAL: CounterVec =
        register_counter_vec!("chatrelay_handler_errors_total", "Total command handler failures, labelled by kind.", &["kind"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
