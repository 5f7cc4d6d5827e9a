//! Prometheus metrics for the ledger
//!
//! - `ledger_transitions_total` - Operations processed, by operation and status
//! - `ledger_commit_duration_seconds` - End-to-end commit latency per operation
//! - `ledger_events_published_total` - Transition records published, by event name

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Total operations processed
    pub static ref TRANSITIONS_TOTAL: CounterVec = register_counter_vec!(
        "ledger_transitions_total",
        "Total ledger operations processed",
        &["operation", "status"]
    )
    .unwrap();

    /// Operation duration, submission to commit (or rejection)
    pub static ref COMMIT_DURATION: HistogramVec = register_histogram_vec!(
        "ledger_commit_duration_seconds",
        "Ledger operation duration in seconds",
        &["operation"]
    )
    .unwrap();

    /// Transition records published to subscribers
    pub static ref EVENTS_PUBLISHED_TOTAL: CounterVec = register_counter_vec!(
        "ledger_events_published_total",
        "Total transition records published",
        &["event"]
    )
    .unwrap();
}
