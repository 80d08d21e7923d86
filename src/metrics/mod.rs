//! Metrics instrumentation
//!
//! Everything is recorded through the `metrics` facade. Without an installed recorder
//! these calls are no-ops, so applications opt in by installing an exporter.
//!
//! * `counters` handshakes, requests, drains, protocol errors, compression volume
//! * `histograms` handshake and exchange durations
//! * `labels` label keys and fixed label values

pub mod counters;
pub mod histograms;
pub mod labels;
