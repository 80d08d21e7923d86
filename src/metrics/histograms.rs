//! Histogram metrics

use super::labels;
use metrics::histogram;

/// Greeting to `Authenticated`, in milliseconds
pub fn handshake_duration(plugin: &str, millis: u64) {
    histogram!("mysql_wire_handshake_duration_ms", labels::PLUGIN => plugin.to_string())
        .record(millis as f64);
}

/// Submission to terminal message, in milliseconds
pub fn exchange_duration(command: &'static str, millis: u64) {
    histogram!("mysql_wire_exchange_duration_ms", labels::COMMAND => command).record(millis as f64);
}

/// Messages delivered for one exchange
pub fn exchange_messages(command: &'static str, count: u64) {
    histogram!("mysql_wire_exchange_messages", labels::COMMAND => command).record(count as f64);
}
