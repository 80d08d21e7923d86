//! Counter metrics

use super::labels;
use metrics::counter;

/// Handshake attempted with an auth plugin
pub fn handshake_attempted(plugin: &str) {
    counter!("mysql_wire_handshakes_total", labels::PLUGIN => plugin.to_string()).increment(1);
}

/// Handshake reached `Authenticated`
pub fn handshake_succeeded(plugin: &str) {
    counter!("mysql_wire_handshakes_succeeded_total", labels::PLUGIN => plugin.to_string())
        .increment(1);
}

pub fn handshake_failed(plugin: &str, reason: &str) {
    counter!(
        "mysql_wire_handshakes_failed_total",
        labels::PLUGIN => plugin.to_string(),
        labels::REASON => reason.to_string()
    )
    .increment(1);
}

/// Server asked for a different auth plugin
pub fn auth_switched(plugin: &str) {
    counter!("mysql_wire_auth_switches_total", labels::PLUGIN => plugin.to_string()).increment(1);
}

pub fn request_submitted(command: &'static str) {
    counter!("mysql_wire_requests_total", labels::COMMAND => command).increment(1);
}

/// Request finished with the given outcome label
pub fn request_completed(command: &'static str, outcome: &'static str) {
    counter!(
        "mysql_wire_requests_completed_total",
        labels::COMMAND => command,
        labels::OUTCOME => outcome
    )
    .increment(1);
}

/// Caller stopped listening; the response was drained
pub fn request_abandoned(command: &'static str) {
    counter!("mysql_wire_requests_abandoned_total", labels::COMMAND => command).increment(1);
}

pub fn protocol_error(reason: &'static str) {
    counter!("mysql_wire_protocol_errors_total", labels::REASON => reason).increment(1);
}

/// Payload bytes fed through the compressor
pub fn bytes_compressed(algorithm: &str, n: u64) {
    counter!("mysql_wire_bytes_compressed_total", labels::ALGORITHM => algorithm.to_string())
        .increment(n);
}
