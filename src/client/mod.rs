//! Caller-facing client
//!
//! [`Client`] owns one authenticated connection and its pipeline. Clones share the
//! connection; requests from every clone are serviced in submission order.

mod wire_client;

pub use wire_client::Client;
