//! Connection establishment
//!
//! This module handles:
//! * Transport abstraction (TCP, Unix socket, caller-provided stream)
//! * Configuration consumed by the handshake and codecs
//! * Capability negotiation and the session descriptor
//! * Handshake state machine and driver (TLS upgrade, auth switch, auth more data)
//! * TLS configuration and support

mod config;
mod conn;
mod session;
mod state;
mod tls;
mod transport;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, Password, PasswordProvider};
pub use conn::Connection;
pub use session::{default_collation, negotiate_capabilities, Session};
pub use state::HandshakeState;
pub use tls::{parse_server_name, SslMode, TlsConfig, TlsConfigBuilder};
pub use transport::{IoStream, TcpVariant, Transport};
