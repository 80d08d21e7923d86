//! mysql-wire: async MySQL client wire protocol
//!
//! This crate implements the client side of the MySQL/MariaDB protocol:
//!
//! * Packet framing with 16 MiB splitting and the zlib/zstd compressed envelope
//! * Handshake, capability negotiation, TLS upgrade and authentication plugins
//! * A sequencer that services concurrent callers in submission order over one connection
//! * Pure decoding of backend messages from (leading byte, phase, capabilities)
//! * A codec registry converting column values to and from host types
//!
//! Connection pooling, SQL parsing and result-set mapping are left to higher layers.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> mysql_wire::Result<()> {
//! use futures::StreamExt;
//! use mysql_wire::{BackendMessage, Client, ConnectionConfig, FrontendMessage};
//!
//! let config = ConnectionConfig::builder()
//!     .host("127.0.0.1")
//!     .user("app")
//!     .password("secret")
//!     .build()?;
//! let client = Client::connect(config).await?;
//!
//! let mut rows = client.submit(FrontendMessage::Query("SELECT 1".into())).await?;
//! while let Some(msg) = rows.next().await {
//!     if let BackendMessage::Row(row) = msg? {
//!         println!("{:?}", row.values);
//!     }
//! }
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]

pub mod auth;
pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod protocol;

pub use client::Client;
pub use codec::{CodecContext, ConnectionTimeZone, Value, ZeroDateOption};
pub use connection::{ConnectionConfig, Password, Session, SslMode, TlsConfig};
pub use error::{CodecError, Error, Result, ServerError};
pub use pipeline::ResponseStream;
pub use protocol::{BackendMessage, CompressionAlgorithm, FrontendMessage};
