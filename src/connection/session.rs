//! Session descriptor and capability negotiation

use super::config::ConnectionConfig;
use crate::protocol::constants::capabilities::*;
use crate::protocol::constants::collations;
use crate::protocol::CompressionAlgorithm;
use crate::{Error, Result};
use bytes::Bytes;

/// Connection identity established by the handshake.
///
/// Immutable once built; the pipeline reads the capability set for every decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Server version string from the greeting
    pub server_version: String,
    /// Server thread id
    pub connection_id: u32,
    /// Negotiated capability flags
    pub capabilities: u32,
    /// Client collation sent in the handshake response
    pub collation: u8,
    /// Status flags from the greeting, updated by the final OK
    pub status_flags: u16,
    /// Authentication salt of the greeting (or of the last auth switch)
    pub scramble: Bytes,
    /// Plugin that completed authentication
    pub auth_plugin: String,
    /// Authenticated user
    pub user: String,
    /// Initial database, if one was sent
    pub database: Option<String>,
    /// Negotiated compression
    pub compression: CompressionAlgorithm,
    /// Whether the transport is TLS-encrypted
    pub tls: bool,
}

impl Session {
    /// Whether `flag` was negotiated
    pub fn has_capability(&self, flag: u32) -> bool {
        self.capabilities & flag != 0
    }

    /// Whether OK packets replace EOF packets on this connection
    pub fn deprecate_eof(&self) -> bool {
        self.has_capability(CLIENT_DEPRECATE_EOF)
    }

    /// Whether the server is MariaDB
    pub fn is_mariadb(&self) -> bool {
        self.server_version.contains("MariaDB")
    }
}

/// Compute the negotiated capability set and compression algorithm.
///
/// The result is `(server & supported) | CLIENT_PROTOCOL_41`, minus the bits the
/// configuration does not use:
///
/// | bit | kept when |
/// |---|---|
/// | `CLIENT_SSL` | `ssl_mode` is not `Disabled` |
/// | `CLIENT_CONNECT_WITH_DB` | a non-empty database is configured |
/// | `CLIENT_LOCAL_FILES` | `local_infile_path` is set |
/// | `CLIENT_CONNECT_ATTRS` | connection attributes are configured |
/// | `CLIENT_COMPRESS` / `CLIENT_ZSTD_COMPRESSION_ALGORITHM` | it is the first preferred algorithm the server supports |
///
/// # Errors
///
/// `Error::Protocol` when the server lacks a required capability, `Error::Config` when TLS
/// is requested but not offered, or no acceptable compression algorithm remains.
pub fn negotiate_capabilities(server: u32, config: &ConnectionConfig) -> Result<(u32, CompressionAlgorithm)> {
    if server & CLIENT_REQUIRED != CLIENT_REQUIRED {
        return Err(Error::Protocol(format!(
            "server capabilities 0x{:08X} lack the 4.1 protocol",
            server
        )));
    }

    let mut caps = (server & CLIENT_SUPPORTED) | CLIENT_PROTOCOL_41;

    if config.ssl_mode.is_enabled() {
        if server & CLIENT_SSL == 0 {
            return Err(Error::Config(format!(
                "ssl mode {} requested but the server does not support TLS",
                config.ssl_mode
            )));
        }
    } else {
        caps &= !CLIENT_SSL;
    }
    if config.database_name().is_none() {
        caps &= !CLIENT_CONNECT_WITH_DB;
    }
    if config.local_infile_path.is_none() {
        caps &= !CLIENT_LOCAL_FILES;
    }
    if config.connect_attributes.is_empty() {
        caps &= !CLIENT_CONNECT_ATTRS;
    }

    caps &= !(CLIENT_COMPRESS | CLIENT_ZSTD_COMPRESSION_ALGORITHM);
    let compression = choose_compression(server, &config.compression)?;
    match compression {
        CompressionAlgorithm::Zlib => caps |= CLIENT_COMPRESS,
        CompressionAlgorithm::Zstd => caps |= CLIENT_ZSTD_COMPRESSION_ALGORITHM,
        CompressionAlgorithm::Uncompressed => {}
    }

    tracing::debug!(
        server = format_args!("0x{:08X}", server),
        negotiated = format_args!("0x{:08X}", caps),
        compression = %compression,
        "capabilities negotiated"
    );
    Ok((caps, compression))
}

fn choose_compression(server: u32, preference: &[CompressionAlgorithm]) -> Result<CompressionAlgorithm> {
    for algorithm in preference {
        let offered = match algorithm {
            CompressionAlgorithm::Uncompressed => return Ok(CompressionAlgorithm::Uncompressed),
            CompressionAlgorithm::Zlib => server & CLIENT_COMPRESS != 0,
            CompressionAlgorithm::Zstd => server & CLIENT_ZSTD_COMPRESSION_ALGORITHM != 0,
        };
        if offered && algorithm.is_available() {
            return Ok(*algorithm);
        }
    }
    Err(Error::Config(format!(
        "server supports none of the requested compression algorithms {:?}",
        preference
    )))
}

/// Default client collation for a server version.
///
/// `utf8mb4_0900_ai_ci` exists from MySQL 8.0.1; older servers and MariaDB get
/// `utf8mb4_general_ci`.
pub fn default_collation(server_version: &str) -> u8 {
    if server_version.contains("MariaDB") {
        return collations::UTF8MB4_GENERAL_CI;
    }
    let mut parts = server_version
        .split(|c: char| !c.is_ascii_digit())
        .map(|p| p.parse::<u32>().unwrap_or(0));
    let version = (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    );
    if version >= (8, 0, 1) {
        collations::UTF8MB4_0900_AI_CI
    } else {
        collations::UTF8MB4_GENERAL_CI
    }
}
