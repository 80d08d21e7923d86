//! Protocol message types

use super::types::{ColumnType, Format};
use crate::codec::Value;
use crate::error::ServerError;
use bytes::Bytes;

/// Frontend message (client → server)
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendMessage {
    /// SSL request: the capability prefix of the handshake response
    SslRequest(SslRequest),

    /// Handshake response carrying credentials
    HandshakeResponse(HandshakeResponse),

    /// Raw authentication continuation (auth switch response, public key request, ...)
    AuthResponse(Bytes),

    /// COM_QUERY
    Query(String),

    /// COM_INIT_DB
    InitDb(String),

    /// COM_PING
    Ping,

    /// COM_QUIT
    Quit,

    /// COM_RESET_CONNECTION
    ResetConnection,

    /// COM_STMT_PREPARE
    StmtPrepare(String),

    /// COM_STMT_EXECUTE with binary parameters
    StmtExecute {
        /// Statement id from `PrepareOk`
        statement_id: u32,
        /// Parameter values, one per placeholder
        params: Vec<Value>,
    },

    /// COM_STMT_CLOSE (no response)
    StmtClose(u32),

    /// COM_STMT_RESET
    StmtReset(u32),
}

impl FrontendMessage {
    /// Short command name for spans and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Self::SslRequest(_) => "ssl_request",
            Self::HandshakeResponse(_) => "handshake_response",
            Self::AuthResponse(_) => "auth_response",
            Self::Query(_) => "query",
            Self::InitDb(_) => "init_db",
            Self::Ping => "ping",
            Self::Quit => "quit",
            Self::ResetConnection => "reset_connection",
            Self::StmtPrepare(_) => "stmt_prepare",
            Self::StmtExecute { .. } => "stmt_execute",
            Self::StmtClose(_) => "stmt_close",
            Self::StmtReset(_) => "stmt_reset",
        }
    }

    /// Whether the message is only valid during the handshake
    pub fn is_handshake(&self) -> bool {
        matches!(
            self,
            Self::SslRequest(_) | Self::HandshakeResponse(_) | Self::AuthResponse(_)
        )
    }
}

/// SSL request packet fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslRequest {
    pub capabilities: u32,
    pub max_packet_size: u32,
    pub collation: u8,
}

/// Handshake response (protocol 4.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Negotiated capability flags
    pub capabilities: u32,
    /// Largest packet the client will send
    pub max_packet_size: u32,
    /// Client collation id
    pub collation: u8,
    /// User name
    pub username: String,
    /// Plugin-specific scramble
    pub auth_response: Bytes,
    /// Initial database, sent when `CLIENT_CONNECT_WITH_DB` is negotiated
    pub database: Option<String>,
    /// Plugin that produced `auth_response`
    pub auth_plugin: String,
    /// Connection attributes, sent when `CLIENT_CONNECT_ATTRS` is negotiated
    pub attributes: Vec<(String, String)>,
    /// zstd level, sent when zstd compression is negotiated
    pub zstd_level: Option<u8>,
}

/// Backend message (server → client)
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    /// Initial handshake (greeting)
    Handshake(Handshake),

    /// OK packet
    Ok(OkPacket),

    /// ERR packet
    Error(ServerError),

    /// EOF packet (connections without `CLIENT_DEPRECATE_EOF`)
    Eof(EofPacket),

    /// Column count introducing a result set
    ColumnCount(u64),

    /// Column definition
    ColumnDefinition(ColumnDefinition),

    /// Result set row
    Row(Row),

    /// COM_STMT_PREPARE success header
    PrepareOk(PrepareOk),

    /// Server asks for a different authentication plugin
    AuthSwitchRequest(AuthSwitchRequest),

    /// Plugin-specific authentication continuation
    AuthMoreData(Bytes),

    /// LOAD DATA LOCAL INFILE request naming the file to send
    LocalInfileRequest(String),
}

impl BackendMessage {
    /// Status flags of OK and EOF packets
    pub fn status_flags(&self) -> Option<u16> {
        match self {
            Self::Ok(ok) => Some(ok.status_flags),
            Self::Eof(eof) => Some(eof.status_flags),
            _ => None,
        }
    }

    /// Variant name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::Ok(_) => "ok",
            Self::Error(_) => "error",
            Self::Eof(_) => "eof",
            Self::ColumnCount(_) => "column_count",
            Self::ColumnDefinition(_) => "column_definition",
            Self::Row(_) => "row",
            Self::PrepareOk(_) => "prepare_ok",
            Self::AuthSwitchRequest(_) => "auth_switch_request",
            Self::AuthMoreData(_) => "auth_more_data",
            Self::LocalInfileRequest(_) => "local_infile_request",
        }
    }
}

/// Initial handshake, by protocol version
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Pre-4.1 protocol 9 greeting (decoded, never accepted)
    V9(HandshakeV9),
    /// Protocol 10 greeting
    V10(HandshakeV10),
}

/// Protocol 9 greeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeV9 {
    pub server_version: String,
    pub connection_id: u32,
    pub scramble: Bytes,
}

/// Protocol 10 greeting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeV10 {
    /// Server version string (e.g. `8.0.36`)
    pub server_version: String,
    /// Server thread id
    pub connection_id: u32,
    /// Full authentication salt (both parts, trailing NUL removed)
    pub auth_plugin_data: Bytes,
    /// Server capability flags
    pub capabilities: u32,
    /// Server default collation
    pub collation: u8,
    /// Server status flags
    pub status_flags: u16,
    /// Default authentication plugin, when `CLIENT_PLUGIN_AUTH` is advertised
    pub auth_plugin_name: Option<String>,
}

/// OK packet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: u16,
    pub warnings: u16,
    pub info: String,
}

/// EOF packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EofPacket {
    pub warnings: u16,
    pub status_flags: u16,
}

/// Column definition (protocol 4.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub collation: u16,
    pub column_length: u32,
    pub column_type: ColumnType,
    pub flags: u16,
    pub decimals: u8,
}

/// One result set row.
///
/// Each value holds the column's raw bytes: the length-encoded body for text rows,
/// and for binary rows the fixed-width or length-prefixed body without its prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// Encoding the values are in
    pub format: Format,
    /// Column values, `None` for SQL NULL
    pub values: Vec<Option<Bytes>>,
}

/// COM_STMT_PREPARE OK header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOk {
    /// Server-assigned statement handle
    pub statement_id: u32,
    /// Column definitions that follow
    pub num_columns: u16,
    /// Parameter definitions that follow
    pub num_params: u16,
    /// Warnings raised while preparing
    pub warnings: u16,
}

/// Auth switch request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSwitchRequest {
    /// Plugin to switch to
    pub plugin: String,
    /// New salt, trailing NUL removed
    pub data: Bytes,
}
