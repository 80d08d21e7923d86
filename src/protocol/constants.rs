//! MySQL protocol constants

/// Largest payload a single packet can carry (2^24 - 1)
pub const MAX_PAYLOAD_LEN: usize = 0x00FF_FFFF;

/// Packet header length (3-byte length + sequence id)
pub const HEADER_LEN: usize = 4;

/// Compressed envelope header length (3-byte compressed length + sequence id + 3-byte length)
pub const COMPRESSED_HEADER_LEN: usize = 7;

/// Payloads shorter than this are sent stored (uncompressed) inside the compressed envelope
pub const MIN_COMPRESS_LENGTH: usize = 50;

/// Default `max_packet_size` announced in the handshake response (16 MiB)
pub const DEFAULT_MAX_PACKET_SIZE: u32 = 16 * 1024 * 1024;

/// Capability flags
pub mod capabilities {
    /// Use the improved version of old password authentication
    pub const CLIENT_LONG_PASSWORD: u32 = 1;
    /// Send found rows instead of affected rows
    pub const CLIENT_FOUND_ROWS: u32 = 1 << 1;
    /// Get all column flags
    pub const CLIENT_LONG_FLAG: u32 = 1 << 2;
    /// Database name can be specified on connect
    pub const CLIENT_CONNECT_WITH_DB: u32 = 1 << 3;
    /// Compressed protocol (zlib)
    pub const CLIENT_COMPRESS: u32 = 1 << 5;
    /// LOAD DATA LOCAL INFILE
    pub const CLIENT_LOCAL_FILES: u32 = 1 << 7;
    /// 4.1 protocol
    pub const CLIENT_PROTOCOL_41: u32 = 1 << 9;
    /// Interactive client
    pub const CLIENT_INTERACTIVE: u32 = 1 << 10;
    /// Switch to SSL after the SSL request packet
    pub const CLIENT_SSL: u32 = 1 << 11;
    /// Transaction status flags in OK/EOF
    pub const CLIENT_TRANSACTIONS: u32 = 1 << 13;
    /// 4.1 authentication
    pub const CLIENT_SECURE_CONNECTION: u32 = 1 << 15;
    /// Multiple statements per COM_QUERY
    pub const CLIENT_MULTI_STATEMENTS: u32 = 1 << 16;
    /// Multiple result sets
    pub const CLIENT_MULTI_RESULTS: u32 = 1 << 17;
    /// Multiple result sets from prepared statements
    pub const CLIENT_PS_MULTI_RESULTS: u32 = 1 << 18;
    /// Pluggable authentication
    pub const CLIENT_PLUGIN_AUTH: u32 = 1 << 19;
    /// Connection attributes in the handshake response
    pub const CLIENT_CONNECT_ATTRS: u32 = 1 << 20;
    /// Length-encoded auth response
    pub const CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 1 << 21;
    /// Session state change information in OK packets
    pub const CLIENT_SESSION_TRACK: u32 = 1 << 23;
    /// OK packets replace EOF packets
    pub const CLIENT_DEPRECATE_EOF: u32 = 1 << 24;
    /// zstd compressed protocol
    pub const CLIENT_ZSTD_COMPRESSION_ALGORITHM: u32 = 1 << 26;

    /// Capabilities this client is able to use; the negotiated set never exceeds it
    pub const CLIENT_SUPPORTED: u32 = CLIENT_LONG_PASSWORD
        | CLIENT_FOUND_ROWS
        | CLIENT_LONG_FLAG
        | CLIENT_CONNECT_WITH_DB
        | CLIENT_COMPRESS
        | CLIENT_LOCAL_FILES
        | CLIENT_PROTOCOL_41
        | CLIENT_INTERACTIVE
        | CLIENT_SSL
        | CLIENT_TRANSACTIONS
        | CLIENT_SECURE_CONNECTION
        | CLIENT_MULTI_STATEMENTS
        | CLIENT_MULTI_RESULTS
        | CLIENT_PS_MULTI_RESULTS
        | CLIENT_PLUGIN_AUTH
        | CLIENT_CONNECT_ATTRS
        | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
        | CLIENT_DEPRECATE_EOF
        | CLIENT_ZSTD_COMPRESSION_ALGORITHM;

    /// Capabilities the server must advertise
    pub const CLIENT_REQUIRED: u32 = CLIENT_PROTOCOL_41;
}

/// Command bytes
pub mod commands {
    /// COM_QUIT
    pub const COM_QUIT: u8 = 0x01;
    /// COM_INIT_DB
    pub const COM_INIT_DB: u8 = 0x02;
    /// COM_QUERY
    pub const COM_QUERY: u8 = 0x03;
    /// COM_PING
    pub const COM_PING: u8 = 0x0E;
    /// COM_STMT_PREPARE
    pub const COM_STMT_PREPARE: u8 = 0x16;
    /// COM_STMT_EXECUTE
    pub const COM_STMT_EXECUTE: u8 = 0x17;
    /// COM_STMT_CLOSE
    pub const COM_STMT_CLOSE: u8 = 0x19;
    /// COM_STMT_RESET
    pub const COM_STMT_RESET: u8 = 0x1A;
    /// COM_RESET_CONNECTION
    pub const COM_RESET_CONNECTION: u8 = 0x1F;
}

/// Leading payload bytes
pub mod markers {
    /// OK packet / binary row header
    pub const OK: u8 = 0x00;
    /// Auth more data
    pub const AUTH_MORE_DATA: u8 = 0x01;
    /// NULL column value in a text row
    pub const NULL_VALUE: u8 = 0xFB;
    /// Local infile request (command phase)
    pub const LOCAL_INFILE: u8 = 0xFB;
    /// EOF packet / auth switch request
    pub const EOF: u8 = 0xFE;
    /// Error packet
    pub const ERR: u8 = 0xFF;
}

/// Server status flags carried by OK and EOF packets
pub mod server_status {
    /// A transaction is active
    pub const SERVER_STATUS_IN_TRANS: u16 = 0x0001;
    /// Autocommit mode is on
    pub const SERVER_STATUS_AUTOCOMMIT: u16 = 0x0002;
    /// Another result set follows
    pub const SERVER_MORE_RESULTS_EXISTS: u16 = 0x0008;
    /// Cursor exists for the executed statement
    pub const SERVER_STATUS_CURSOR_EXISTS: u16 = 0x0040;
    /// Last row of a cursor was sent
    pub const SERVER_STATUS_LAST_ROW_SENT: u16 = 0x0080;
}

/// Collation ids
pub mod collations {
    /// utf8mb4_general_ci
    pub const UTF8MB4_GENERAL_CI: u8 = 45;
    /// utf8mb4_0900_ai_ci (MySQL 8.0.1+)
    pub const UTF8MB4_0900_AI_CI: u8 = 255;
    /// binary
    pub const BINARY: u16 = 63;
}

/// caching_sha2_password / sha256_password continuation bytes
pub mod auth_more {
    /// Client asks sha256_password for the server public key
    pub const SHA256_REQUEST_PUBLIC_KEY: u8 = 0x01;
    /// Client asks caching_sha2_password for the server public key
    pub const REQUEST_PUBLIC_KEY: u8 = 0x02;
    /// Scramble matched the server cache
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;
    /// Server needs the password itself
    pub const PERFORM_FULL_AUTH: u8 = 0x04;
}
