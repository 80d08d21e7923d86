//! Error types for mysql-wire

use std::io;
use thiserror::Error;

/// Main error type for mysql-wire operations
#[derive(Debug, Error)]
pub enum Error {
    /// Transport I/O error
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Malformed framing, desynchronized sequence ids or undecodable messages.
    ///
    /// Always fatal: the connection is closed and never reused.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Error packet sent by the server, surfaced verbatim
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Authentication failed (unsupported plugin, missing password, insecure transport)
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Invalid configuration or configuration the server cannot satisfy
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Connection was closed before the request completed
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation attempted in the wrong connection state
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Value conversion failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Caller-side timeout elapsed
    #[error("operation timed out")]
    Timeout,
}

impl Error {
    /// Whether the error ends the connection.
    ///
    /// Server and codec errors are scoped to one request or value; everything
    /// else leaves the connection unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Server(_) | Error::Codec(_) | Error::Timeout)
    }

    /// Short variant name for metric labels
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Protocol(_) => "protocol",
            Error::Server(_) => "server_error",
            Error::Authentication(_) => "authentication",
            Error::Config(_) => "config",
            Error::ConnectionClosed => "connection_closed",
            Error::InvalidState { .. } => "invalid_state",
            Error::Codec(_) => "codec",
            Error::Timeout => "timeout",
        }
    }

    /// Server error code, if this is a server error
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Error::Server(err) => Some(err.code),
            _ => None,
        }
    }
}

/// Error packet contents, kept exactly as the server sent them
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("server error {code} ({sql_state}): {message}")]
pub struct ServerError {
    /// MySQL error code
    pub code: u16,
    /// Five character SQL state (`HY000` when the server omits it)
    pub sql_state: String,
    /// Human readable message
    pub message: String,
}

/// Value conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// No codec registered for the column type / host type pair
    #[error("no codec for {column} as {host}")]
    Unsupported {
        /// Wire column type
        column: String,
        /// Requested host type
        host: String,
    },

    /// Value does not fit the requested host type
    #[error("value {value} out of range for {host}")]
    OutOfRange {
        /// Textual form of the value
        value: String,
        /// Requested host type
        host: String,
    },

    /// Wire bytes could not be interpreted
    #[error("malformed {kind} value: {detail}")]
    Malformed {
        /// What was being parsed
        kind: &'static str,
        /// Offending input or reason
        detail: String,
    },

    /// NULL decoded into a non-optional host type
    #[error("unexpected NULL for {0}")]
    UnexpectedNull(String),

    /// All-zero date with `ZeroDateOption::Exception`
    #[error("zero date value cannot be represented")]
    ZeroDate,
}

impl CodecError {
    pub(crate) fn malformed(kind: &'static str, detail: impl Into<String>) -> Self {
        CodecError::Malformed {
            kind,
            detail: detail.into(),
        }
    }
}

/// Result type alias for mysql-wire operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::ConnectionClosed.is_fatal());
        assert!(Error::Protocol("bad".into()).is_fatal());
        assert!(Error::Authentication("denied".into()).is_fatal());
        assert!(!Error::Timeout.is_fatal());

        let server = Error::Server(ServerError {
            code: 1064,
            sql_state: "42000".into(),
            message: "syntax".into(),
        });
        assert!(!server.is_fatal());
        assert_eq!(server.server_code(), Some(1064));
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError {
            code: 1045,
            sql_state: "28000".into(),
            message: "Access denied for user 'root'".into(),
        };
        assert_eq!(
            err.to_string(),
            "server error 1045 (28000): Access denied for user 'root'"
        );
    }

    #[test]
    fn test_codec_error_converts() {
        let err: Error = CodecError::ZeroDate.into();
        assert!(matches!(err, Error::Codec(CodecError::ZeroDate)));
        assert!(!err.is_fatal());
    }
}
