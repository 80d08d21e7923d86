//! MySQL client/server protocol
//!
//! This module handles:
//! * Packet framing and compression envelopes
//! * Message encoding (client → server)
//! * Phase-aware message decoding (server → client)

pub mod compression;
pub mod constants;
pub mod decode;
pub mod encode;
pub mod envelope;
pub mod message;
pub mod types;
pub mod wire;

pub use compression::{CompressionAlgorithm, Compressor};
pub use decode::{decode_message, Phase};
pub use encode::{encode_message, encode_message_with};
pub use envelope::PacketCodec;
pub use message::{
    AuthSwitchRequest, BackendMessage, ColumnDefinition, EofPacket, FrontendMessage, Handshake,
    HandshakeResponse, HandshakeV10, HandshakeV9, OkPacket, PrepareOk, Row, SslRequest,
};
pub use types::{column_flags, ColumnType, Format};
