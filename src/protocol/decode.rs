//! Protocol message decoding
//!
//! `decode_message` classifies one reassembled payload. It is a pure function of the
//! payload, the phase the exchange is in and the negotiated capabilities; the caller
//! owns and advances the phase.

use super::constants::{capabilities, markers, MAX_PAYLOAD_LEN};
use super::message::{
    AuthSwitchRequest, BackendMessage, ColumnDefinition, EofPacket, Handshake, HandshakeV10,
    HandshakeV9, OkPacket, PrepareOk, Row,
};
use super::types::{ColumnType, Format};
use super::wire::PacketReader;
use crate::error::ServerError;
use crate::{Error, Result};
use bytes::Bytes;
use std::io;
use std::sync::Arc;

/// Where in an exchange the next payload arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// First packet of the connection
    Greeting,
    /// Handshake response sent, awaiting OK / ERR / switch / more data
    Authentication,
    /// First packet of a command response
    CommandResponse,
    /// First packet of a COM_STMT_PREPARE response
    PrepareResponse,
    /// Column (or parameter) definitions, possibly closed by EOF
    ColumnDefinition,
    /// Text protocol rows
    TextRows {
        /// Columns per row
        columns: usize,
    },
    /// Binary protocol rows
    BinaryRows {
        /// Column types, in order
        columns: Arc<[ColumnType]>,
    },
}

/// Decode a backend message from a complete payload.
///
/// Malformed payloads are fatal `Error::Protocol`s; an ERR packet is returned as
/// `BackendMessage::Error`, never as `Err`.
pub fn decode_message(payload: &Bytes, phase: &Phase, capabilities: u32) -> Result<BackendMessage> {
    let Some(&first) = payload.first() else {
        return Err(Error::Protocol(format!("empty packet in {:?} phase", phase)));
    };

    let decoded = if first == markers::ERR {
        decode_error(payload)
    } else {
        match phase {
            Phase::Greeting => decode_handshake(payload),
            Phase::Authentication => decode_auth(payload),
            Phase::CommandResponse => decode_command_response(payload, capabilities),
            Phase::PrepareResponse => decode_prepare_ok(payload),
            Phase::ColumnDefinition => {
                if first == markers::EOF && payload.len() < 9 {
                    decode_eof(payload)
                } else {
                    decode_column_definition(payload)
                }
            }
            Phase::TextRows { columns } => match decode_terminator(payload, capabilities) {
                Some(result) => result,
                None => decode_text_row(payload, *columns),
            },
            Phase::BinaryRows { columns } => match decode_terminator(payload, capabilities) {
                Some(result) => result,
                None => decode_binary_row(payload, columns),
            },
        }
    };

    decoded.map_err(|e| {
        Error::Protocol(format!(
            "failed to decode packet (0x{:02X}, {} bytes) in {:?} phase: {}",
            first,
            payload.len(),
            phase,
            e
        ))
    })
}

/// Row-phase 0xFE disambiguation.
///
/// Without deprecate-EOF an EOF packet is shorter than 9 bytes. With it, the terminating
/// OK packet starts with 0xFE and is shorter than a maximum-size packet; a text row whose
/// first value has an 8-byte length prefix always fills a whole packet.
fn decode_terminator(payload: &Bytes, caps: u32) -> Option<io::Result<BackendMessage>> {
    if payload[0] != markers::EOF {
        return None;
    }
    if caps & capabilities::CLIENT_DEPRECATE_EOF == 0 {
        (payload.len() < 9).then(|| decode_eof(payload))
    } else {
        (payload.len() < MAX_PAYLOAD_LEN).then(|| decode_ok(payload))
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn decode_handshake(payload: &Bytes) -> io::Result<BackendMessage> {
    let mut r = PacketReader::new(payload);
    let protocol_version = r.read_u8("protocol version")?;
    match protocol_version {
        10 => decode_handshake_v10(&mut r).map(|h| BackendMessage::Handshake(Handshake::V10(h))),
        9 => {
            let server_version = lossy(r.read_null_terminated("server version")?);
            let connection_id = r.read_u32("connection id")?;
            let scramble = Bytes::copy_from_slice(r.read_null_terminated_lenient());
            Ok(BackendMessage::Handshake(Handshake::V9(HandshakeV9 {
                server_version,
                connection_id,
                scramble,
            })))
        }
        other => Err(invalid(format!("unsupported protocol version {}", other))),
    }
}

fn decode_handshake_v10(r: &mut PacketReader<'_>) -> io::Result<HandshakeV10> {
    let server_version = lossy(r.read_null_terminated("server version")?);
    let connection_id = r.read_u32("connection id")?;
    let mut auth_plugin_data = r.read_bytes(8, "auth plugin data part 1")?.to_vec();
    r.skip(1, "filler")?;
    let mut caps = u32::from(r.read_u16("capability flags")?);

    let mut collation = 0;
    let mut status_flags = 0;
    let mut auth_plugin_name = None;

    if !r.is_empty() {
        collation = r.read_u8("character set")?;
        status_flags = r.read_u16("status flags")?;
        caps |= u32::from(r.read_u16("capability flags (upper)")?) << 16;
        let auth_data_len = r.read_u8("auth plugin data length")?;
        r.skip(10, "reserved")?;

        if caps & capabilities::CLIENT_SECURE_CONNECTION != 0 {
            let part2_len = (usize::from(auth_data_len).saturating_sub(8)).max(13);
            let part2 = r.read_bytes(part2_len.min(r.remaining()), "auth plugin data part 2")?;
            auth_plugin_data.extend_from_slice(part2);
        }

        if caps & capabilities::CLIENT_PLUGIN_AUTH != 0 {
            let name = lossy(r.read_null_terminated_lenient());
            auth_plugin_name = (!name.is_empty()).then_some(name);
        }
    }

    if auth_plugin_data.last() == Some(&0) {
        auth_plugin_data.pop();
    }

    Ok(HandshakeV10 {
        server_version,
        connection_id,
        auth_plugin_data: Bytes::from(auth_plugin_data),
        capabilities: caps,
        collation,
        status_flags,
        auth_plugin_name,
    })
}

fn decode_auth(payload: &Bytes) -> io::Result<BackendMessage> {
    match payload[0] {
        markers::OK => decode_ok(payload),
        markers::EOF => {
            let mut r = PacketReader::new(&payload[1..]);
            if r.is_empty() {
                // Pre-4.1 switch to mysql_old_password carries no plugin name
                return Ok(BackendMessage::AuthSwitchRequest(AuthSwitchRequest {
                    plugin: "mysql_old_password".to_string(),
                    data: Bytes::new(),
                }));
            }
            let plugin = lossy(r.read_null_terminated_lenient());
            let mut data = r.read_rest();
            if data.last() == Some(&0) {
                data = &data[..data.len() - 1];
            }
            Ok(BackendMessage::AuthSwitchRequest(AuthSwitchRequest {
                plugin,
                data: payload.slice_ref(data),
            }))
        }
        markers::AUTH_MORE_DATA => Ok(BackendMessage::AuthMoreData(payload.slice(1..))),
        other => Err(invalid(format!(
            "unexpected packet 0x{:02X} during authentication",
            other
        ))),
    }
}

fn decode_command_response(payload: &Bytes, caps: u32) -> io::Result<BackendMessage> {
    match payload[0] {
        markers::OK => decode_ok(payload),
        markers::LOCAL_INFILE => Ok(BackendMessage::LocalInfileRequest(lossy(&payload[1..]))),
        markers::EOF if payload.len() < 9 && caps & capabilities::CLIENT_DEPRECATE_EOF == 0 => {
            decode_eof(payload)
        }
        _ => {
            let mut r = PacketReader::new(payload);
            let count = r.read_lenenc_u64("column count")?;
            if count == 0 {
                return Err(invalid("zero column count"));
            }
            Ok(BackendMessage::ColumnCount(count))
        }
    }
}

fn decode_ok(payload: &Bytes) -> io::Result<BackendMessage> {
    let mut r = PacketReader::new(&payload[1..]);
    let affected_rows = r.read_lenenc_u64("affected rows")?;
    let last_insert_id = r.read_lenenc_u64("last insert id")?;
    let status_flags = if r.remaining() >= 2 { r.read_u16("status flags")? } else { 0 };
    let warnings = if r.remaining() >= 2 { r.read_u16("warnings")? } else { 0 };
    let info = lossy(r.read_rest());

    Ok(BackendMessage::Ok(OkPacket {
        affected_rows,
        last_insert_id,
        status_flags,
        warnings,
        info,
    }))
}

fn decode_eof(payload: &Bytes) -> io::Result<BackendMessage> {
    let mut r = PacketReader::new(&payload[1..]);
    let (warnings, status_flags) = if r.remaining() >= 4 {
        (r.read_u16("warnings")?, r.read_u16("status flags")?)
    } else {
        (0, 0)
    };
    Ok(BackendMessage::Eof(EofPacket {
        warnings,
        status_flags,
    }))
}

fn decode_error(payload: &Bytes) -> io::Result<BackendMessage> {
    let mut r = PacketReader::new(&payload[1..]);
    let code = r.read_u16("error code")?;
    let sql_state = if r.peek() == Some(b'#') {
        r.skip(1, "sql state marker")?;
        lossy(r.read_bytes(5, "sql state")?)
    } else {
        "HY000".to_string()
    };
    let message = lossy(r.read_rest());
    Ok(BackendMessage::Error(ServerError {
        code,
        sql_state,
        message,
    }))
}

fn decode_prepare_ok(payload: &Bytes) -> io::Result<BackendMessage> {
    if payload[0] != markers::OK {
        return Err(invalid(format!(
            "expected prepare OK, got 0x{:02X}",
            payload[0]
        )));
    }
    let mut r = PacketReader::new(&payload[1..]);
    let statement_id = r.read_u32("statement id")?;
    let num_columns = r.read_u16("column count")?;
    let num_params = r.read_u16("parameter count")?;
    r.skip(1, "reserved")?;
    let warnings = if r.remaining() >= 2 { r.read_u16("warnings")? } else { 0 };

    Ok(BackendMessage::PrepareOk(PrepareOk {
        statement_id,
        num_columns,
        num_params,
        warnings,
    }))
}

fn decode_column_definition(payload: &Bytes) -> io::Result<BackendMessage> {
    let mut r = PacketReader::new(payload);
    r.read_lenenc_bytes("catalog")?;
    let schema = r.read_lenenc_string("schema")?;
    let table = r.read_lenenc_string("table")?;
    let org_table = r.read_lenenc_string("org table")?;
    let name = r.read_lenenc_string("name")?;
    let org_name = r.read_lenenc_string("org name")?;
    let fixed_len = r.read_lenenc_u64("fixed length fields")?;
    if fixed_len < 0x0C {
        return Err(invalid(format!("column definition fixed length {}", fixed_len)));
    }
    let collation = r.read_u16("collation")?;
    let column_length = r.read_u32("column length")?;
    let column_type = ColumnType::from_u8(r.read_u8("column type")?);
    let flags = r.read_u16("flags")?;
    let decimals = r.read_u8("decimals")?;

    Ok(BackendMessage::ColumnDefinition(ColumnDefinition {
        schema,
        table,
        org_table,
        name,
        org_name,
        collation,
        column_length,
        column_type,
        flags,
        decimals,
    }))
}

fn decode_text_row(payload: &Bytes, columns: usize) -> io::Result<BackendMessage> {
    let mut r = PacketReader::new(payload);
    let mut values = Vec::with_capacity(columns);
    for _ in 0..columns {
        let value = r.read_lenenc_bytes("text row value")?;
        values.push(value.map(|v| payload.slice_ref(v)));
    }
    if !r.is_empty() {
        return Err(invalid(format!(
            "{} trailing bytes after {} text row values",
            r.remaining(),
            columns
        )));
    }
    Ok(BackendMessage::Row(Row {
        format: Format::Text,
        values,
    }))
}

fn decode_binary_row(payload: &Bytes, columns: &[ColumnType]) -> io::Result<BackendMessage> {
    let mut r = PacketReader::new(payload);
    let header = r.read_u8("binary row header")?;
    if header != markers::OK {
        return Err(invalid(format!("binary row header 0x{:02X}", header)));
    }
    // NULL bitmap has a two bit offset in result rows
    let bitmap = r.read_bytes((columns.len() + 7 + 2) / 8, "null bitmap")?;

    let mut values = Vec::with_capacity(columns.len());
    for (i, column_type) in columns.iter().enumerate() {
        let bit = i + 2;
        if bitmap[bit / 8] & (1 << (bit % 8)) != 0 {
            values.push(None);
            continue;
        }
        let value = match column_type.binary_width() {
            Some(width) => r.read_bytes(width, "binary value")?,
            None if column_type.is_temporal() => {
                let len = r.read_u8("temporal length")?;
                r.read_bytes(usize::from(len), "temporal value")?
            }
            None => r
                .read_lenenc_bytes("binary value")?
                .ok_or_else(|| invalid("NULL marker inside binary row"))?,
        };
        values.push(Some(payload.slice_ref(value)));
    }

    Ok(BackendMessage::Row(Row {
        format: Format::Binary,
        values,
    }))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
