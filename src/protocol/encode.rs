//! Protocol message encoding
//!
//! Produces payloads only; framing and sequence ids belong to the envelope codec.

use super::constants::{capabilities, commands};
use super::message::{FrontendMessage, HandshakeResponse, SslRequest};
use super::wire::{put_lenenc_bytes, put_lenenc_int, put_null_terminated};
use crate::codec::{encode_binary_param_with, CodecContext, Value};
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};

/// Encode a frontend message into a payload with default codec settings
pub fn encode_message(msg: &FrontendMessage) -> Result<BytesMut> {
    encode_message_with(msg, &CodecContext::default())
}

/// Encode a frontend message; statement parameters follow the connection's time zone
pub fn encode_message_with(msg: &FrontendMessage, ctx: &CodecContext) -> Result<BytesMut> {
    let mut buf = BytesMut::new();

    match msg {
        FrontendMessage::SslRequest(req) => encode_ssl_request(&mut buf, req),
        FrontendMessage::HandshakeResponse(resp) => encode_handshake_response(&mut buf, resp)?,
        FrontendMessage::AuthResponse(data) => buf.put_slice(data),
        FrontendMessage::Query(sql) => encode_command(&mut buf, commands::COM_QUERY, sql.as_bytes()),
        FrontendMessage::InitDb(db) => encode_command(&mut buf, commands::COM_INIT_DB, db.as_bytes()),
        FrontendMessage::Ping => buf.put_u8(commands::COM_PING),
        FrontendMessage::Quit => buf.put_u8(commands::COM_QUIT),
        FrontendMessage::ResetConnection => buf.put_u8(commands::COM_RESET_CONNECTION),
        FrontendMessage::StmtPrepare(sql) => {
            encode_command(&mut buf, commands::COM_STMT_PREPARE, sql.as_bytes())
        }
        FrontendMessage::StmtExecute {
            statement_id,
            params,
        } => encode_stmt_execute(&mut buf, *statement_id, params, ctx)?,
        FrontendMessage::StmtClose(id) => {
            buf.put_u8(commands::COM_STMT_CLOSE);
            buf.put_u32_le(*id);
        }
        FrontendMessage::StmtReset(id) => {
            buf.put_u8(commands::COM_STMT_RESET);
            buf.put_u32_le(*id);
        }
    }

    Ok(buf)
}

fn encode_command(buf: &mut BytesMut, command: u8, body: &[u8]) {
    buf.reserve(1 + body.len());
    buf.put_u8(command);
    buf.put_slice(body);
}

fn put_prefix(buf: &mut BytesMut, caps: u32, max_packet_size: u32, collation: u8) {
    buf.put_u32_le(caps);
    buf.put_u32_le(max_packet_size);
    buf.put_u8(collation);
    buf.put_bytes(0, 23);
}

fn encode_ssl_request(buf: &mut BytesMut, req: &SslRequest) {
    put_prefix(buf, req.capabilities, req.max_packet_size, req.collation);
}

fn encode_handshake_response(buf: &mut BytesMut, resp: &HandshakeResponse) -> Result<()> {
    let caps = resp.capabilities;
    put_prefix(buf, caps, resp.max_packet_size, resp.collation);
    put_null_terminated(buf, resp.username.as_bytes());

    if caps & capabilities::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
        put_lenenc_bytes(buf, &resp.auth_response);
    } else if caps & capabilities::CLIENT_SECURE_CONNECTION != 0 {
        let len = u8::try_from(resp.auth_response.len()).map_err(|_| {
            Error::Authentication(format!(
                "auth response of {} bytes needs CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA",
                resp.auth_response.len()
            ))
        })?;
        buf.put_u8(len);
        buf.put_slice(&resp.auth_response);
    } else {
        put_null_terminated(buf, &resp.auth_response);
    }

    if caps & capabilities::CLIENT_CONNECT_WITH_DB != 0 {
        put_null_terminated(buf, resp.database.as_deref().unwrap_or_default().as_bytes());
    }

    if caps & capabilities::CLIENT_PLUGIN_AUTH != 0 {
        put_null_terminated(buf, resp.auth_plugin.as_bytes());
    }

    if caps & capabilities::CLIENT_CONNECT_ATTRS != 0 {
        let mut attrs = BytesMut::new();
        for (key, value) in &resp.attributes {
            put_lenenc_bytes(&mut attrs, key.as_bytes());
            put_lenenc_bytes(&mut attrs, value.as_bytes());
        }
        put_lenenc_int(buf, attrs.len() as u64);
        buf.put_slice(&attrs);
    }

    if caps & capabilities::CLIENT_ZSTD_COMPRESSION_ALGORITHM != 0 {
        buf.put_u8(resp.zstd_level.unwrap_or(3));
    }

    Ok(())
}

fn encode_stmt_execute(buf: &mut BytesMut, statement_id: u32, params: &[Value], ctx: &CodecContext) -> Result<()> {
    buf.put_u8(commands::COM_STMT_EXECUTE);
    buf.put_u32_le(statement_id);
    // CURSOR_TYPE_NO_CURSOR
    buf.put_u8(0);
    // iteration count
    buf.put_u32_le(1);

    if params.is_empty() {
        return Ok(());
    }

    let encoded = params
        .iter()
        .map(|value| encode_binary_param_with(value, ctx))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut bitmap = vec![0u8; (params.len() + 7) / 8];
    for (i, param) in encoded.iter().enumerate() {
        if param.data.is_none() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    buf.put_slice(&bitmap);

    // new params bound
    buf.put_u8(1);
    for param in &encoded {
        buf.put_u8(param.column_type.as_u8());
        buf.put_u8(if param.unsigned { 0x80 } else { 0x00 });
    }
    for data in encoded.iter().filter_map(|p| p.data.as_ref()) {
        buf.put_slice(data);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn response(caps: u32) -> HandshakeResponse {
        HandshakeResponse {
            capabilities: caps,
            max_packet_size: 16 * 1024 * 1024,
            collation: 255,
            username: "app".into(),
            auth_response: Bytes::from_static(&[1, 2, 3]),
            database: Some("shop".into()),
            auth_plugin: "mysql_native_password".into(),
            attributes: vec![("_client_name".into(), "mysql-wire".into())],
            zstd_level: Some(7),
        }
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(&encode_message(&FrontendMessage::Ping).unwrap()[..], &[0x0E]);
        assert_eq!(&encode_message(&FrontendMessage::Quit).unwrap()[..], &[0x01]);
        assert_eq!(
            &encode_message(&FrontendMessage::Query("SELECT 1".into())).unwrap()[..],
            b"\x03SELECT 1"
        );
        assert_eq!(
            &encode_message(&FrontendMessage::StmtClose(5)).unwrap()[..],
            &[0x19, 5, 0, 0, 0]
        );
    }

    #[test]
    fn test_ssl_request_is_32_bytes() {
        let buf = encode_message(&FrontendMessage::SslRequest(SslRequest {
            capabilities: capabilities::CLIENT_SSL | capabilities::CLIENT_PROTOCOL_41,
            max_packet_size: 1,
            collation: 45,
        }))
        .unwrap();
        assert_eq!(buf.len(), 32);
        assert_eq!(&buf[..4], &(capabilities::CLIENT_SSL | capabilities::CLIENT_PROTOCOL_41).to_le_bytes());
        assert_eq!(buf[8], 45);
        assert!(buf[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_handshake_response_prefix_matches_ssl_request() {
        let caps = capabilities::CLIENT_PROTOCOL_41 | capabilities::CLIENT_SSL;
        let resp = encode_message(&FrontendMessage::HandshakeResponse(response(caps))).unwrap();
        let ssl = encode_message(&FrontendMessage::SslRequest(SslRequest {
            capabilities: caps,
            max_packet_size: 16 * 1024 * 1024,
            collation: 255,
        }))
        .unwrap();
        assert_eq!(&resp[..32], &ssl[..]);
    }

    #[test]
    fn test_handshake_response_optional_fields() {
        let caps = capabilities::CLIENT_PROTOCOL_41
            | capabilities::CLIENT_SECURE_CONNECTION
            | capabilities::CLIENT_CONNECT_WITH_DB
            | capabilities::CLIENT_PLUGIN_AUTH;
        let buf = encode_message(&FrontendMessage::HandshakeResponse(response(caps))).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(b"app\0");
        expected.extend_from_slice(&[3, 1, 2, 3]);
        expected.extend_from_slice(b"shop\0");
        expected.extend_from_slice(b"mysql_native_password\0");
        assert_eq!(&buf[32..], &expected[..]);
    }

    #[test]
    fn test_handshake_response_attrs_and_zstd() {
        let caps = capabilities::CLIENT_PROTOCOL_41
            | capabilities::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
            | capabilities::CLIENT_CONNECT_ATTRS
            | capabilities::CLIENT_ZSTD_COMPRESSION_ALGORITHM;
        let buf = encode_message(&FrontendMessage::HandshakeResponse(response(caps))).unwrap();
        let tail = &buf[32..];
        assert_eq!(&tail[..4], b"app\0");
        assert_eq!(&tail[4..8], &[3, 1, 2, 3]);
        // attributes: total length, then key/value lenenc strings
        assert_eq!(tail[8] as usize, 1 + 12 + 1 + 10);
        assert_eq!(&tail[9..22], b"\x0c_client_name");
        assert_eq!(*tail.last().unwrap(), 7);
    }

    #[test]
    fn test_stmt_execute_params() {
        let buf = encode_message(&FrontendMessage::StmtExecute {
            statement_id: 1,
            params: vec![Value::Int(-2), Value::Null, Value::Text("hi".into())],
        })
        .unwrap();

        let mut expected = vec![0x17, 1, 0, 0, 0, 0, 1, 0, 0, 0];
        expected.push(0b010);
        expected.push(1);
        expected.extend_from_slice(&[0x08, 0x00, 0x06, 0x00, 0xFD, 0x00]);
        expected.extend_from_slice(&(-2i64).to_le_bytes());
        expected.extend_from_slice(&[2, b'h', b'i']);
        assert_eq!(&buf[..], &expected[..]);
    }

    #[test]
    fn test_stmt_execute_timestamp_in_connection_time_zone() {
        use crate::codec::ConnectionTimeZone;
        use chrono::{TimeZone, Utc};

        let msg = FrontendMessage::StmtExecute {
            statement_id: 1,
            params: vec![Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())],
        };
        let ctx = CodecContext {
            time_zone: ConnectionTimeZone::Fixed(2 * 3600),
            ..CodecContext::default()
        };

        let buf = encode_message_with(&msg, &ctx).unwrap();
        assert_eq!(&buf[14..], &[7, 0xE8, 0x07, 1, 2, 5, 4, 5]);

        let buf = encode_message_with(&msg, &CodecContext { time_zone: ConnectionTimeZone::Utc, ..ctx }).unwrap();
        assert_eq!(buf[19], 3);
    }
}
