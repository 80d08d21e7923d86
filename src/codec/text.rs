//! String, byte and JSON codecs

use super::groups::{ALL_FORMATS, DECIMALS, FLOATS, INTEGERS, STRINGS, TEMPORAL};
use super::numeric::{binary_float, binary_int};
use super::{CodecContext, CodecRegistry, ColumnMeta, HostType, Value};
use crate::error::CodecError;
use crate::protocol::wire::put_lenenc_bytes;
use crate::protocol::{ColumnType, Format};
use bytes::{Bytes, BytesMut};

pub(super) fn register(registry: &mut CodecRegistry) {
    let opaque = [STRINGS, DECIMALS, &[ColumnType::Json, ColumnType::Bit, ColumnType::Geometry, ColumnType::Vector][..]].concat();
    let textual = [INTEGERS, FLOATS, TEMPORAL, &opaque[..], &[ColumnType::Time][..]].concat();

    registry.add_decoder(&textual, HostType::String, &[Format::Text], decode_string);
    registry.add_decoder(&[STRINGS, DECIMALS, &[ColumnType::Json][..]].concat(), HostType::String, &[Format::Binary], decode_string);
    registry.add_decoder(INTEGERS, HostType::String, &[Format::Binary], decode_binary_int_string);
    registry.add_decoder(FLOATS, HostType::String, &[Format::Binary], decode_binary_float_string);

    registry.add_decoder(&textual, HostType::Bytes, &[Format::Text], decode_bytes);
    registry.add_decoder(&opaque, HostType::Bytes, &[Format::Binary], decode_bytes);

    registry.add_decoder(&[STRINGS, &[ColumnType::Json][..]].concat(), HostType::Json, ALL_FORMATS, decode_json);

    let string_targets = [STRINGS, DECIMALS, &[ColumnType::Json][..]].concat();
    registry.add_encoder(HostType::String, &string_targets, Format::Binary, encode_lenenc);
    registry.add_encoder(HostType::String, &string_targets, Format::Text, encode_quoted);
    registry.add_encoder(HostType::Json, &string_targets, Format::Binary, encode_lenenc);
    registry.add_encoder(HostType::Json, &string_targets, Format::Text, encode_quoted);

    let byte_targets = [STRINGS, &[ColumnType::Geometry, ColumnType::Bit][..]].concat();
    registry.add_encoder(HostType::Bytes, &byte_targets, Format::Binary, encode_lenenc);
    registry.add_encoder(HostType::Bytes, &byte_targets, Format::Text, encode_hex);
}

fn decode_string(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    std::str::from_utf8(raw)
        .map(|s| Value::Text(s.to_string()))
        .map_err(|e| CodecError::malformed("string", e.to_string()))
}

fn decode_binary_int_string(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    Ok(Value::Text(binary_int(raw, meta)?.to_string()))
}

fn decode_binary_float_string(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    let d = binary_float(raw, meta)?;
    let text = if meta.column_type == ColumnType::Float {
        (d as f32).to_string()
    } else {
        d.to_string()
    };
    Ok(Value::Text(text))
}

fn decode_bytes(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    Ok(Value::Bytes(Bytes::copy_from_slice(raw)))
}

fn decode_json(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    serde_json::from_slice(raw)
        .map(Value::Json)
        .map_err(|e| CodecError::malformed("json", e.to_string()))
}

fn payload(value: &Value) -> Result<std::borrow::Cow<'_, [u8]>, CodecError> {
    match value {
        Value::Text(s) => Ok(s.as_bytes().into()),
        Value::Bytes(b) => Ok(b[..].into()),
        Value::Json(j) => Ok(j.to_string().into_bytes().into()),
        other => Err(CodecError::malformed("string", format!("{:?}", other))),
    }
}

fn encode_lenenc(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    let data = payload(value)?;
    let mut buf = BytesMut::with_capacity(data.len() + 9);
    put_lenenc_bytes(&mut buf, &data);
    Ok(buf.freeze())
}

/// Single-quoted literal with MySQL escapes
fn encode_quoted(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    let data = payload(value)?;
    let s = std::str::from_utf8(&data).map_err(|e| CodecError::malformed("string", e.to_string()))?;
    Ok(Bytes::from(quote(s)))
}

pub(super) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

fn encode_hex(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    let data = payload(value)?;
    let mut out = String::with_capacity(data.len() * 2 + 3);
    out.push_str("X'");
    for byte in data.iter() {
        out.push_str(&format!("{:02X}", byte));
    }
    out.push('\'');
    Ok(Bytes::from(out))
}
