//! Boolean codec
//!
//! Decoding accepts integer, floating point, decimal, string and BIT columns:
//! * `true`/`yes`/`t`/`y` and `false`/`no`/`f`/`n`, case-insensitive
//! * numbers are true when they equal -1 or are greater than zero
//! * empty text is false
//!
//! Anything else is a conversion error.

use super::groups::{ALL_FORMATS, DECIMALS, FLOATS, INTEGERS, STRINGS};
use super::numeric::{binary_float, binary_int};
use super::{CodecContext, CodecRegistry, ColumnMeta, HostType, Value};
use crate::error::CodecError;
use crate::protocol::{ColumnType, Format};
use bytes::Bytes;

pub(super) fn register(registry: &mut CodecRegistry) {
    let textual: Vec<ColumnType> = [INTEGERS, FLOATS, DECIMALS, STRINGS, &[ColumnType::Json][..]].concat();
    registry.add_decoder(&textual, HostType::Bool, &[Format::Text], decode_text);
    registry.add_decoder(&[DECIMALS, STRINGS].concat(), HostType::Bool, &[Format::Binary], decode_text);
    registry.add_decoder(INTEGERS, HostType::Bool, &[Format::Binary], decode_binary_int);
    registry.add_decoder(FLOATS, HostType::Bool, &[Format::Binary], decode_binary_float);
    registry.add_decoder(&[ColumnType::Bit], HostType::Bool, ALL_FORMATS, decode_bit);

    registry.add_encoder(HostType::Bool, &[ColumnType::Tiny], Format::Binary, encode_binary);
    registry.add_encoder(HostType::Bool, &[ColumnType::Tiny], Format::Text, encode_text);
}

/// Interpret a textual value as a boolean
pub fn bool_from_str(s: &str) -> Result<bool, CodecError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(false);
    }

    for literal in ["true", "yes", "t", "y"] {
        if s.eq_ignore_ascii_case(literal) {
            return Ok(true);
        }
    }
    for literal in ["false", "no", "f", "n"] {
        if s.eq_ignore_ascii_case(literal) {
            return Ok(false);
        }
    }

    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(match s.parse::<i64>() {
            Ok(v) => v == -1 || v > 0,
            // Too wide for i64: only the sign matters
            Err(_) => !s.starts_with('-'),
        });
    }

    let numeric = digits.bytes().any(|b| b.is_ascii_digit())
        && s.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'));
    if numeric {
        if let Ok(d) = s.parse::<f64>() {
            return Ok(d == -1.0 || d > 0.0);
        }
    }

    Err(CodecError::malformed("boolean", s))
}

fn decode_text(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    let s = std::str::from_utf8(raw).map_err(|e| CodecError::malformed("boolean", e.to_string()))?;
    bool_from_str(s).map(Value::Bool)
}

fn decode_binary_int(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    let v = binary_int(raw, meta)?;
    Ok(Value::Bool(v == -1 || v > 0))
}

fn decode_binary_float(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    let d = binary_float(raw, meta)?;
    Ok(Value::Bool(d == -1.0 || d > 0.0))
}

fn decode_bit(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    Ok(Value::Bool(raw.iter().any(|&b| b != 0)))
}

fn encode_binary(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    match value {
        Value::Bool(b) => Ok(Bytes::copy_from_slice(&[u8::from(*b)])),
        other => Err(CodecError::malformed("boolean", format!("{:?}", other))),
    }
}

fn encode_text(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    match value {
        Value::Bool(true) => Ok(Bytes::from_static(b"1")),
        Value::Bool(false) => Ok(Bytes::from_static(b"0")),
        other => Err(CodecError::malformed("boolean", format!("{:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::registry;

    fn decode(raw: &[u8], column_type: ColumnType, format: Format) -> Result<Value, CodecError> {
        registry().decode(
            raw,
            &ColumnMeta::new(column_type),
            format,
            HostType::Bool,
            &CodecContext::default(),
        )
    }

    #[test]
    fn test_literals() {
        for (input, expected) in [
            ("true", true),
            ("TRUE", true),
            ("yes", true),
            ("Y", true),
            ("t", true),
            ("false", false),
            ("no", false),
            ("N", false),
            ("f", false),
            ("", false),
        ] {
            assert_eq!(bool_from_str(input).unwrap(), expected, "{:?}", input);
        }
    }

    #[test]
    fn test_numbers() {
        for (input, expected) in [
            ("1", true),
            ("0", false),
            ("-1", true),
            ("-57", false),
            ("100000", true),
            ("26.57", true),
            ("-0.5", false),
            ("0.0", false),
            ("1e3", true),
            ("-12345678901234567890", false),
            ("12345678901234567890", true),
        ] {
            assert_eq!(bool_from_str(input).unwrap(), expected, "{:?}", input);
        }
    }

    #[test]
    fn test_rejects_garbage() {
        for input in ["Banana", "inf", "NaN", "1.2.3", "-", "0x10"] {
            assert!(bool_from_str(input).is_err(), "{:?}", input);
        }
    }

    #[test]
    fn test_binary_sources() {
        assert_eq!(decode(&[1], ColumnType::Tiny, Format::Binary).unwrap(), Value::Bool(true));
        assert_eq!(decode(&[0], ColumnType::Tiny, Format::Binary).unwrap(), Value::Bool(false));
        assert_eq!(
            decode(&(-57i64).to_le_bytes(), ColumnType::LongLong, Format::Binary).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            decode(&26.57f64.to_le_bytes(), ColumnType::Double, Format::Binary).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(decode(&[0, 1], ColumnType::Bit, Format::Binary).unwrap(), Value::Bool(true));
        assert_eq!(decode(b"no", ColumnType::VarString, Format::Binary).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_unsigned_tiny_is_positive() {
        let meta = ColumnMeta::new(ColumnType::Tiny).unsigned();
        let v = registry()
            .decode(&[0xFF], &meta, Format::Binary, HostType::Bool, &CodecContext::default())
            .unwrap();
        assert_eq!(v, Value::Bool(true));
        // signed 0xFF is -1
        assert_eq!(decode(&[0xFF], ColumnType::Tiny, Format::Binary).unwrap(), Value::Bool(true));
        assert_eq!(decode(&[0xFE], ColumnType::Tiny, Format::Binary).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_date_is_not_boolean() {
        assert!(matches!(
            decode(b"2024-01-01", ColumnType::Date, Format::Text),
            Err(CodecError::Unsupported { .. })
        ));
    }
}
