//! Integer and floating point codecs

use super::groups::{ALL_FORMATS, DECIMALS, FLOATS, INTEGERS, STRINGS};
use super::{CodecContext, CodecRegistry, ColumnMeta, HostType, Value};
use crate::error::CodecError;
use crate::protocol::{ColumnType, Format};
use bytes::Bytes;

pub(super) fn register(registry: &mut CodecRegistry) {
    register_int::<i8>(registry);
    register_int::<i16>(registry);
    register_int::<i32>(registry);
    register_int::<i64>(registry);
    register_int::<u8>(registry);
    register_int::<u16>(registry);
    register_int::<u32>(registry);
    register_int::<u64>(registry);
    register_float::<f32>(registry);
    register_float::<f64>(registry);

    for host in [HostType::I64, HostType::U64] {
        registry.add_encoder(host, &[ColumnType::Tiny], Format::Binary, encode_binary_int::<1>);
        registry.add_encoder(host, &[ColumnType::Short, ColumnType::Year], Format::Binary, encode_binary_int::<2>);
        registry.add_encoder(host, &[ColumnType::Long, ColumnType::Int24], Format::Binary, encode_binary_int::<4>);
        registry.add_encoder(host, &[ColumnType::LongLong], Format::Binary, encode_binary_int::<8>);
        registry.add_encoder(host, &[INTEGERS, FLOATS, DECIMALS].concat(), Format::Text, encode_text);
    }
    registry.add_encoder(HostType::F32, &[ColumnType::Float], Format::Binary, encode_f32);
    registry.add_encoder(HostType::F32, &[ColumnType::Double], Format::Binary, encode_f64);
    registry.add_encoder(HostType::F64, &[ColumnType::Double], Format::Binary, encode_f64);
    for host in [HostType::F32, HostType::F64] {
        registry.add_encoder(host, &[FLOATS, DECIMALS].concat(), Format::Text, encode_text);
    }
}

fn register_int<T: IntHost>(registry: &mut CodecRegistry) {
    let textual = [INTEGERS, FLOATS, DECIMALS, STRINGS].concat();
    registry.add_decoder(&textual, T::HOST, &[Format::Text], decode_text_int::<T>);
    registry.add_decoder(&[DECIMALS, STRINGS].concat(), T::HOST, &[Format::Binary], decode_text_int::<T>);
    registry.add_decoder(INTEGERS, T::HOST, &[Format::Binary], decode_binary_int::<T>);
    registry.add_decoder(FLOATS, T::HOST, &[Format::Binary], decode_binary_float_int::<T>);
    registry.add_decoder(&[ColumnType::Bit], T::HOST, ALL_FORMATS, decode_bit_int::<T>);
}

fn register_float<T: FloatHost>(registry: &mut CodecRegistry) {
    let textual = [INTEGERS, FLOATS, DECIMALS, STRINGS].concat();
    registry.add_decoder(&textual, T::HOST, &[Format::Text], decode_text_float::<T>);
    registry.add_decoder(&[DECIMALS, STRINGS].concat(), T::HOST, &[Format::Binary], decode_text_float::<T>);
    registry.add_decoder(INTEGERS, T::HOST, &[Format::Binary], decode_binary_int_float::<T>);
    registry.add_decoder(FLOATS, T::HOST, &[Format::Binary], decode_binary_float::<T>);
}

/// Integer host types
pub(super) trait IntHost: TryFrom<i128> + Into<Value> {
    const HOST: HostType;
}

macro_rules! int_host {
    ($($ty:ty => $host:ident),* $(,)?) => {
        $(impl IntHost for $ty { const HOST: HostType = HostType::$host; })*
    };
}

int_host!(i8 => I8, i16 => I16, i32 => I32, i64 => I64, u8 => U8, u16 => U16, u32 => U32, u64 => U64);

/// Floating point host types
pub(super) trait FloatHost {
    const HOST: HostType;
    fn from_f64(d: f64) -> Result<Value, CodecError>;
}

impl FloatHost for f32 {
    const HOST: HostType = HostType::F32;

    fn from_f64(d: f64) -> Result<Value, CodecError> {
        let narrowed = d as f32;
        if d.is_finite() && !narrowed.is_finite() {
            return Err(CodecError::OutOfRange {
                value: d.to_string(),
                host: Self::HOST.to_string(),
            });
        }
        Ok(Value::Float(narrowed))
    }
}

impl FloatHost for f64 {
    const HOST: HostType = HostType::F64;

    fn from_f64(d: f64) -> Result<Value, CodecError> {
        Ok(Value::Double(d))
    }
}

fn narrow<T: IntHost>(v: i128) -> Result<Value, CodecError> {
    T::try_from(v).map(Into::into).map_err(|_| CodecError::OutOfRange {
        value: v.to_string(),
        host: T::HOST.to_string(),
    })
}

fn utf8<'a>(raw: &'a [u8], kind: &'static str) -> Result<&'a str, CodecError> {
    std::str::from_utf8(raw)
        .map(str::trim)
        .map_err(|e| CodecError::malformed(kind, e.to_string()))
}

/// Integer value of a textual number. Fractional values do not convert.
fn parse_integral(s: &str) -> Result<i128, CodecError> {
    if let Ok(v) = s.parse::<i128>() {
        return Ok(v);
    }
    let d = parse_f64(s, "integer")?;
    if d.fract() != 0.0 || d.abs() >= 1e38 {
        return Err(CodecError::OutOfRange {
            value: s.to_string(),
            host: "integer".to_string(),
        });
    }
    Ok(d as i128)
}

fn parse_f64(s: &str, kind: &'static str) -> Result<f64, CodecError> {
    let numeric = s.bytes().any(|b| b.is_ascii_digit())
        && s.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'));
    if !numeric {
        return Err(CodecError::malformed(kind, s));
    }
    s.parse::<f64>().map_err(|_| CodecError::malformed(kind, s))
}

/// Fixed-width binary integer, honoring the UNSIGNED flag
pub(super) fn binary_int(raw: &[u8], meta: &ColumnMeta) -> Result<i128, CodecError> {
    let width = meta.column_type.binary_width().unwrap_or(0);
    if raw.len() != width || width == 0 || width > 8 {
        return Err(CodecError::malformed(
            "integer",
            format!("{} bytes for {}", raw.len(), meta.column_type),
        ));
    }
    let mut buf = [0u8; 8];
    buf[..width].copy_from_slice(raw);
    let unsigned = u64::from_le_bytes(buf);
    if meta.is_unsigned() || meta.column_type == ColumnType::Year {
        return Ok(i128::from(unsigned));
    }
    // sign-extend from the column width
    let shift = 64 - 8 * width as u32;
    Ok(i128::from(((unsigned << shift) as i64) >> shift))
}

/// Fixed-width binary FLOAT or DOUBLE
pub(super) fn binary_float(raw: &[u8], meta: &ColumnMeta) -> Result<f64, CodecError> {
    match (meta.column_type, raw.len()) {
        (ColumnType::Float, 4) => Ok(f64::from(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))),
        (ColumnType::Double, 8) => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(raw);
            Ok(f64::from_le_bytes(buf))
        }
        (column, len) => Err(CodecError::malformed(
            "float",
            format!("{} bytes for {}", len, column),
        )),
    }
}

fn decode_text_int<T: IntHost>(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    narrow::<T>(parse_integral(utf8(raw, "integer")?)?)
}

fn decode_binary_int<T: IntHost>(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    narrow::<T>(binary_int(raw, meta)?)
}

fn decode_binary_float_int<T: IntHost>(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    let d = binary_float(raw, meta)?;
    if !d.is_finite() || d.fract() != 0.0 || d.abs() >= 1e38 {
        return Err(CodecError::OutOfRange {
            value: d.to_string(),
            host: T::HOST.to_string(),
        });
    }
    narrow::<T>(d as i128)
}

fn decode_bit_int<T: IntHost>(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    if raw.len() > 8 {
        return Err(CodecError::malformed("bit", format!("{} bytes", raw.len())));
    }
    // BIT(n) is big-endian
    let v = raw.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b));
    narrow::<T>(i128::from(v))
}

fn decode_text_float<T: FloatHost>(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    T::from_f64(parse_f64(utf8(raw, "float")?, "float")?)
}

fn decode_binary_int_float<T: FloatHost>(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    T::from_f64(binary_int(raw, meta)? as f64)
}

fn decode_binary_float<T: FloatHost>(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    T::from_f64(binary_float(raw, meta)?)
}

fn encode_binary_int<const W: usize>(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    let bits = 8 * W as u32;
    let (fits, bytes) = match *value {
        Value::Int(v) => {
            let fits = W == 8 || (v >= -(1i64 << (bits - 1)) && v < (1i64 << (bits - 1)));
            (fits, v.to_le_bytes())
        }
        Value::UInt(v) => (W == 8 || v < (1u64 << bits), v.to_le_bytes()),
        ref other => return Err(CodecError::malformed("integer", format!("{:?}", other))),
    };
    if !fits {
        return Err(CodecError::OutOfRange {
            value: format!("{:?}", value),
            host: format!("{}-byte integer", W),
        });
    }
    Ok(Bytes::copy_from_slice(&bytes[..W]))
}

fn encode_f32(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    match value {
        Value::Float(f) => Ok(Bytes::copy_from_slice(&f.to_le_bytes())),
        other => Err(CodecError::malformed("float", format!("{:?}", other))),
    }
}

fn encode_f64(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    match value {
        Value::Float(f) => Ok(Bytes::copy_from_slice(&f64::from(*f).to_le_bytes())),
        Value::Double(d) => Ok(Bytes::copy_from_slice(&d.to_le_bytes())),
        other => Err(CodecError::malformed("double", format!("{:?}", other))),
    }
}

fn encode_text(value: &Value, _: &CodecContext) -> Result<Bytes, CodecError> {
    let literal = match value {
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Double(d) if d.is_finite() => d.to_string(),
        other => return Err(CodecError::malformed("number", format!("{:?}", other))),
    };
    Ok(Bytes::from(literal))
}
