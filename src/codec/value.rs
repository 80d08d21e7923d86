//! Host values and typed conversions

use crate::error::CodecError;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Host type a caller asks a column to be decoded into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Bytes,
    Json,
    Date,
    DateTime,
    Timestamp,
}

impl std::fmt::Display for HostType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "String",
            Self::Bytes => "Bytes",
            Self::Json => "serde_json::Value",
            Self::Date => "NaiveDate",
            Self::DateTime => "NaiveDateTime",
            Self::Timestamp => "DateTime<Utc>",
        };
        f.write_str(name)
    }
}

/// A decoded column value or a statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Host type a parameter value is encoded from; `None` for NULL
    pub fn host_type(&self) -> Option<HostType> {
        Some(match self {
            Value::Null => return None,
            Value::Bool(_) => HostType::Bool,
            Value::Int(_) => HostType::I64,
            Value::UInt(_) => HostType::U64,
            Value::Float(_) => HostType::F32,
            Value::Double(_) => HostType::F64,
            Value::Text(_) => HostType::String,
            Value::Bytes(_) => HostType::Bytes,
            Value::Json(_) => HostType::Json,
            Value::Date(_) => HostType::Date,
            Value::DateTime(_) => HostType::DateTime,
            Value::Timestamp(_) => HostType::Timestamp,
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident via $conv:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(<$conv>::from(v))
                }
            }
        )*
    };
}

value_from! {
    bool => Bool via bool,
    i8 => Int via i64,
    i16 => Int via i64,
    i32 => Int via i64,
    i64 => Int via i64,
    u8 => UInt via u64,
    u16 => UInt via u64,
    u32 => UInt via u64,
    u64 => UInt via u64,
    f32 => Float via f32,
    f64 => Double via f64,
    String => Text via String,
    &str => Text via String,
    Vec<u8> => Bytes via Bytes,
    Bytes => Bytes via Bytes,
    serde_json::Value => Json via serde_json::Value,
    NaiveDate => Date via NaiveDate,
    NaiveDateTime => DateTime via NaiveDateTime,
    DateTime<Utc> => Timestamp via DateTime<Utc>,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Rust types a column can be decoded into
pub trait FromColumn: Sized {
    /// Host type used for registry lookup
    fn host_type() -> HostType;

    /// Convert the value produced by the registered codec
    fn from_value(value: Value) -> Result<Self, CodecError>;

    /// Value for SQL NULL
    fn from_null() -> Result<Self, CodecError> {
        Err(CodecError::UnexpectedNull(Self::host_type().to_string()))
    }
}

fn mismatch(value: &Value, host: HostType) -> CodecError {
    CodecError::Unsupported {
        column: format!("{:?}", value),
        host: host.to_string(),
    }
}

macro_rules! from_column {
    ($ty:ty, $host:ident, $($pat:pat => $out:expr),+ $(,)?) => {
        impl FromColumn for $ty {
            fn host_type() -> HostType {
                HostType::$host
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                match value {
                    Value::Null => Self::from_null(),
                    $($pat => $out,)+
                    other => Err(mismatch(&other, HostType::$host)),
                }
            }
        }
    };
}

fn narrow<T: TryFrom<i128>>(v: i128, host: HostType) -> Result<T, CodecError> {
    T::try_from(v).map_err(|_| CodecError::OutOfRange {
        value: v.to_string(),
        host: host.to_string(),
    })
}

from_column!(bool, Bool, Value::Bool(b) => Ok(b));
from_column!(i8, I8, Value::Int(v) => narrow(v.into(), HostType::I8));
from_column!(i16, I16, Value::Int(v) => narrow(v.into(), HostType::I16));
from_column!(i32, I32, Value::Int(v) => narrow(v.into(), HostType::I32));
from_column!(i64, I64, Value::Int(v) => Ok(v));
from_column!(u8, U8, Value::UInt(v) => narrow(v.into(), HostType::U8));
from_column!(u16, U16, Value::UInt(v) => narrow(v.into(), HostType::U16));
from_column!(u32, U32, Value::UInt(v) => narrow(v.into(), HostType::U32));
from_column!(u64, U64, Value::UInt(v) => Ok(v));
from_column!(f32, F32, Value::Float(v) => Ok(v));
from_column!(f64, F64, Value::Double(v) => Ok(v));
from_column!(String, String, Value::Text(s) => Ok(s));
from_column!(Bytes, Bytes, Value::Bytes(b) => Ok(b));
from_column!(Vec<u8>, Bytes, Value::Bytes(b) => Ok(b.to_vec()));
from_column!(serde_json::Value, Json, Value::Json(j) => Ok(j));
from_column!(NaiveDate, Date, Value::Date(d) => Ok(d));
from_column!(NaiveDateTime, DateTime, Value::DateTime(dt) => Ok(dt));
from_column!(DateTime<Utc>, Timestamp, Value::Timestamp(ts) => Ok(ts));

impl<T: FromColumn> FromColumn for Option<T> {
    fn host_type() -> HostType {
        T::host_type()
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }

    fn from_null() -> Result<Self, CodecError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_host() {
        assert_eq!(Value::from(5i8), Value::Int(5));
        assert_eq!(Value::from(5u16), Value::UInt(5));
        assert_eq!(Value::from("abc"), Value::Text("abc".into()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(true)), Value::Bool(true));
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(i8::from_value(Value::Int(-128)).unwrap(), -128);
        assert!(matches!(
            i8::from_value(Value::Int(128)),
            Err(CodecError::OutOfRange { .. })
        ));
        assert!(matches!(
            u8::from_value(Value::UInt(256)),
            Err(CodecError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_null().unwrap(), None);
        assert!(matches!(
            i32::from_value(Value::Null),
            Err(CodecError::UnexpectedNull(_))
        ));
    }

    #[test]
    fn test_mismatch() {
        assert!(matches!(
            String::from_value(Value::Int(1)),
            Err(CodecError::Unsupported { .. })
        ));
    }
}
