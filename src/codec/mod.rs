//! Value codec registry
//!
//! Conversions between wire values and host values are looked up in a table built once
//! per process and keyed by an explicit column type tag, a host type and a wire format.
//! Unregistered combinations fail with `CodecError::Unsupported` instead of guessing.

mod boolean;
mod numeric;
mod temporal;
mod text;
mod value;

pub use temporal::{ConnectionTimeZone, ZeroDateOption};
pub use value::{FromColumn, HostType, Value};

use crate::error::CodecError;
use crate::protocol::column_flags;
use crate::protocol::{ColumnDefinition, ColumnType, Format};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Column properties a codec needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMeta {
    pub column_type: ColumnType,
    pub flags: u16,
    pub collation: u16,
    pub decimals: u8,
}

impl ColumnMeta {
    /// Metadata for a bare type tag
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            flags: 0,
            collation: crate::protocol::constants::collations::BINARY,
            decimals: 0,
        }
    }

    /// Set the UNSIGNED flag
    pub fn unsigned(mut self) -> Self {
        self.flags |= column_flags::UNSIGNED;
        self
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED != 0
    }
}

impl From<&ColumnDefinition> for ColumnMeta {
    fn from(def: &ColumnDefinition) -> Self {
        Self {
            column_type: def.column_type,
            flags: def.flags,
            collation: def.collation,
            decimals: def.decimals,
        }
    }
}

/// Connection settings that affect conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecContext {
    pub time_zone: ConnectionTimeZone,
    pub zero_date: ZeroDateOption,
}

/// Decode strategy: wire bytes of one non-NULL value to a host value
pub type DecodeFn = fn(&[u8], &ColumnMeta, &CodecContext) -> Result<Value, CodecError>;

/// Encode strategy: host value to wire bytes (SQL literal in text mode, parameter bytes in binary mode)
pub type EncodeFn = fn(&Value, &CodecContext) -> Result<Bytes, CodecError>;

/// Lookup table of codecs
#[derive(Default)]
pub struct CodecRegistry {
    decoders: HashMap<(ColumnType, HostType, Format), DecodeFn>,
    encoders: HashMap<(HostType, ColumnType, Format), EncodeFn>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("decoders", &self.decoders.len())
            .field("encoders", &self.encoders.len())
            .finish()
    }
}

static REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();

/// Process-wide registry with every built-in codec
pub fn registry() -> &'static CodecRegistry {
    REGISTRY.get_or_init(CodecRegistry::with_builtin_codecs)
}

impl CodecRegistry {
    fn with_builtin_codecs() -> Self {
        let mut registry = Self::default();
        boolean::register(&mut registry);
        numeric::register(&mut registry);
        text::register(&mut registry);
        temporal::register(&mut registry);
        tracing::debug!(
            decoders = registry.decoders.len(),
            encoders = registry.encoders.len(),
            "codec registry initialized"
        );
        registry
    }

    /// Register a decoder for each listed column type in each listed format
    pub(crate) fn add_decoder(
        &mut self,
        columns: &[ColumnType],
        host: HostType,
        formats: &[Format],
        decode: DecodeFn,
    ) {
        for &column in columns {
            for &format in formats {
                self.decoders.insert((column, host, format), decode);
            }
        }
    }

    /// Register an encoder for each listed target column type
    pub(crate) fn add_encoder(
        &mut self,
        host: HostType,
        columns: &[ColumnType],
        format: Format,
        encode: EncodeFn,
    ) {
        for &column in columns {
            self.encoders.insert((host, column, format), encode);
        }
    }

    /// Whether a decoder exists
    pub fn can_decode(&self, column: ColumnType, host: HostType, format: Format) -> bool {
        self.decoders.contains_key(&(column, host, format))
    }

    /// Decode one non-NULL value
    pub fn decode(
        &self,
        raw: &[u8],
        column: &ColumnMeta,
        format: Format,
        host: HostType,
        ctx: &CodecContext,
    ) -> Result<Value, CodecError> {
        let decode = self
            .decoders
            .get(&(column.column_type, host, format))
            .ok_or_else(|| unsupported(column.column_type, host, format))?;
        decode(raw, column, ctx)
    }

    /// Encode `value` for `target` in `format`
    pub fn encode(
        &self,
        value: &Value,
        target: ColumnType,
        format: Format,
        ctx: &CodecContext,
    ) -> Result<Bytes, CodecError> {
        let Some(host) = value.host_type() else {
            return Ok(match format {
                Format::Text => Bytes::from_static(b"NULL"),
                Format::Binary => Bytes::new(),
            });
        };
        let encode = self
            .encoders
            .get(&(host, target, format))
            .ok_or_else(|| CodecError::Unsupported {
                column: format!("{} ({:?})", target, format),
                host: host.to_string(),
            })?;
        encode(value, ctx)
    }
}

fn unsupported(column: ColumnType, host: HostType, format: Format) -> CodecError {
    CodecError::Unsupported {
        column: format!("{} ({:?})", column, format),
        host: host.to_string(),
    }
}

/// Decode a possibly-NULL column value into `T`
pub fn decode<T: FromColumn>(
    raw: Option<&[u8]>,
    column: &ColumnMeta,
    format: Format,
    ctx: &CodecContext,
) -> Result<T, CodecError> {
    match raw {
        None => T::from_null(),
        Some(raw) => {
            let value = registry().decode(raw, column, format, T::host_type(), ctx)?;
            T::from_value(value)
        }
    }
}

/// Encode a value as a SQL literal for text-protocol statements
pub fn to_sql_literal(value: &Value, ctx: &CodecContext) -> Result<String, CodecError> {
    let target = match value.host_type() {
        None => return Ok("NULL".to_string()),
        Some(host) => natural_column_type(host),
    };
    let bytes = registry().encode(value, target, Format::Text, ctx)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::malformed("literal", e.to_string()))
}

/// One encoded COM_STMT_EXECUTE parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryParam {
    /// Type announced in the parameter type block
    pub column_type: ColumnType,
    /// Unsigned flag in the parameter type block
    pub unsigned: bool,
    /// Value bytes, `None` for NULL (set in the NULL bitmap instead)
    pub data: Option<Bytes>,
}

/// Encode a statement parameter with its natural binary type
pub fn encode_binary_param(value: &Value) -> Result<BinaryParam, CodecError> {
    encode_binary_param_with(value, &CodecContext::default())
}

/// Encode a statement parameter with connection-specific settings
pub fn encode_binary_param_with(value: &Value, ctx: &CodecContext) -> Result<BinaryParam, CodecError> {
    let Some(host) = value.host_type() else {
        return Ok(BinaryParam {
            column_type: ColumnType::Null,
            unsigned: false,
            data: None,
        });
    };
    let column_type = natural_column_type(host);
    let data = registry().encode(value, column_type, Format::Binary, ctx)?;
    Ok(BinaryParam {
        column_type,
        unsigned: matches!(value, Value::UInt(_)),
        data: Some(data),
    })
}

/// Column type a host value is sent as
pub fn natural_column_type(host: HostType) -> ColumnType {
    match host {
        HostType::Bool | HostType::I8 | HostType::U8 => ColumnType::Tiny,
        HostType::I16 | HostType::U16 => ColumnType::Short,
        HostType::I32 | HostType::U32 => ColumnType::Long,
        HostType::I64 | HostType::U64 => ColumnType::LongLong,
        HostType::F32 => ColumnType::Float,
        HostType::F64 => ColumnType::Double,
        HostType::String | HostType::Json => ColumnType::VarString,
        HostType::Bytes => ColumnType::Blob,
        HostType::Date => ColumnType::Date,
        HostType::DateTime | HostType::Timestamp => ColumnType::DateTime,
    }
}

/// Column type groups shared by the codec modules
pub(crate) mod groups {
    use crate::protocol::ColumnType::{self, *};

    pub const INTEGERS: &[ColumnType] = &[Tiny, Short, Long, LongLong, Int24, Year];
    pub const FLOATS: &[ColumnType] = &[Float, Double];
    pub const DECIMALS: &[ColumnType] = &[Decimal, NewDecimal];
    pub const STRINGS: &[ColumnType] = &[
        VarChar, VarString, String, Enum, Set, TinyBlob, MediumBlob, LongBlob, Blob,
    ];
    pub const TEMPORAL: &[ColumnType] = &[Date, DateTime, Timestamp];
    pub const ALL_FORMATS: &[crate::protocol::Format] =
        &[crate::protocol::Format::Text, crate::protocol::Format::Binary];
}
