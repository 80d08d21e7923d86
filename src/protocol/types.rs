//! Column type tags and column flags

use serde::{Deserialize, Serialize};

/// Wire encoding of row values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    /// Text protocol (COM_QUERY results): every value is a length-encoded string
    Text,
    /// Binary protocol (COM_STMT_EXECUTE results and parameters)
    Binary,
}

/// Column type tag from a column definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Decimal,
    Tiny,
    Short,
    Long,
    Float,
    Double,
    Null,
    Timestamp,
    LongLong,
    Int24,
    Date,
    Time,
    DateTime,
    Year,
    VarChar,
    Bit,
    Vector,
    Json,
    NewDecimal,
    Enum,
    Set,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    VarString,
    String,
    Geometry,
    /// Type byte this client does not know; values are treated as length-encoded bytes
    Unknown(u8),
}

impl ColumnType {
    /// Map a type byte to its tag
    pub fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Decimal,
            0x01 => Self::Tiny,
            0x02 => Self::Short,
            0x03 => Self::Long,
            0x04 => Self::Float,
            0x05 => Self::Double,
            0x06 => Self::Null,
            0x07 => Self::Timestamp,
            0x08 => Self::LongLong,
            0x09 => Self::Int24,
            0x0A => Self::Date,
            0x0B => Self::Time,
            0x0C => Self::DateTime,
            0x0D => Self::Year,
            0x0F => Self::VarChar,
            0x10 => Self::Bit,
            0xF2 => Self::Vector,
            0xF5 => Self::Json,
            0xF6 => Self::NewDecimal,
            0xF7 => Self::Enum,
            0xF8 => Self::Set,
            0xF9 => Self::TinyBlob,
            0xFA => Self::MediumBlob,
            0xFB => Self::LongBlob,
            0xFC => Self::Blob,
            0xFD => Self::VarString,
            0xFE => Self::String,
            0xFF => Self::Geometry,
            other => Self::Unknown(other),
        }
    }

    /// Type byte on the wire
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Decimal => 0x00,
            Self::Tiny => 0x01,
            Self::Short => 0x02,
            Self::Long => 0x03,
            Self::Float => 0x04,
            Self::Double => 0x05,
            Self::Null => 0x06,
            Self::Timestamp => 0x07,
            Self::LongLong => 0x08,
            Self::Int24 => 0x09,
            Self::Date => 0x0A,
            Self::Time => 0x0B,
            Self::DateTime => 0x0C,
            Self::Year => 0x0D,
            Self::VarChar => 0x0F,
            Self::Bit => 0x10,
            Self::Vector => 0xF2,
            Self::Json => 0xF5,
            Self::NewDecimal => 0xF6,
            Self::Enum => 0xF7,
            Self::Set => 0xF8,
            Self::TinyBlob => 0xF9,
            Self::MediumBlob => 0xFA,
            Self::LongBlob => 0xFB,
            Self::Blob => 0xFC,
            Self::VarString => 0xFD,
            Self::String => 0xFE,
            Self::Geometry => 0xFF,
            Self::Unknown(other) => *other,
        }
    }

    /// Width of a binary-protocol value with a fixed size, `None` for length-prefixed values
    pub fn binary_width(&self) -> Option<usize> {
        match self {
            Self::Tiny => Some(1),
            Self::Short | Self::Year => Some(2),
            Self::Long | Self::Int24 | Self::Float => Some(4),
            Self::LongLong | Self::Double => Some(8),
            Self::Null => Some(0),
            _ => None,
        }
    }

    /// Date/time types whose binary form is prefixed by a one-byte length
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::DateTime | Self::Timestamp | Self::Time
        )
    }

    /// Integer types
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Tiny | Self::Short | Self::Long | Self::LongLong | Self::Int24 | Self::Year
        )
    }

    /// Character and binary string types
    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Self::VarChar
                | Self::VarString
                | Self::String
                | Self::Enum
                | Self::Set
                | Self::TinyBlob
                | Self::MediumBlob
                | Self::LongBlob
                | Self::Blob
        )
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(b) => write!(f, "UNKNOWN(0x{:02X})", b),
            other => write!(f, "{}", format!("{:?}", other).to_ascii_uppercase()),
        }
    }
}

/// Column definition flags
pub mod column_flags {
    pub const NOT_NULL: u16 = 0x0001;
    pub const PRIMARY_KEY: u16 = 0x0002;
    pub const UNIQUE_KEY: u16 = 0x0004;
    pub const MULTIPLE_KEY: u16 = 0x0008;
    pub const BLOB: u16 = 0x0010;
    pub const UNSIGNED: u16 = 0x0020;
    pub const ZEROFILL: u16 = 0x0040;
    pub const BINARY: u16 = 0x0080;
    pub const ENUM: u16 = 0x0100;
    pub const AUTO_INCREMENT: u16 = 0x0200;
    pub const TIMESTAMP: u16 = 0x0400;
    pub const SET: u16 = 0x0800;
}
