//! DATE, DATETIME and TIMESTAMP codecs

use super::groups::TEMPORAL;
use super::{CodecContext, CodecRegistry, ColumnMeta, HostType, Value};
use crate::error::{CodecError, Error};
use crate::protocol::{ColumnType, Format};
use bytes::{BufMut, Bytes, BytesMut};
use chrono::{
    DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike,
    Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Time zone TIMESTAMP values are interpreted in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionTimeZone {
    /// Time zone of the client process
    #[default]
    Local,
    Utc,
    /// Fixed offset east of UTC, in seconds
    Fixed(i32),
}

impl ConnectionTimeZone {
    fn offset(secs: i32) -> Result<FixedOffset, CodecError> {
        FixedOffset::east_opt(secs)
            .ok_or_else(|| CodecError::malformed("time zone", format!("offset {}s", secs)))
    }

    /// Interpret a wall-clock value from the server
    pub fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, CodecError> {
        match *self {
            Self::Utc => Ok(local.and_utc()),
            Self::Local => Local
                .from_local_datetime(&local)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| CodecError::malformed("timestamp", format!("{} does not exist locally", local))),
            Self::Fixed(secs) => Self::offset(secs)?
                .from_local_datetime(&local)
                .single()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| CodecError::malformed("timestamp", local.to_string())),
        }
    }

    /// Wall-clock value to send to the server
    pub fn to_local(&self, ts: &DateTime<Utc>) -> Result<NaiveDateTime, CodecError> {
        Ok(match *self {
            Self::Utc => ts.naive_utc(),
            Self::Local => ts.with_timezone(&Local).naive_local(),
            Self::Fixed(secs) => ts.with_timezone(&Self::offset(secs)?).naive_local(),
        })
    }
}

impl fmt::Display for ConnectionTimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Local => f.write_str("local"),
            Self::Utc => f.write_str("utc"),
            Self::Fixed(secs) => {
                let sign = if secs < 0 { '-' } else { '+' };
                let abs = secs.unsigned_abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs % 3600) / 60)
            }
        }
    }
}

impl FromStr for ConnectionTimeZone {
    type Err = Error;

    /// Accepts `local`, `utc`/`z`, or an offset such as `+05:30` / `-0800`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        if s.eq_ignore_ascii_case("utc") || s.eq_ignore_ascii_case("z") {
            return Ok(Self::Utc);
        }

        let invalid = || Error::Config(format!("invalid time zone: {}", s));
        let (sign, rest) = match s.as_bytes().first() {
            Some(b'+') => (1, &s[1..]),
            Some(b'-') => (-1, &s[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if digits.len() != 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
        let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
        if hours > 14 || minutes > 59 {
            return Err(invalid());
        }
        Ok(Self::Fixed(sign * (hours * 3600 + minutes * 60)))
    }
}

/// Handling of `0000-00-00` dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroDateOption {
    /// Decode as NULL
    UseNull,
    /// Decode as `0001-01-01 00:00:00`
    UseRound,
    /// Fail with `CodecError::ZeroDate`
    #[default]
    Exception,
}

impl fmt::Display for ZeroDateOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UseNull => "use_null",
            Self::UseRound => "use_round",
            Self::Exception => "exception",
        })
    }
}

impl FromStr for ZeroDateOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "use_null" | "null" => Ok(Self::UseNull),
            "use_round" | "round" => Ok(Self::UseRound),
            "exception" => Ok(Self::Exception),
            other => Err(Error::Config(format!("invalid zero date option: {}", other))),
        }
    }
}

pub(super) fn register(registry: &mut CodecRegistry) {
    registry.add_decoder(TEMPORAL, HostType::Date, &[Format::Text], decode_date::<false>);
    registry.add_decoder(TEMPORAL, HostType::Date, &[Format::Binary], decode_date::<true>);
    registry.add_decoder(TEMPORAL, HostType::DateTime, &[Format::Text], decode_datetime::<false>);
    registry.add_decoder(TEMPORAL, HostType::DateTime, &[Format::Binary], decode_datetime::<true>);
    registry.add_decoder(TEMPORAL, HostType::Timestamp, &[Format::Text], decode_timestamp::<false>);
    registry.add_decoder(TEMPORAL, HostType::Timestamp, &[Format::Binary], decode_timestamp::<true>);
    registry.add_decoder(TEMPORAL, HostType::String, &[Format::Binary], decode_binary_string);
    registry.add_decoder(&[ColumnType::Time], HostType::String, &[Format::Binary], decode_binary_time_string);

    registry.add_encoder(HostType::Date, &[ColumnType::Date, ColumnType::DateTime, ColumnType::Timestamp], Format::Binary, encode_binary);
    registry.add_encoder(HostType::Date, &[ColumnType::Date, ColumnType::DateTime, ColumnType::Timestamp], Format::Text, encode_text);
    for host in [HostType::DateTime, HostType::Timestamp] {
        registry.add_encoder(host, &[ColumnType::DateTime, ColumnType::Timestamp], Format::Binary, encode_binary);
        registry.add_encoder(host, &[ColumnType::DateTime, ColumnType::Timestamp], Format::Text, encode_text);
    }
}

/// Text temporal value; `None` is the zero date
fn parse_text(raw: &[u8]) -> Result<Option<NaiveDateTime>, CodecError> {
    let s = std::str::from_utf8(raw)
        .map_err(|e| CodecError::malformed("datetime", e.to_string()))?
        .trim();
    let date_part = s.split(' ').next().unwrap_or(s);
    if date_part == "0000-00-00" {
        return Ok(None);
    }

    if s.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(|d| Some(d.and_time(NaiveTime::MIN)))
            .map_err(|e| CodecError::malformed("date", format!("{}: {}", s, e)));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(Some)
        .map_err(|e| CodecError::malformed("datetime", format!("{}: {}", s, e)))
}

/// Binary temporal value; `None` is the zero date
fn parse_binary(raw: &[u8], meta: &ColumnMeta) -> Result<Option<NaiveDateTime>, CodecError> {
    let malformed = || {
        CodecError::malformed(
            "datetime",
            format!("{} bytes for {}", raw.len(), meta.column_type),
        )
    };
    // length 0 is the zero date; 4, 7 and 11 add time and microseconds
    if raw.is_empty() {
        return Ok(None);
    }
    if !matches!(raw.len(), 4 | 7 | 11) {
        return Err(malformed());
    }

    let year = u16::from_le_bytes([raw[0], raw[1]]);
    let (month, day) = (raw[2], raw[3]);
    if year == 0 && month == 0 && day == 0 {
        return Ok(None);
    }
    let (hour, minute, second) = if raw.len() >= 7 {
        (raw[4], raw[5], raw[6])
    } else {
        (0, 0, 0)
    };
    let micros = if raw.len() == 11 {
        u32::from_le_bytes([raw[7], raw[8], raw[9], raw[10]])
    } else {
        0
    };

    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|d| d.and_hms_micro_opt(u32::from(hour), u32::from(minute), u32::from(second), micros))
        .map(Some)
        .ok_or_else(malformed)
}

fn zero_date(ctx: &CodecContext) -> Result<Option<NaiveDateTime>, CodecError> {
    match ctx.zero_date {
        ZeroDateOption::UseNull => Ok(None),
        ZeroDateOption::UseRound => Ok(NaiveDate::from_ymd_opt(1, 1, 1).map(|d| d.and_time(NaiveTime::MIN))),
        ZeroDateOption::Exception => Err(CodecError::ZeroDate),
    }
}

fn resolve<const BINARY: bool>(
    raw: &[u8],
    meta: &ColumnMeta,
    ctx: &CodecContext,
) -> Result<Option<NaiveDateTime>, CodecError> {
    let parsed = if BINARY {
        parse_binary(raw, meta)?
    } else {
        parse_text(raw)?
    };
    match parsed {
        Some(dt) => Ok(Some(dt)),
        None => zero_date(ctx),
    }
}

fn decode_date<const BINARY: bool>(raw: &[u8], meta: &ColumnMeta, ctx: &CodecContext) -> Result<Value, CodecError> {
    Ok(resolve::<BINARY>(raw, meta, ctx)?.map_or(Value::Null, |dt| Value::Date(dt.date())))
}

fn decode_datetime<const BINARY: bool>(raw: &[u8], meta: &ColumnMeta, ctx: &CodecContext) -> Result<Value, CodecError> {
    Ok(resolve::<BINARY>(raw, meta, ctx)?.map_or(Value::Null, Value::DateTime))
}

fn decode_timestamp<const BINARY: bool>(raw: &[u8], meta: &ColumnMeta, ctx: &CodecContext) -> Result<Value, CodecError> {
    match resolve::<BINARY>(raw, meta, ctx)? {
        Some(dt) => ctx.time_zone.to_utc(dt).map(Value::Timestamp),
        None => Ok(Value::Null),
    }
}

fn decode_binary_string(raw: &[u8], meta: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    let text = match parse_binary(raw, meta)? {
        None if meta.column_type == ColumnType::Date => "0000-00-00".to_string(),
        None => "0000-00-00 00:00:00".to_string(),
        Some(dt) if meta.column_type == ColumnType::Date => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => format_datetime(&dt),
    };
    Ok(Value::Text(text))
}

/// Binary TIME: sign, days, hours, minutes, seconds and optional microseconds
fn decode_binary_time_string(raw: &[u8], _: &ColumnMeta, _: &CodecContext) -> Result<Value, CodecError> {
    if raw.is_empty() {
        return Ok(Value::Text("00:00:00".to_string()));
    }
    if !matches!(raw.len(), 8 | 12) {
        return Err(CodecError::malformed("time", format!("{} bytes", raw.len())));
    }
    let negative = raw[0] == 1;
    let days = u32::from_le_bytes([raw[1], raw[2], raw[3], raw[4]]);
    let hours = days * 24 + u32::from(raw[5]);
    let mut text = format!(
        "{}{:02}:{:02}:{:02}",
        if negative { "-" } else { "" },
        hours,
        raw[6],
        raw[7]
    );
    if raw.len() == 12 {
        let micros = u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]);
        text.push_str(&format!(".{:06}", micros));
    }
    Ok(Value::Text(text))
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.nanosecond() == 0 {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

fn wall_clock(value: &Value, ctx: &CodecContext) -> Result<NaiveDateTime, CodecError> {
    match value {
        Value::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
        Value::DateTime(dt) => Ok(*dt),
        Value::Timestamp(ts) => ctx.time_zone.to_local(ts),
        other => Err(CodecError::malformed("datetime", format!("{:?}", other))),
    }
}

fn encode_binary(value: &Value, ctx: &CodecContext) -> Result<Bytes, CodecError> {
    let dt = wall_clock(value, ctx)?;
    let year = u16::try_from(dt.year()).map_err(|_| CodecError::OutOfRange {
        value: dt.to_string(),
        host: "DATETIME".to_string(),
    })?;
    let micros = dt.nanosecond() / 1_000;
    let len: u8 = if micros != 0 {
        11
    } else if matches!(value, Value::Date(_)) {
        4
    } else {
        7
    };

    let mut buf = BytesMut::with_capacity(1 + usize::from(len));
    buf.put_u8(len);
    buf.put_u16_le(year);
    buf.put_u8(dt.month() as u8);
    buf.put_u8(dt.day() as u8);
    if len >= 7 {
        buf.put_u8(dt.hour() as u8);
        buf.put_u8(dt.minute() as u8);
        buf.put_u8(dt.second() as u8);
    }
    if len == 11 {
        buf.put_u32_le(micros);
    }
    Ok(buf.freeze())
}

fn encode_text(value: &Value, ctx: &CodecContext) -> Result<Bytes, CodecError> {
    let literal = match value {
        Value::Date(d) => d.format("'%Y-%m-%d'").to_string(),
        other => format!("'{}'", format_datetime(&wall_clock(other, ctx)?)),
    };
    Ok(Bytes::from(literal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, registry};

    fn ndt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_text_datetime() {
        let meta = ColumnMeta::new(ColumnType::DateTime);
        let ctx = CodecContext::default();
        let v: NaiveDateTime = decode(Some(b"2024-02-29 13:45:01"), &meta, Format::Text, &ctx).unwrap();
        assert_eq!(v, ndt(2024, 2, 29, 13, 45, 1));
        let v: NaiveDateTime = decode(Some(b"2024-02-29 13:45:01.250000"), &meta, Format::Text, &ctx).unwrap();
        assert_eq!(v.nanosecond(), 250_000_000);
        let d: NaiveDate = decode(Some(b"2024-02-29"), &ColumnMeta::new(ColumnType::Date), Format::Text, &ctx).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_binary_datetime_lengths() {
        let meta = ColumnMeta::new(ColumnType::DateTime);
        let ctx = CodecContext::default();
        let mut raw = vec![0xE8, 0x07, 3, 15];
        let d: NaiveDate = decode(Some(&raw), &meta, Format::Binary, &ctx).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());

        raw.extend_from_slice(&[10, 20, 30]);
        let v: NaiveDateTime = decode(Some(&raw), &meta, Format::Binary, &ctx).unwrap();
        assert_eq!(v, ndt(2024, 3, 15, 10, 20, 30));

        raw.extend_from_slice(&500u32.to_le_bytes());
        let v: NaiveDateTime = decode(Some(&raw), &meta, Format::Binary, &ctx).unwrap();
        assert_eq!(v.nanosecond(), 500_000);

        assert!(decode::<NaiveDateTime>(Some(&[1, 2, 3]), &meta, Format::Binary, &ctx).is_err());
    }

    #[test]
    fn test_zero_date_options() {
        let meta = ColumnMeta::new(ColumnType::DateTime);
        let mut ctx = CodecContext::default();
        assert!(matches!(
            decode::<NaiveDateTime>(Some(b"0000-00-00 00:00:00"), &meta, Format::Text, &ctx),
            Err(CodecError::ZeroDate)
        ));

        ctx.zero_date = ZeroDateOption::UseNull;
        let v: Option<NaiveDateTime> = decode(Some(b""), &meta, Format::Binary, &ctx).unwrap();
        assert_eq!(v, None);

        ctx.zero_date = ZeroDateOption::UseRound;
        let v: NaiveDateTime = decode(Some(b"0000-00-00"), &meta, Format::Text, &ctx).unwrap();
        assert_eq!(v, ndt(1, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_timestamp_time_zone() {
        let meta = ColumnMeta::new(ColumnType::Timestamp);
        let ctx = CodecContext {
            time_zone: ConnectionTimeZone::Fixed(2 * 3600),
            ..CodecContext::default()
        };
        let ts: DateTime<Utc> = decode(Some(b"2024-01-01 12:00:00"), &meta, Format::Text, &ctx).unwrap();
        assert_eq!(ts.naive_utc(), ndt(2024, 1, 1, 10, 0, 0));

        let literal = registry()
            .encode(&Value::Timestamp(ts), ColumnType::Timestamp, Format::Text, &ctx)
            .unwrap();
        assert_eq!(&literal[..], b"'2024-01-01 12:00:00'");
    }

    #[test]
    fn test_binary_param_encoding() {
        let ctx = CodecContext::default();
        let bytes = registry()
            .encode(&Value::DateTime(ndt(2024, 3, 15, 10, 20, 30)), ColumnType::DateTime, Format::Binary, &ctx)
            .unwrap();
        assert_eq!(&bytes[..], &[7, 0xE8, 0x07, 3, 15, 10, 20, 30]);

        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let bytes = registry()
            .encode(&Value::Date(date), ColumnType::Date, Format::Binary, &ctx)
            .unwrap();
        assert_eq!(&bytes[..], &[4, 0xE8, 0x07, 3, 15]);
    }

    #[test]
    fn test_binary_as_string() {
        let ctx = CodecContext::default();
        let s: String = decode(
            Some(&[0xE8, 0x07, 3, 15, 10, 20, 30]),
            &ColumnMeta::new(ColumnType::DateTime),
            Format::Binary,
            &ctx,
        )
        .unwrap();
        assert_eq!(s, "2024-03-15 10:20:30");

        let s: String = decode(
            Some(&[1, 1, 0, 0, 0, 2, 3, 4]),
            &ColumnMeta::new(ColumnType::Time),
            Format::Binary,
            &ctx,
        )
        .unwrap();
        assert_eq!(s, "-26:03:04");
    }

    #[test]
    fn test_time_zone_parsing() {
        assert_eq!("UTC".parse::<ConnectionTimeZone>().unwrap(), ConnectionTimeZone::Utc);
        assert_eq!("local".parse::<ConnectionTimeZone>().unwrap(), ConnectionTimeZone::Local);
        assert_eq!(
            "-08:00".parse::<ConnectionTimeZone>().unwrap(),
            ConnectionTimeZone::Fixed(-8 * 3600)
        );
        assert_eq!(ConnectionTimeZone::Fixed(5 * 3600 + 1800).to_string(), "+05:30");
        assert!("Mars/Olympus".parse::<ConnectionTimeZone>().is_err());
        assert_eq!("use-null".parse::<ZeroDateOption>().unwrap(), ZeroDateOption::UseNull);
    }
}
