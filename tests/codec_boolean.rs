//! Boolean conversion table

use mysql_wire::codec::{self, CodecContext, ColumnMeta};
use mysql_wire::protocol::{ColumnType, Format};
use mysql_wire::CodecError;

fn text_bool(column_type: ColumnType, raw: &str) -> Result<bool, CodecError> {
    codec::decode::<bool>(
        Some(raw.as_bytes()),
        &ColumnMeta::new(column_type),
        Format::Text,
        &CodecContext::default(),
    )
}

#[test]
fn test_string_literals() {
    let cases = [
        ("true", true),
        ("false", false),
        ("1", true),
        ("0", false),
        ("Y", true),
        ("no", false),
        ("T", true),
        ("n", false),
        ("YES", true),
        ("", false),
    ];
    for (raw, expected) in cases {
        assert_eq!(text_bool(ColumnType::VarString, raw).unwrap(), expected, "{:?}", raw);
    }
}

#[test]
fn test_numeric_values() {
    assert!(text_bool(ColumnType::Double, "26.57").unwrap());
    assert!(!text_bool(ColumnType::Long, "-57").unwrap());
    assert!(text_bool(ColumnType::Long, "100000").unwrap());
    assert!(text_bool(ColumnType::Tiny, "-1").unwrap());
    assert!(!text_bool(ColumnType::NewDecimal, "-12345678901234567890").unwrap());
    assert!(!text_bool(ColumnType::VarString, "-12345678901234567890").unwrap());
}

#[test]
fn test_unrecognized_text_is_error() {
    let err = text_bool(ColumnType::VarString, "Banana").unwrap_err();
    assert!(matches!(err, CodecError::Malformed { .. }), "got {:?}", err);
}

#[test]
fn test_binary_integer() {
    let ctx = CodecContext::default();
    let meta = ColumnMeta::new(ColumnType::Long);
    let decode = |v: i32| codec::decode::<bool>(Some(&v.to_le_bytes()), &meta, Format::Binary, &ctx).unwrap();
    assert!(decode(1));
    assert!(decode(-1));
    assert!(!decode(0));
    assert!(!decode(-57));
}

#[test]
fn test_null_into_option() {
    let value = codec::decode::<Option<bool>>(
        None,
        &ColumnMeta::new(ColumnType::Tiny),
        Format::Text,
        &CodecContext::default(),
    )
    .unwrap();
    assert_eq!(value, None);

    let err = codec::decode::<bool>(None, &ColumnMeta::new(ColumnType::Tiny), Format::Text, &CodecContext::default())
        .unwrap_err();
    assert!(matches!(err, CodecError::UnexpectedNull(_)));
}
