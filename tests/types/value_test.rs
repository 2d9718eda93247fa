use std::cmp::Ordering;

use davisbase::types::{
    error::DatabaseError,
    value::{self, NullSlot, TypeCode, Value, pad_text},
};

#[test]
fn test_type_code_widths() {
    assert_eq!(TypeCode::NULL_1.width(), 1);
    assert_eq!(TypeCode::NULL_2.width(), 2);
    assert_eq!(TypeCode::NULL_4.width(), 4);
    assert_eq!(TypeCode::NULL_8.width(), 8);
    assert_eq!(TypeCode::TINYINT.width(), 1);
    assert_eq!(TypeCode::SMALLINT.width(), 2);
    assert_eq!(TypeCode::INT.width(), 4);
    assert_eq!(TypeCode::BIGINT.width(), 8);
    assert_eq!(TypeCode::REAL.width(), 4);
    assert_eq!(TypeCode::DOUBLE.width(), 8);
    assert_eq!(TypeCode::DATETIME.width(), 8);
    assert_eq!(TypeCode::DATE.width(), 8);
    assert_eq!(TypeCode::from_u8(0x0C).width(), 0);
    assert_eq!(TypeCode::from_u8(0x11).width(), 5);
}

#[test]
fn test_text_type_code_limit() {
    assert_eq!(TypeCode::text(5).unwrap().as_u8(), 0x11);
    assert_eq!(TypeCode::text(243).unwrap().as_u8(), 0xFF);
    assert!(TypeCode::text(244).is_err());
    assert!(Value::Text("x".repeat(244)).type_code().is_err());
}

#[test]
fn test_encode_is_big_endian() {
    assert_eq!(value::encode(TypeCode::INT, &Value::Int(1)).unwrap(), vec![0, 0, 0, 1]);
    assert_eq!(value::encode(TypeCode::SMALLINT, &Value::SmallInt(-2)).unwrap(), vec![0xFF, 0xFE]);
    assert_eq!(
        value::encode(TypeCode::BIGINT, &Value::BigInt(0x0102)).unwrap(),
        vec![0, 0, 0, 0, 0, 0, 1, 2]
    );
}

#[test]
fn test_null_encodes_zero_filled_slot() {
    let bytes = value::encode(TypeCode::NULL_4, &Value::Null(NullSlot::Four)).unwrap();
    assert_eq!(bytes, vec![0; 4]);
    assert_eq!(value::decode(TypeCode::NULL_8, &[0; 8]).unwrap(), Value::Null(NullSlot::Eight));
}

#[test]
fn test_encode_rejects_mismatched_kind() {
    let result = value::encode(TypeCode::INT, &Value::Text("12".into()));
    assert!(matches!(result, Err(DatabaseError::TypeMismatch { .. })));
    let result = value::encode(TypeCode::NULL_1, &Value::Null(NullSlot::Eight));
    assert!(matches!(result, Err(DatabaseError::TypeMismatch { .. })));
}

#[test]
fn test_decode_reads_only_the_declared_width() {
    let bytes = [0x00, 0x2A, 0xFF, 0xFF];
    assert_eq!(value::decode(TypeCode::SMALLINT, &bytes).unwrap(), Value::SmallInt(42));
    assert!(value::decode(TypeCode::BIGINT, &bytes).is_err());
}

#[test]
fn test_values_survive_encoding() {
    let cases = [
        Value::TinyInt(-7),
        Value::Real(2.5),
        Value::Double(-1.0e10),
        Value::DateTime(1_700_000_000),
        Value::Text("héllo".to_string()),
    ];
    for original in cases {
        let code = original.type_code().unwrap();
        let bytes = value::encode(code, &original).unwrap();
        assert_eq!(bytes.len(), code.width());
        assert_eq!(value::decode(code, &bytes).unwrap(), original);
    }
}

#[test]
fn test_pad_text() {
    assert_eq!(pad_text("ab", 4), "ab  ");
    assert_eq!(pad_text("abcdef", 3), "abc");
    // never splits a multi-byte character
    assert_eq!(pad_text("é", 1), " ");
}

#[test]
fn test_compare_stored_follows_the_stored_type() {
    let stored = Value::SmallInt(10);
    assert_eq!(stored.compare_stored(&Value::BigInt(3)).unwrap(), Some(Ordering::Greater));
    assert_eq!(stored.compare_stored(&Value::Text("10".into())).unwrap(), Some(Ordering::Equal));
    assert_eq!(stored.compare_stored(&Value::Double(10.5)).unwrap(), Some(Ordering::Less));
    assert!(stored.compare_stored(&Value::Text("ten".into())).is_err());

    let padded = Value::Text("bob  ".into());
    assert_eq!(padded.compare_stored(&Value::Text("bob".into())).unwrap(), Some(Ordering::Equal));
}

#[test]
fn test_nulls_are_not_comparable() {
    let null = Value::Null(NullSlot::Four);
    assert_eq!(null.compare_stored(&Value::Int(1)).unwrap(), None);
    assert_eq!(Value::Int(1).compare_stored(&Value::Null(NullSlot::One)).unwrap(), None);
}

#[test]
fn test_dates_parse_and_display() {
    let date = Value::parse_date("2024-03-01").unwrap();
    assert_eq!(date.to_string(), "2024-03-01");
    let datetime = Value::parse_datetime("2024-03-01 12:30:00").unwrap();
    assert_eq!(datetime.to_string(), "2024-03-01 12:30:00");
    assert_eq!(
        date.compare_stored(&Value::Text("2024-02-29".into())).unwrap(),
        Some(Ordering::Greater)
    );
    assert!(Value::parse_date("March 1st").is_err());
}

#[test]
fn test_display_trims_text_padding() {
    assert_eq!(Value::Text("ab   ".into()).to_string(), "ab");
    assert_eq!(Value::Null(NullSlot::Two).to_string(), "NULL");
}
