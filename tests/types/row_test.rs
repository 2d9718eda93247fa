use davisbase::types::{
    entry::InteriorCell,
    error::DatabaseError,
    row::{self, Row},
    value::{NullSlot, TypeCode, Value},
};

fn sample_row() -> Row {
    Row::new(
        7,
        vec![
            Value::Int(7),
            Value::Text("alice".to_string()),
            Value::Null(NullSlot::Eight),
        ],
    )
}

#[test]
fn test_leaf_cell_layout() {
    let cell = sample_row().to_cell().unwrap();
    // payload: header length(2) + 3 codes + 4 + 5 + 8
    let payload_len = 2 + 3 + 4 + 5 + 8;
    assert_eq!(cell.len(), 7 + payload_len);
    assert_eq!(cell[0], row::LIVE);
    assert_eq!(u16::from_be_bytes([cell[1], cell[2]]) as usize, payload_len);
    assert_eq!(i32::from_be_bytes([cell[3], cell[4], cell[5], cell[6]]), 7);
    assert_eq!(u16::from_be_bytes([cell[7], cell[8]]), 5);
    assert_eq!(&cell[9..12], &[0x06, 0x11, 0x03]);
    assert_eq!(&cell[12..16], &[0, 0, 0, 7]);
    assert_eq!(&cell[16..21], b"alice");
    assert_eq!(&cell[21..29], &[0; 8]);
}

#[test]
fn test_leaf_cell_read_back() {
    let original = sample_row();
    let cell = original.to_cell().unwrap();
    let parsed = Row::from_cell(&cell).unwrap();
    assert!(!parsed.deleted);
    assert_eq!(parsed.row, original);
    assert_eq!(parsed.type_codes, vec![TypeCode::INT, TypeCode::from_u8(0x11), TypeCode::NULL_8]);
}

#[test]
fn test_tombstone_marker_is_reported() {
    let mut cell = sample_row().to_cell().unwrap();
    cell[0] = row::TOMBSTONE;
    assert!(Row::from_cell(&cell).unwrap().deleted);
}

#[test]
fn test_truncated_cell_is_rejected() {
    let cell = sample_row().to_cell().unwrap();
    let result = Row::from_cell(&cell[..cell.len() - 1]);
    assert!(matches!(result, Err(DatabaseError::SerializationError { .. })));
}

#[test]
fn test_value_offsets() {
    let codes = vec![TypeCode::INT, TypeCode::from_u8(0x11), TypeCode::NULL_8];
    assert_eq!(row::type_code_offset(0), 9);
    assert_eq!(row::type_code_offset(2), 11);
    assert_eq!(row::value_offset(&codes, 0), 12);
    assert_eq!(row::value_offset(&codes, 1), 16);
    assert_eq!(row::value_offset(&codes, 2), 21);
}

#[test]
fn test_interior_cell_layout() {
    let cell = InteriorCell::new(3, -42);
    let bytes = cell.to_bytes();
    assert_eq!(bytes.len(), 9);
    assert_eq!(bytes[0], 0);
    assert_eq!(&bytes[1..5], &[0, 0, 0, 3]);
    assert_eq!(&bytes[5..9], &(-42i32).to_be_bytes());
    assert_eq!(InteriorCell::from_bytes(&bytes).unwrap(), cell);
}
