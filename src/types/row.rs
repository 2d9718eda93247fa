use serde::{Deserialize, Serialize};

use crate::types::{
    RowKey,
    error::{DatabaseError, Result},
    value::{self, TypeCode, Value},
};

/// deleteMarker(1) + payloadLength(2) + rowKey(4)
pub const LEAF_CELL_HEADER_SIZE: usize = 7;
const PAYLOAD_HEADER_LEN_SIZE: usize = 2;

pub const DELETE_MARKER_OFFSET: usize = 0;
pub const PAYLOAD_LENGTH_OFFSET: usize = 1;
pub const ROW_KEY_OFFSET: usize = 3;
pub const PAYLOAD_HEADER_OFFSET: usize = LEAF_CELL_HEADER_SIZE;

pub const LIVE: u8 = 0;
pub const TOMBSTONE: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub row_key: RowKey,
    pub values: Vec<Value>,
}

/// A leaf cell as read back from a page.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafCell {
    pub deleted: bool,
    pub row: Row,
    pub type_codes: Vec<TypeCode>,
}

impl Row {
    pub fn new(row_key: RowKey, values: Vec<Value>) -> Self {
        Self { row_key, values }
    }

    pub fn get_value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn type_codes(&self) -> Result<Vec<TypeCode>> {
        self.values.iter().map(Value::type_code).collect()
    }

    /// payloadHeaderLen(2) + one type code per column + value bytes.
    pub fn payload_len(&self) -> Result<usize> {
        let mut len = PAYLOAD_HEADER_LEN_SIZE + self.values.len();
        for value in &self.values {
            len += value.serialized_size()?;
        }
        Ok(len)
    }

    /// On-disk size of the cell, header included.
    pub fn cell_size(&self) -> Result<usize> {
        Ok(LEAF_CELL_HEADER_SIZE + self.payload_len()?)
    }

    pub fn to_cell(&self) -> Result<Vec<u8>> {
        let codes = self.type_codes()?;
        let payload_len = self.payload_len()?;
        if payload_len > u16::MAX as usize {
            return Err(DatabaseError::RecordTooLarge {
                size: payload_len + LEAF_CELL_HEADER_SIZE,
                max: u16::MAX as usize,
            });
        }

        let mut cell = Vec::with_capacity(LEAF_CELL_HEADER_SIZE + payload_len);
        cell.push(LIVE);
        cell.extend_from_slice(&(payload_len as u16).to_be_bytes());
        cell.extend_from_slice(&self.row_key.to_be_bytes());
        cell.extend_from_slice(&((codes.len() + PAYLOAD_HEADER_LEN_SIZE) as u16).to_be_bytes());
        cell.extend(codes.iter().map(|code| code.as_u8()));
        for (code, value) in codes.iter().zip(&self.values) {
            value::encode_into(*code, value, &mut cell)?;
        }
        Ok(cell)
    }

    pub fn from_cell(bytes: &[u8]) -> Result<LeafCell> {
        if bytes.len() < LEAF_CELL_HEADER_SIZE + PAYLOAD_HEADER_LEN_SIZE {
            return Err(truncated(bytes.len()));
        }
        let deleted = bytes[DELETE_MARKER_OFFSET] == TOMBSTONE;
        let payload_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        let row_key = RowKey::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);
        let header_len = u16::from_be_bytes([bytes[7], bytes[8]]) as usize;
        if header_len < PAYLOAD_HEADER_LEN_SIZE || header_len > payload_len {
            return Err(DatabaseError::SerializationError {
                details: format!(
                    "payload header length {} inconsistent with payload length {}",
                    header_len, payload_len
                ),
            });
        }
        let end = LEAF_CELL_HEADER_SIZE + payload_len;
        if bytes.len() < end {
            return Err(truncated(bytes.len()));
        }

        let codes_start = PAYLOAD_HEADER_OFFSET + PAYLOAD_HEADER_LEN_SIZE;
        let codes_end = PAYLOAD_HEADER_OFFSET + header_len;
        let type_codes: Vec<TypeCode> = bytes[codes_start..codes_end]
            .iter()
            .map(|&b| TypeCode::from_u8(b))
            .collect();

        let mut values = Vec::with_capacity(type_codes.len());
        let mut pos = codes_end;
        for code in &type_codes {
            values.push(value::decode(*code, &bytes[pos..end])?);
            pos += code.width();
        }

        Ok(LeafCell {
            deleted,
            row: Row { row_key, values },
            type_codes,
        })
    }
}

/// Offset of column `index`'s type code, relative to the cell start.
pub fn type_code_offset(index: usize) -> usize {
    PAYLOAD_HEADER_OFFSET + PAYLOAD_HEADER_LEN_SIZE + index
}

/// Offset of column `index`'s value bytes, relative to the cell start.
pub fn value_offset(type_codes: &[TypeCode], index: usize) -> usize {
    let preceding: usize = type_codes[..index].iter().map(|code| code.width()).sum();
    PAYLOAD_HEADER_OFFSET + PAYLOAD_HEADER_LEN_SIZE + type_codes.len() + preceding
}

fn truncated(len: usize) -> DatabaseError {
    DatabaseError::SerializationError {
        details: format!("leaf cell truncated at {} bytes", len),
    }
}
