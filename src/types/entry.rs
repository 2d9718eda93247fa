use crate::types::{
    PageNumber, RowKey,
    error::{DatabaseError, Result},
    row::{LIVE, TOMBSTONE},
};

/// deleteMarker(1) + leftChild(4) + separator(4)
pub const INTERIOR_CELL_SIZE: usize = 9;
pub const LEFT_CHILD_OFFSET: usize = 1;
pub const SEPARATOR_OFFSET: usize = 5;

/// Separator cell of an interior page. Every key under `left_child` is
/// less than or equal to `separator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InteriorCell {
    pub left_child: PageNumber,
    pub separator: RowKey,
}

impl InteriorCell {
    pub fn new(left_child: PageNumber, separator: RowKey) -> Self {
        Self {
            left_child,
            separator,
        }
    }

    pub fn to_bytes(&self) -> [u8; INTERIOR_CELL_SIZE] {
        let mut bytes = [0u8; INTERIOR_CELL_SIZE];
        bytes[0] = LIVE;
        bytes[LEFT_CHILD_OFFSET..SEPARATOR_OFFSET].copy_from_slice(&self.left_child.to_be_bytes());
        bytes[SEPARATOR_OFFSET..].copy_from_slice(&self.separator.to_be_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < INTERIOR_CELL_SIZE {
            return Err(DatabaseError::SerializationError {
                details: format!("interior cell truncated at {} bytes", bytes.len()),
            });
        }
        if bytes[0] == TOMBSTONE {
            return Err(DatabaseError::SerializationError {
                details: "interior cell is tombstoned".to_string(),
            });
        }
        Ok(Self {
            left_child: PageNumber::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
            separator: RowKey::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
        })
    }
}
