use crate::{
    storage::{DAVISBASE_MAGIC, TEXT_ENCODING_UTF8},
    types::{DATABASE_HEADER_SIZE, PAGE_SIZE, RESERVED_SPACE, error::DatabaseError},
};

/// Database header at the start of page 0 of every table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub page_size: u16,
    pub file_format_write_version: u8,
    pub file_format_read_version: u8,
    pub reserved_space: u8,
    pub max_embedded_payload_fraction: u8,
    pub min_embedded_payload_fraction: u8,
    pub leaf_payload_fraction: u8,
    pub file_change_counter: u32,
    pub database_size_pages: u32,
    pub text_encoding: u32,
    pub reserved: [u8; 20],
    pub version_number: u32,
    /// Value of `file_change_counter` when `version_number` was last written.
    pub version_valid_for: u32,
}

impl Default for DatabaseHeader {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE as u16,
            file_format_write_version: 1,
            file_format_read_version: 1,
            reserved_space: RESERVED_SPACE as u8,
            max_embedded_payload_fraction: 64,
            min_embedded_payload_fraction: 32,
            leaf_payload_fraction: 32,
            file_change_counter: 0,
            database_size_pages: 1,
            text_encoding: TEXT_ENCODING_UTF8,
            reserved: [0; 20],
            version_number: 1,
            version_valid_for: 0,
        }
    }
}

impl DatabaseHeader {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(DATABASE_HEADER_SIZE);

        buffer.extend_from_slice(&(DAVISBASE_MAGIC.len() as u16).to_be_bytes());
        buffer.extend_from_slice(DAVISBASE_MAGIC);
        buffer.extend_from_slice(&self.page_size.to_be_bytes());
        buffer.push(self.file_format_write_version);
        buffer.push(self.file_format_read_version);
        buffer.push(self.reserved_space);
        buffer.push(self.max_embedded_payload_fraction);
        buffer.push(self.min_embedded_payload_fraction);
        buffer.push(self.leaf_payload_fraction);
        buffer.extend_from_slice(&self.file_change_counter.to_be_bytes());
        buffer.extend_from_slice(&self.database_size_pages.to_be_bytes());
        buffer.extend_from_slice(&self.text_encoding.to_be_bytes());
        buffer.extend_from_slice(&self.reserved);
        buffer.extend_from_slice(&self.version_number.to_be_bytes());
        buffer.extend_from_slice(&self.version_valid_for.to_be_bytes());

        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatabaseError> {
        if bytes.len() < DATABASE_HEADER_SIZE {
            return Err(DatabaseError::InvalidHeader {
                reason: format!("header is {} bytes, expected {}", bytes.len(), DATABASE_HEADER_SIZE),
            });
        }

        let magic_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let magic_end = 2 + DAVISBASE_MAGIC.len();
        if magic_len != DAVISBASE_MAGIC.len() || &bytes[2..magic_end] != DAVISBASE_MAGIC {
            return Err(DatabaseError::InvalidHeader {
                reason: "magic string mismatch".to_string(),
            });
        }

        let u16_at = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        let mut reserved = [0u8; 20];
        reserved.copy_from_slice(&bytes[0x28..0x3C]);

        let header = Self {
            page_size: u16_at(0x14),
            file_format_write_version: bytes[0x16],
            file_format_read_version: bytes[0x17],
            reserved_space: bytes[0x18],
            max_embedded_payload_fraction: bytes[0x19],
            min_embedded_payload_fraction: bytes[0x1A],
            leaf_payload_fraction: bytes[0x1B],
            file_change_counter: u32_at(0x1C),
            database_size_pages: u32_at(0x20),
            text_encoding: u32_at(0x24),
            reserved,
            version_number: u32_at(0x3C),
            version_valid_for: u32_at(0x40),
        };

        if header.page_size as usize != PAGE_SIZE {
            return Err(DatabaseError::InvalidHeader {
                reason: format!("page size {} is not supported", header.page_size),
            });
        }
        if header.reserved_space as usize != RESERVED_SPACE {
            return Err(DatabaseError::InvalidHeader {
                reason: format!("reserved space {} is not supported", header.reserved_space),
            });
        }

        Ok(header)
    }

    /// Both change-counter copies agree.
    pub fn is_consistent(&self) -> bool {
        self.file_change_counter == self.version_valid_for
    }
}
