use crate::types::{
    CELL_CONTENT_END, CELL_POINTER_SIZE, DATABASE_HEADER_SIZE, PAGE_HEADER_SIZE, PAGE_SIZE,
    PageNumber, RowKey, SCHEMA_PAGE, SCHEMA_PAGE_HEADER_SIZE,
    entry::{INTERIOR_CELL_SIZE, LEFT_CHILD_OFFSET, SEPARATOR_OFFSET},
    error::{DatabaseError, Result},
    row::{DELETE_MARKER_OFFSET, LEAF_CELL_HEADER_SIZE, PAYLOAD_LENGTH_OFFSET, ROW_KEY_OFFSET, TOMBSTONE},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageType {
    InteriorIndex = 2,
    InteriorTable = 5,
    LeafIndex = 10,
    LeafTable = 13,
}

impl PageType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            2 => Ok(PageType::InteriorIndex),
            5 => Ok(PageType::InteriorTable),
            10 => Ok(PageType::LeafIndex),
            13 => Ok(PageType::LeafTable),
            _ => Err(DatabaseError::InvalidPageType(value)),
        }
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, PageType::LeafTable | PageType::LeafIndex)
    }
}

// Header field offsets, relative to the start of the page header.
const FLAG_OFFSET: usize = 0;
const FIRST_FREE_BLOCK_OFFSET: usize = 1;
const CELL_COUNT_OFFSET: usize = 3;
const CELL_CONTENT_START_OFFSET: usize = 5;
const FRAGMENTED_BYTES_OFFSET: usize = 7;
const RIGHT_POINTER_OFFSET: usize = 8;

/// A byte position inside one page. Offsets are page-relative and checked
/// against the page size; only the file layer turns them into file offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageAddress {
    page_number: PageNumber,
    offset: u16,
}

impl PageAddress {
    pub fn new(page_number: PageNumber, offset: usize) -> Result<Self> {
        if offset >= PAGE_SIZE {
            return Err(DatabaseError::OutOfBounds {
                page_number,
                offset,
                len: 0,
            });
        }
        Ok(Self {
            page_number,
            offset: offset as u16,
        })
    }

    pub fn page_number(&self) -> PageNumber {
        self.page_number
    }

    pub fn offset(&self) -> usize {
        self.offset as usize
    }

    pub(crate) fn file_offset(&self) -> u64 {
        self.page_number as u64 * PAGE_SIZE as u64 + self.offset as u64
    }
}

/*
 * Page Layout on Disk
 * ┌─────────────────────────────────────────────────────────────────┐
 * │ [page 0 only: DATABASE HEADER, 0x00..0x44]                       │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    PAGE HEADER (12 bytes, 8 on page 0)           │
 * │  flag(1) | first_free_block(2) | cell_count(2) |                 │
 * │  cell_content_start(2) | fragmented_bytes(1) | right_pointer(4)  │
 * ├─────────────────────────────────────────────────────────────────┤
 * │               CELL POINTER ARRAY (2 bytes each, key order)       │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    UNALLOCATED                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                   CELL CONTENT (grows downward)                  │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                   RESERVED (4 bytes)                             │
 * └─────────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub page_number: PageNumber,
    pub page_type: PageType,
    pub first_free_block: u16,
    pub cell_count: u16,
    pub cell_content_start: u16,
    pub fragmented_bytes: u8,
    /// Leaf: next leaf in key order, 0 at the end of the chain.
    /// Interior: child holding keys above every separator.
    pub right_pointer: PageNumber,

    data: Vec<u8>,
}

impl Page {
    pub fn new(page_number: PageNumber, page_type: PageType) -> Self {
        Self {
            page_number,
            page_type,
            first_free_block: 0,
            cell_count: 0,
            cell_content_start: CELL_CONTENT_END as u16,
            fragmented_bytes: 0,
            right_pointer: 0,
            data: vec![0u8; PAGE_SIZE],
        }
    }

    pub fn from_bytes(page_number: PageNumber, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::corrupted(
                page_number,
                format!("expected {} bytes, got {}", PAGE_SIZE, bytes.len()),
            ));
        }
        let h = header_offset(page_number);
        let page_type = PageType::from_u8(bytes[h + FLAG_OFFSET])?;
        let read_u16 = |at: usize| u16::from_be_bytes([bytes[h + at], bytes[h + at + 1]]);

        let page = Self {
            page_number,
            page_type,
            first_free_block: read_u16(FIRST_FREE_BLOCK_OFFSET),
            cell_count: read_u16(CELL_COUNT_OFFSET),
            cell_content_start: read_u16(CELL_CONTENT_START_OFFSET),
            fragmented_bytes: bytes[h + FRAGMENTED_BYTES_OFFSET],
            right_pointer: if page_number == SCHEMA_PAGE {
                0
            } else {
                let at = h + RIGHT_POINTER_OFFSET;
                PageNumber::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
            },
            data: bytes.to_vec(),
        };

        let content_start = page.cell_content_start as usize;
        if content_start > CELL_CONTENT_END || page.pointer_array_end() > content_start {
            return Err(DatabaseError::corrupted(
                page_number,
                format!(
                    "cell content start {} conflicts with {} cell pointers",
                    content_start, page.cell_count
                ),
            ));
        }
        Ok(page)
    }

    /// The full page image with the header fields written in. For page 0 the
    /// database header region is whatever this page was read with.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.data.clone();
        let h = self.header_offset();
        let header = self.header_bytes();
        bytes[h..h + header.len()].copy_from_slice(&header);
        bytes
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let mut header = Vec::with_capacity(PAGE_HEADER_SIZE);
        // The schema root is always flagged as a table leaf.
        let flag = if self.is_schema_page() {
            PageType::LeafTable.as_u8()
        } else {
            self.page_type.as_u8()
        };
        header.push(flag);
        header.extend_from_slice(&self.first_free_block.to_be_bytes());
        header.extend_from_slice(&self.cell_count.to_be_bytes());
        header.extend_from_slice(&self.cell_content_start.to_be_bytes());
        header.push(self.fragmented_bytes);
        if !self.is_schema_page() {
            header.extend_from_slice(&self.right_pointer.to_be_bytes());
        }
        header
    }

    pub fn is_leaf(&self) -> bool {
        self.page_type.is_leaf()
    }

    pub fn is_schema_page(&self) -> bool {
        self.page_number == SCHEMA_PAGE
    }

    pub fn header_offset(&self) -> usize {
        header_offset(self.page_number)
    }

    pub fn header_size(&self) -> usize {
        if self.is_schema_page() {
            SCHEMA_PAGE_HEADER_SIZE
        } else {
            PAGE_HEADER_SIZE
        }
    }

    pub fn cell_pointer_offset(&self) -> usize {
        self.header_offset() + self.header_size()
    }

    fn pointer_array_end(&self) -> usize {
        self.cell_pointer_offset() + self.cell_count as usize * CELL_POINTER_SIZE
    }

    /// Bytes between the end of the pointer array and the cell content area.
    pub fn unallocated_space(&self) -> usize {
        (self.cell_content_start as usize).saturating_sub(self.pointer_array_end())
    }

    pub fn address(&self, offset: usize) -> Result<PageAddress> {
        PageAddress::new(self.page_number, offset)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn check(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).is_none_or(|end| end > PAGE_SIZE) {
            return Err(DatabaseError::OutOfBounds {
                page_number: self.page_number,
                offset,
                len,
            });
        }
        Ok(())
    }

    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.check(offset, len)?;
        Ok(&self.data[offset..offset + len])
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.check(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32> {
        let b = self.slice(offset, 4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.check(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        self.write_bytes(offset, &[value])
    }

    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<()> {
        self.write_bytes(offset, &value.to_be_bytes())
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.write_bytes(offset, &value.to_be_bytes())
    }

    pub fn fill(&mut self, offset: usize, len: usize, byte: u8) -> Result<()> {
        self.check(offset, len)?;
        self.data[offset..offset + len].fill(byte);
        Ok(())
    }

    pub fn cell_pointers(&self) -> Result<Vec<u16>> {
        let start = self.cell_pointer_offset();
        (0..self.cell_count as usize)
            .map(|i| self.read_u16(start + i * CELL_POINTER_SIZE))
            .collect()
    }

    /// Rewrites the pointer array and cell count. Stale trailing entries are
    /// zeroed.
    pub fn set_cell_pointers(&mut self, pointers: &[u16]) -> Result<()> {
        let start = self.cell_pointer_offset();
        let old_end = self.pointer_array_end();
        let new_end = start + pointers.len() * CELL_POINTER_SIZE;
        if new_end > self.cell_content_start as usize {
            return Err(DatabaseError::PageFull {
                page_number: self.page_number,
            });
        }
        for (i, pointer) in pointers.iter().enumerate() {
            self.write_u16(start + i * CELL_POINTER_SIZE, *pointer)?;
        }
        if old_end > new_end {
            self.fill(new_end, old_end - new_end, 0)?;
        }
        self.cell_count = pointers.len() as u16;
        Ok(())
    }

    /// Size of the cell at `offset`, header included.
    pub fn cell_size(&self, offset: usize) -> Result<usize> {
        if self.is_schema_page() {
            // length(2) | column id(4) | name
            return Ok(6 + self.read_u16(offset)? as usize);
        }
        if self.is_leaf() {
            Ok(LEAF_CELL_HEADER_SIZE + self.read_u16(offset + PAYLOAD_LENGTH_OFFSET)? as usize)
        } else {
            Ok(INTERIOR_CELL_SIZE)
        }
    }

    pub fn cell(&self, offset: usize) -> Result<&[u8]> {
        let size = self.cell_size(offset)?;
        self.slice(offset, size)
    }

    /// Row key of a leaf cell or separator of an interior cell.
    pub fn cell_key(&self, offset: usize) -> Result<RowKey> {
        if self.is_leaf() {
            self.read_i32(offset + ROW_KEY_OFFSET)
        } else {
            self.read_i32(offset + SEPARATOR_OFFSET)
        }
    }

    pub fn left_child(&self, offset: usize) -> Result<PageNumber> {
        self.read_u32(offset + LEFT_CHILD_OFFSET)
    }

    pub fn set_left_child(&mut self, offset: usize, child: PageNumber) -> Result<()> {
        self.write_u32(offset + LEFT_CHILD_OFFSET, child)
    }

    pub fn is_tombstoned(&self, offset: usize) -> Result<bool> {
        Ok(self.read_u8(offset + DELETE_MARKER_OFFSET)? == TOMBSTONE)
    }

    /// Keys of the live cells, in pointer (ascending key) order.
    pub fn keys(&self) -> Result<Vec<RowKey>> {
        let mut keys = Vec::with_capacity(self.cell_count as usize);
        for pointer in self.cell_pointers()? {
            if !self.is_tombstoned(pointer as usize)? {
                keys.push(self.cell_key(pointer as usize)?);
            }
        }
        Ok(keys)
    }

    /// Copies `cell` to the low end of the content area. The caller still has
    /// to register its pointer.
    pub fn append_cell(&mut self, cell: &[u8]) -> Result<u16> {
        if self.unallocated_space() < cell.len() + CELL_POINTER_SIZE {
            return Err(DatabaseError::PageFull {
                page_number: self.page_number,
            });
        }
        let offset = self.cell_content_start as usize - cell.len();
        self.write_bytes(offset, cell)?;
        self.cell_content_start = offset as u16;
        Ok(offset as u16)
    }

    /// Adds `offset` to the pointer array, keeping it sorted by key.
    pub fn insert_cell_pointer(&mut self, offset: u16) -> Result<()> {
        let key = self.cell_key(offset as usize)?;
        let mut pointers = self.cell_pointers()?;
        let mut position = pointers.len();
        for (i, pointer) in pointers.iter().enumerate() {
            if self.cell_key(*pointer as usize)? > key {
                position = i;
                break;
            }
        }
        pointers.insert(position, offset);
        self.set_cell_pointers(&pointers)
    }

    pub fn remove_cell_pointer(&mut self, offset: u16) -> Result<bool> {
        let mut pointers = self.cell_pointers()?;
        let before = pointers.len();
        pointers.retain(|pointer| *pointer != offset);
        if pointers.len() == before {
            return Ok(false);
        }
        self.set_cell_pointers(&pointers)?;
        Ok(true)
    }

    /// Marks the cell deleted and drops its pointer. Free-space bookkeeping is
    /// left to the caller.
    pub fn tombstone(&mut self, offset: u16) -> Result<()> {
        self.write_u8(offset as usize + DELETE_MARKER_OFFSET, TOMBSTONE)?;
        self.remove_cell_pointer(offset)?;
        Ok(())
    }

    /// Empties the page in place: no cells, no free blocks, no right pointer.
    pub fn reset(&mut self, page_type: PageType) {
        let h = self.header_offset();
        self.data[h..].fill(0);
        self.page_type = page_type;
        self.first_free_block = 0;
        self.cell_count = 0;
        self.cell_content_start = CELL_CONTENT_END as u16;
        self.fragmented_bytes = 0;
        self.right_pointer = 0;
    }
}

fn header_offset(page_number: PageNumber) -> usize {
    if page_number == SCHEMA_PAGE {
        DATABASE_HEADER_SIZE
    } else {
        0
    }
}
