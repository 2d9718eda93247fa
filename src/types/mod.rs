pub mod entry;
pub mod error;
pub mod page;
pub mod row;
pub mod value;

// Common type aliases
pub type PageNumber = u32;
pub type RowKey = i32;

// File format constants
pub const PAGE_SIZE: usize = 512;
pub const DEGREE: usize = 4; // max cells per page before a split is forced
pub const RESERVED_SPACE: usize = 4; // unused trailing bytes of every page
pub const DATABASE_HEADER_SIZE: usize = 0x44;
pub const SCHEMA_PAGE_HEADER_SIZE: usize = 8; // no right pointer on page 0
pub const PAGE_HEADER_SIZE: usize = 12;
pub const CELL_POINTER_SIZE: usize = 2;
pub const CELL_CONTENT_END: usize = PAGE_SIZE - RESERVED_SPACE;

pub const SCHEMA_PAGE: PageNumber = 0;
pub const ROOT_PAGE: PageNumber = 1;

/// Largest leaf cell for which `DEGREE - 1` cells and their pointers always
/// fit in a single page.
pub const MAX_LEAF_CELL_SIZE: usize =
    (CELL_CONTENT_END - PAGE_HEADER_SIZE) / (DEGREE - 1) - CELL_POINTER_SIZE;
