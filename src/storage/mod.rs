pub mod bplus_tree;
pub mod catalog;
pub mod free_space;
pub mod header;
pub mod schema;
pub mod storage_manager;
pub mod table_file;

pub(crate) const DAVISBASE_MAGIC: &[u8] = b"DavisBase format 1";
pub(crate) const TEXT_ENCODING_UTF8: u32 = 2;
