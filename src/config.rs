use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CATALOG_DIR: &str = "davisbase_schemas";
pub const TABLES_DIR: &str = "davisbase_tables";
pub const TABLES_CATALOG: &str = "davisbase_tables";
pub const COLUMNS_CATALOG: &str = "davisbase_columns";
pub const DEFAULT_DATABASE: &str = "davisbase";
pub const TABLE_FILE_EXTENSION: &str = "tbl";

/// Where table files live on disk.
///
/// ```text
/// data_dir/
/// ├── davisbase_schemas/
/// │   ├── davisbase_tables.tbl
/// │   └── davisbase_columns.tbl
/// └── davisbase_tables/
///     └── <database>/<table>.tbl
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub data_dir: PathBuf,
    pub database: String,
}

impl DatabaseConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            database: DEFAULT_DATABASE.to_string(),
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.data_dir.join(CATALOG_DIR)
    }

    pub fn table_dir(&self) -> PathBuf {
        self.data_dir.join(TABLES_DIR).join(&self.database)
    }

    pub fn tables_catalog_path(&self) -> PathBuf {
        self.catalog_dir()
            .join(TABLES_CATALOG)
            .with_extension(TABLE_FILE_EXTENSION)
    }

    pub fn columns_catalog_path(&self) -> PathBuf {
        self.catalog_dir()
            .join(COLUMNS_CATALOG)
            .with_extension(TABLE_FILE_EXTENSION)
    }

    /// File of a user table. Names are case-insensitive, so the file name is
    /// lowercased.
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        self.table_dir()
            .join(table_name.to_ascii_lowercase())
            .with_extension(TABLE_FILE_EXTENSION)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::new("data")
    }
}
