use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::{
    config::DatabaseConfig,
    storage::{storage_manager::StorageManager, table_file::TableFile},
    types::error::Result,
};

/// A data directory that is removed when the value is dropped.
pub struct TempDatabase {
    dir: TempDir,
    config: DatabaseConfig,
}

impl TempDatabase {
    pub fn new() -> Result<Self> {
        Self::with_prefix("davisbase_test")
    }

    pub fn with_prefix(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        let config = DatabaseConfig::new(dir.path());
        Ok(Self { dir, config })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config(&self) -> DatabaseConfig {
        self.config.clone()
    }

    pub fn storage_manager(&self) -> Result<StorageManager> {
        StorageManager::open(self.config())
    }

    /// Path for a standalone table file inside the directory.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.path().join(format!("{}.tbl", name))
    }

    /// A fresh table file with `columns` as its column names.
    pub fn table_file(&self, name: &str, columns: &[&str]) -> Result<TableFile> {
        let names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
        TableFile::create(self.file_path(name), &names)
    }
}
