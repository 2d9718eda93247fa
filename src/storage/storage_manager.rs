use std::{collections::HashMap, fs, path::PathBuf};

use tracing::{debug, info, warn};

use crate::{
    config::{COLUMNS_CATALOG, DatabaseConfig, TABLES_CATALOG},
    executor::{
        insert::{Inserter, TableInserter},
        predicate::{BoundPredicate, Predicate},
        result::ResultSet,
        scan::{ScanRange, StoredRow, scan_table},
        update::RowUpdater,
    },
    storage::{
        bplus_tree::BPlusTree,
        catalog::{self, Catalog},
        schema::{SchemaManager, TableSchema},
        table_file::TableFile,
    },
    types::{
        RowKey,
        error::{DatabaseError, Result},
        value::Value,
    },
};

/// Entry point for a front end: table lifecycle plus insert, select, update
/// and delete with at most one predicate.
#[derive(Debug)]
pub struct StorageManager {
    config: DatabaseConfig,
    catalog: Catalog,
    schema_manager: SchemaManager,
}

impl StorageManager {
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        fs::create_dir_all(config.catalog_dir())?;
        fs::create_dir_all(config.table_dir())?;
        let catalog = Catalog::open(&config)?;
        debug!(data_dir = %config.data_dir.display(), database = %config.database, "opened storage");
        Ok(Self {
            config,
            catalog,
            schema_manager: SchemaManager::new(),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// File backing `table_name`; the catalog tables live in the schema
    /// directory.
    pub fn table_path(&self, table_name: &str) -> PathBuf {
        if table_name.eq_ignore_ascii_case(TABLES_CATALOG) {
            self.catalog.tables_path().to_path_buf()
        } else if table_name.eq_ignore_ascii_case(COLUMNS_CATALOG) {
            self.catalog.columns_path().to_path_buf()
        } else {
            self.config.table_path(table_name)
        }
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        schema.validate()?;
        if catalog::is_catalog_table(&schema.table_name) || self.table_exists(&schema.table_name)? {
            return Err(DatabaseError::TableAlreadyExists {
                name: schema.table_name.clone(),
            });
        }
        self.catalog.describe(&schema)?;

        let path = self.table_path(&schema.table_name);
        catalog::create_table_file(&path, &schema)?;
        if let Err(e) = self.catalog.register_table(&schema) {
            // the tables row may already be written when the column rows fail
            if let Err(cleanup) = self.catalog.remove_table(&schema.table_name) {
                warn!(table = %schema.table_name, error = %cleanup, "could not clean catalog after failed create");
            }
            let _ = fs::remove_file(&path);
            return Err(e);
        }

        info!(table = %schema.table_name, columns = schema.columns.len(), path = %path.display(), "created table");
        self.schema_manager.add_table_schema(schema);
        Ok(())
    }

    pub fn table_schema(&mut self, table_name: &str) -> Result<TableSchema> {
        if table_name.eq_ignore_ascii_case(TABLES_CATALOG) {
            return Ok(catalog::tables_catalog_schema());
        }
        if table_name.eq_ignore_ascii_case(COLUMNS_CATALOG) {
            return Ok(catalog::columns_catalog_schema());
        }
        if let Some(schema) = self.schema_manager.get_table_schema(table_name) {
            return Ok(schema.clone());
        }
        let schema = self
            .catalog
            .load_table(table_name)?
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: table_name.to_string(),
            })?;
        self.schema_manager.add_table_schema(schema.clone());
        Ok(schema)
    }

    pub fn table_exists(&mut self, table_name: &str) -> Result<bool> {
        match self.table_schema(table_name) {
            Ok(_) => Ok(true),
            Err(DatabaseError::TableNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        self.catalog.table_names()
    }

    /// Inserts one row given as column name → value. Returns the row key.
    pub fn insert(&mut self, table_name: &str, values: &HashMap<String, Value>) -> Result<RowKey> {
        let schema = self.writable_schema(table_name)?;
        let row = schema.prepare_row(values)?;
        let mut file = TableFile::open(self.table_path(table_name))?;
        let row_key = TableInserter::new(&mut file, &schema.table_name, schema.key_mode()).insert(row)?;
        self.catalog.record_change(&schema.table_name, 1)?;
        Ok(row_key)
    }

    pub fn select(&mut self, table_name: &str, predicate: Option<&Predicate>) -> Result<ResultSet> {
        let schema = self.table_schema(table_name)?;
        let bound = bind(&schema, predicate)?;
        let mut file = TableFile::open(self.table_path(table_name))?;
        let rows = scan_table(&mut file, schema.key_mode(), bound.as_ref())?;
        Ok(ResultSet::new(schema.column_names(), rows))
    }

    /// Applies `assignments` to every matching row. Returns the number of
    /// rows changed.
    pub fn update(
        &mut self,
        table_name: &str,
        assignments: &HashMap<String, Value>,
        predicate: Option<&Predicate>,
    ) -> Result<usize> {
        let schema = self.writable_schema(table_name)?;
        let assignments = schema.prepare_assignments(assignments)?;
        let bound = bind(&schema, predicate)?;
        let key_mode = schema.key_mode();

        let mut file = TableFile::open(self.table_path(table_name))?;
        let range = ScanRange::plan(&mut BPlusTree::new(&mut file), key_mode, bound.as_ref())?;
        let updated = RowUpdater::new(&mut file, key_mode).update(range, |row| accepts(bound.as_ref(), row), &assignments)?;
        if updated > 0 {
            self.catalog.record_change(&schema.table_name, 0)?;
        }
        debug!(table = %schema.table_name, updated, "updated rows");
        Ok(updated)
    }

    /// Deletes every matching row. Returns the number of rows removed.
    pub fn delete(&mut self, table_name: &str, predicate: Option<&Predicate>) -> Result<usize> {
        let schema = self.writable_schema(table_name)?;
        let bound = bind(&schema, predicate)?;
        let key_mode = schema.key_mode();

        let mut file = TableFile::open(self.table_path(table_name))?;
        let range = ScanRange::plan(&mut BPlusTree::new(&mut file), key_mode, bound.as_ref())?;
        let deleted = RowUpdater::new(&mut file, key_mode).delete(range, |row| accepts(bound.as_ref(), row))?;
        if deleted > 0 {
            self.catalog.record_change(&schema.table_name, -(deleted as i64))?;
        }
        debug!(table = %schema.table_name, deleted, "deleted rows");
        Ok(deleted)
    }

    pub fn drop_table(&mut self, table_name: &str) -> Result<()> {
        let schema = self.writable_schema(table_name)?;
        self.catalog.remove_table(&schema.table_name)?;
        let path = self.table_path(&schema.table_name);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        self.schema_manager.remove_table_schema(&schema.table_name);
        info!(table = %schema.table_name, "dropped table");
        Ok(())
    }

    /// TABLE_ROWS as recorded in the catalog.
    pub fn row_count(&mut self, table_name: &str) -> Result<i64> {
        let schema = self.table_schema(table_name)?;
        self.catalog
            .row_count(&schema.table_name)?
            .ok_or_else(|| DatabaseError::TableNotFound {
                name: table_name.to_string(),
            })
    }

    fn writable_schema(&mut self, table_name: &str) -> Result<TableSchema> {
        if catalog::is_catalog_table(table_name) {
            return Err(DatabaseError::InvalidSchema {
                details: format!("catalog table '{}' cannot be modified directly", table_name),
            });
        }
        self.table_schema(table_name)
    }
}

fn bind(schema: &TableSchema, predicate: Option<&Predicate>) -> Result<Option<BoundPredicate>> {
    predicate.map(|predicate| predicate.bind(schema)).transpose()
}

fn accepts(predicate: Option<&BoundPredicate>, row: &StoredRow) -> Result<bool> {
    match predicate {
        Some(predicate) => predicate.evaluate(row),
        None => Ok(true),
    }
}
