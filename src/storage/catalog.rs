use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use crate::{
    config::{COLUMNS_CATALOG, DatabaseConfig, TABLES_CATALOG},
    executor::{
        insert::{Inserter, TableInserter},
        scan::{ScanRange, StoredRow, collect_rows},
        update::RowUpdater,
    },
    storage::{
        bplus_tree::{BPlusTree, KeyMode},
        schema::{ColumnSchema, ColumnType, TableSchema, check_identifier},
        table_file::TableFile,
    },
    types::{
        error::{DatabaseError, Result},
        value::{TypeCode, Value},
    },
};

const TABLE_CATALOG_NAME: &str = "def";
const TABLE_TYPE: &str = "BASE TABLE";
const ENGINE: &str = "DavisBase";
const ROW_FORMAT: &str = "Dynamic";

// davisbase_tables column positions
const TABLES_SCHEMA: usize = 1;
const TABLES_NAME: usize = 2;
const TABLES_ROWS: usize = 6;
const TABLES_UPDATE_TIME: usize = 9;

// davisbase_columns column positions
const COLUMNS_SCHEMA: usize = 0;
const COLUMNS_TABLE: usize = 1;
const COLUMNS_POSITION: usize = 4;

pub fn is_catalog_table(name: &str) -> bool {
    name.eq_ignore_ascii_case(TABLES_CATALOG) || name.eq_ignore_ascii_case(COLUMNS_CATALOG)
}

/// Layout of `davisbase_tables`.
pub fn tables_catalog_schema() -> TableSchema {
    let text = |name: &str, position| ColumnSchema::new(name, ColumnType::Text(None), position);
    TableSchema::new(
        TABLES_CATALOG,
        vec![
            text("TABLE_CATALOG", 0).not_null(),
            text("TABLE_SCHEMA", 1).not_null(),
            text("TABLE_NAME", 2).not_null(),
            text("TABLE_TYPE", 3),
            text("ENGINE", 4),
            text("ROW_FORMAT", 5),
            ColumnSchema::new("TABLE_ROWS", ColumnType::Int, 6).not_null(),
            ColumnSchema::new("MAX_RECORD_LENGTH", ColumnType::Int, 7),
            ColumnSchema::new("CREATE_TIME", ColumnType::DateTime, 8),
            ColumnSchema::new("UPDATE_TIME", ColumnType::DateTime, 9),
            ColumnSchema::new("CHECK_TIME", ColumnType::DateTime, 10),
        ],
    )
}

/// Layout of `davisbase_columns`.
pub fn columns_catalog_schema() -> TableSchema {
    let text = |name: &str, position| ColumnSchema::new(name, ColumnType::Text(None), position).not_null();
    TableSchema::new(
        COLUMNS_CATALOG,
        vec![
            text("TABLE_SCHEMA", 0),
            text("TABLE_NAME", 1),
            text("COLUMN_NAME", 2),
            text("DATA_TYPE", 3),
            ColumnSchema::new("ORDINAL_POSITION", ColumnType::TinyInt, 4).not_null(),
            text("COLUMN_DEFAULT", 5),
            ColumnSchema::new("IS_NULLABLE", ColumnType::Text(Some(3)), 6).not_null(),
            ColumnSchema::new("COLUMN_KEY", ColumnType::Text(Some(3)), 7).not_null(),
        ],
    )
}

/// The two catalog table files. Each operation opens the file it needs and
/// closes it before returning.
#[derive(Debug, Clone)]
pub struct Catalog {
    database: String,
    tables_path: PathBuf,
    columns_path: PathBuf,
}

impl Catalog {
    /// Opens the catalog of `config`, creating empty catalog files on first
    /// use.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        check_identifier(&config.database)?;
        let catalog = Self {
            database: config.database.clone(),
            tables_path: config.tables_catalog_path(),
            columns_path: config.columns_catalog_path(),
        };
        ensure_table_file(&catalog.tables_path, &tables_catalog_schema())?;
        ensure_table_file(&catalog.columns_path, &columns_catalog_schema())?;
        Ok(catalog)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn tables_path(&self) -> &Path {
        &self.tables_path
    }

    pub fn columns_path(&self) -> &Path {
        &self.columns_path
    }

    /// Builds every catalog row for `schema` without writing anything, so a
    /// schema that cannot be described fails before its file is created.
    pub fn describe(&self, schema: &TableSchema) -> Result<(Vec<Value>, Vec<Vec<Value>>)> {
        let now = Value::DateTime(Utc::now().timestamp());
        let max_record_length = schema
            .columns
            .iter()
            .map(|column| max_width(column.column_type))
            .sum::<usize>();
        let table_row = vec![
            Value::Text(TABLE_CATALOG_NAME.to_string()),
            Value::Text(self.database.clone()),
            Value::Text(schema.table_name.clone()),
            Value::Text(TABLE_TYPE.to_string()),
            Value::Text(ENGINE.to_string()),
            Value::Text(ROW_FORMAT.to_string()),
            Value::Int(0),
            Value::Int(max_record_length as i32),
            now.clone(),
            now,
            ColumnType::DateTime.null_value(),
        ];
        let column_rows = schema
            .columns
            .iter()
            .map(|column| column.to_catalog_row(&self.database, &schema.table_name))
            .collect::<Result<Vec<_>>>()?;
        Ok((table_row, column_rows))
    }

    pub fn register_table(&self, schema: &TableSchema) -> Result<()> {
        let (table_row, column_rows) = self.describe(schema)?;

        let mut tables = TableFile::open(&self.tables_path)?;
        TableInserter::new(&mut tables, TABLES_CATALOG, KeyMode::Surrogate).insert(table_row)?;

        let mut columns = TableFile::open(&self.columns_path)?;
        TableInserter::new(&mut columns, COLUMNS_CATALOG, KeyMode::Surrogate).insert_batch(column_rows)?;

        debug!(table = %schema.table_name, database = %self.database, "registered table in catalog");
        Ok(())
    }

    /// Schema of `table_name` rebuilt from its `davisbase_columns` rows, or
    /// `None` if the table is not registered.
    pub fn load_table(&self, table_name: &str) -> Result<Option<TableSchema>> {
        let mut rows = self.matching(&self.columns_path, COLUMNS_SCHEMA, COLUMNS_TABLE, table_name)?;
        if rows.is_empty() {
            return Ok(None);
        }
        rows.sort_by_key(|row| row.values[COLUMNS_POSITION].as_integer().unwrap_or_default());
        let columns = rows
            .iter()
            .map(|row| ColumnSchema::from_catalog_row(&row.values))
            .collect::<Result<Vec<_>>>()?;

        let stored_name = self
            .table_row(table_name)?
            .and_then(|row| text_at(&row, TABLES_NAME).map(str::to_string))
            .unwrap_or_else(|| table_name.to_string());
        Ok(Some(TableSchema::new(stored_name, columns)))
    }

    /// Tables of this database, in creation order.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let rows = self.scan(&self.tables_path, |row| {
            Ok(text_at(row, TABLES_SCHEMA) == Some(self.database.as_str()))
        })?;
        Ok(rows
            .iter()
            .filter_map(|row| text_at(row, TABLES_NAME).map(str::to_string))
            .collect())
    }

    pub fn row_count(&self, table_name: &str) -> Result<Option<i64>> {
        Ok(self
            .table_row(table_name)?
            .and_then(|row| row.values[TABLES_ROWS].as_integer()))
    }

    /// Adds `delta` to TABLE_ROWS and stamps UPDATE_TIME. Both columns keep
    /// their width, so the catalog cell is rewritten in place.
    pub fn record_change(&self, table_name: &str, delta: i64) -> Result<()> {
        let Some(row) = self.table_row(table_name)? else {
            return Err(DatabaseError::TableNotFound {
                name: table_name.to_string(),
            });
        };
        let current = row.values[TABLES_ROWS].as_integer().unwrap_or_default();
        let count = i32::try_from((current + delta).max(0)).map_err(|_| DatabaseError::OutOfRange {
            column: "TABLE_ROWS".to_string(),
            value: (current + delta).to_string(),
            column_type: ColumnType::Int.to_string(),
        })?;

        let mut file = TableFile::open(&self.tables_path)?;
        let range = ScanRange::full(&mut BPlusTree::new(&mut file))?;
        RowUpdater::new(&mut file, KeyMode::Surrogate).update(
            range,
            |candidate| Ok(candidate.row_key == row.row_key),
            &[
                (TABLES_ROWS, Value::Int(count)),
                (TABLES_UPDATE_TIME, Value::DateTime(Utc::now().timestamp())),
            ],
        )?;
        Ok(())
    }

    /// Tombstones every catalog row of `table_name`. Returns the number of
    /// rows removed from both files.
    pub fn remove_table(&self, table_name: &str) -> Result<usize> {
        let mut removed = 0;
        for (path, schema_column, name_column) in [
            (&self.tables_path, TABLES_SCHEMA, TABLES_NAME),
            (&self.columns_path, COLUMNS_SCHEMA, COLUMNS_TABLE),
        ] {
            let mut file = TableFile::open(path)?;
            let range = ScanRange::full(&mut BPlusTree::new(&mut file))?;
            removed += RowUpdater::new(&mut file, KeyMode::Surrogate).delete(range, |row| {
                Ok(self.belongs_to(row, schema_column, name_column, table_name))
            })?;
        }
        debug!(table = %table_name, removed, "removed table from catalog");
        Ok(removed)
    }

    fn table_row(&self, table_name: &str) -> Result<Option<StoredRow>> {
        Ok(self
            .matching(&self.tables_path, TABLES_SCHEMA, TABLES_NAME, table_name)?
            .into_iter()
            .next())
    }

    fn matching(
        &self,
        path: &Path,
        schema_column: usize,
        name_column: usize,
        table_name: &str,
    ) -> Result<Vec<StoredRow>> {
        self.scan(path, |row| Ok(self.belongs_to(row, schema_column, name_column, table_name)))
    }

    fn belongs_to(&self, row: &StoredRow, schema_column: usize, name_column: usize, table_name: &str) -> bool {
        text_at(row, schema_column) == Some(self.database.as_str())
            && text_at(row, name_column).is_some_and(|name| name.eq_ignore_ascii_case(table_name))
    }

    fn scan<F>(&self, path: &Path, filter: F) -> Result<Vec<StoredRow>>
    where
        F: FnMut(&StoredRow) -> Result<bool>,
    {
        let mut file = TableFile::open(path)?;
        let range = ScanRange::full(&mut BPlusTree::new(&mut file))?;
        collect_rows(&mut file, range, filter)
    }
}

/// Creates a table file with its schema page and an empty leaf root.
pub fn create_table_file(path: &Path, schema: &TableSchema) -> Result<TableFile> {
    let mut file = TableFile::create(path, &schema.column_names())?;
    BPlusTree::new(&mut file).ensure_root()?;
    file.commit()?;
    Ok(file)
}

fn ensure_table_file(path: &Path, schema: &TableSchema) -> Result<()> {
    if !path.exists() {
        create_table_file(path, schema)?;
    }
    Ok(())
}

fn text_at(row: &StoredRow, index: usize) -> Option<&str> {
    row.values.get(index).and_then(Value::as_text).map(str::trim_end)
}

fn max_width(column_type: ColumnType) -> usize {
    match column_type {
        ColumnType::TinyInt => 1,
        ColumnType::SmallInt => 2,
        ColumnType::Int | ColumnType::Real => 4,
        ColumnType::BigInt | ColumnType::Double | ColumnType::DateTime | ColumnType::Date => 8,
        ColumnType::Text(Some(width)) => width as usize,
        ColumnType::Text(None) => TypeCode::MAX_TEXT_LEN,
    }
}
