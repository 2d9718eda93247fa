use crate::{
    storage::{
        bplus_tree::{BPlusTree, KeyMode, row_key_from_value},
        table_file::TableFile,
    },
    types::{
        RowKey,
        error::{DatabaseError, Result},
        row::Row,
        value::Value,
    },
};

/// Trait for inserting data into database tables
pub trait Inserter {
    /// Insert a single row and return the row key it was stored under
    fn insert(&mut self, values: Vec<Value>) -> Result<RowKey>;

    /// Insert multiple rows, stopping at the first failure
    fn insert_batch(&mut self, rows: Vec<Vec<Value>>) -> Result<Vec<RowKey>>;

    /// Get the table name this inserter operates on
    fn table_name(&self) -> &str;
}

/// Inserts already-validated rows into one table file, assigning row keys
/// according to the table's key mode.
pub struct TableInserter<'f> {
    table_name: String,
    file: &'f mut TableFile,
    key_mode: KeyMode,
}

impl<'f> TableInserter<'f> {
    pub fn new(file: &'f mut TableFile, table_name: impl Into<String>, key_mode: KeyMode) -> Self {
        Self {
            table_name: table_name.into(),
            file,
            key_mode,
        }
    }

    fn row_key(&mut self, values: &[Value]) -> Result<RowKey> {
        match self.key_mode {
            KeyMode::PrimaryKey(index) => {
                let value = values
                    .get(index)
                    .ok_or(DatabaseError::ColumnIndexOutOfBounds { index })?;
                row_key_from_value(value)
            }
            KeyMode::Surrogate => BPlusTree::new(self.file).next_row_key(),
        }
    }
}

impl Inserter for TableInserter<'_> {
    fn insert(&mut self, values: Vec<Value>) -> Result<RowKey> {
        let row_key = self.row_key(&values)?;
        let row = Row::new(row_key, values);
        BPlusTree::new(self.file).insert(&row, self.key_mode.descent(row_key))?;
        self.file.commit()?;
        Ok(row_key)
    }

    fn insert_batch(&mut self, rows: Vec<Vec<Value>>) -> Result<Vec<RowKey>> {
        rows.into_iter().map(|values| self.insert(values)).collect()
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}
