use std::collections::HashMap;

use crate::{
    executor::scan::StoredRow,
    types::{
        RowKey,
        value::{TypeCode, Value},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub row_key: RowKey,
    pub values: Vec<Value>,
    pub type_codes: Vec<TypeCode>,
}

impl From<StoredRow> for ResultRow {
    fn from(row: StoredRow) -> Self {
        Self {
            row_key: row.row_key,
            values: row.values,
            type_codes: row.type_codes,
        }
    }
}

/// Rows returned by a select, in row-key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<StoredRow>) -> Self {
        Self {
            columns,
            rows: rows.into_iter().map(ResultRow::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_keys(&self) -> Vec<RowKey> {
        self.rows.iter().map(|row| row.row_key).collect()
    }

    /// Value of `column` (case-insensitive) in row `row`.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self
            .columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))?;
        self.rows.get(row)?.values.get(index)
    }

    pub fn to_maps(&self) -> Vec<HashMap<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.values.iter().cloned())
                    .collect()
            })
            .collect()
    }
}
