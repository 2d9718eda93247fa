use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    storage::bplus_tree::KeyMode,
    types::{
        error::{DatabaseError, Result},
        value::{NullSlot, TypeCode, Value, pad_text},
    },
};

pub const MAX_IDENTIFIER_LEN: usize = 32;
const MAX_DEFAULT_LEN: usize = 32;

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    DateTime,
    Date,
    /// `TEXT(n)` values are space-padded to `n` bytes; plain `TEXT` is stored
    /// at its exact length.
    Text(Option<u8>),
}

impl ColumnType {
    pub fn parse(declared: &str) -> Result<Self> {
        let upper = declared.trim().to_ascii_uppercase();
        let column_type = match upper.as_str() {
            "TINYINT" => ColumnType::TinyInt,
            "SMALLINT" => ColumnType::SmallInt,
            "INT" | "INTEGER" => ColumnType::Int,
            "BIGINT" => ColumnType::BigInt,
            "REAL" | "FLOAT" => ColumnType::Real,
            "DOUBLE" => ColumnType::Double,
            "DATETIME" => ColumnType::DateTime,
            "DATE" => ColumnType::Date,
            "TEXT" => ColumnType::Text(None),
            other => {
                let width = other
                    .strip_prefix("TEXT(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|n| n.trim().parse::<usize>().ok())
                    .filter(|n| *n > 0 && *n <= TypeCode::MAX_TEXT_LEN)
                    .ok_or_else(|| DatabaseError::InvalidSchema {
                        details: format!("unknown column type '{}'", declared),
                    })?;
                ColumnType::Text(Some(width as u8))
            }
        };
        Ok(column_type)
    }

    /// Null placeholder of the column's natural width.
    pub fn null_value(&self) -> Value {
        Value::Null(match self {
            ColumnType::TinyInt => NullSlot::One,
            ColumnType::SmallInt => NullSlot::Two,
            ColumnType::Int | ColumnType::Real => NullSlot::Four,
            _ => NullSlot::Eight,
        })
    }

    /// Types that can serve directly as the row key.
    pub fn is_integer_key(&self) -> bool {
        matches!(self, ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int)
    }

    /// Converts a front-end value to this type's storage form, checking range
    /// and declared length.
    pub fn coerce(&self, column: &str, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(self.null_value());
        }
        let out_of_range = |shown: String| DatabaseError::OutOfRange {
            column: column.to_string(),
            value: shown,
            column_type: self.to_string(),
        };
        let mismatch = |value: &Value| DatabaseError::TypeMismatch {
            expected: format!("{} for column '{}'", self, column),
            actual: value.kind_name().to_string(),
        };

        match self {
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt => {
                let v = value.as_integer().ok_or_else(|| mismatch(&value))?;
                match self {
                    ColumnType::TinyInt => i8::try_from(v).map(Value::TinyInt),
                    ColumnType::SmallInt => i16::try_from(v).map(Value::SmallInt),
                    ColumnType::Int => i32::try_from(v).map(Value::Int),
                    _ => Ok(Value::BigInt(v)),
                }
                .map_err(|_| out_of_range(v.to_string()))
            }
            ColumnType::Real => {
                let v = value.as_f64().ok_or_else(|| mismatch(&value))?;
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(out_of_range(v.to_string()));
                }
                Ok(Value::Real(v as f32))
            }
            ColumnType::Double => Ok(Value::Double(value.as_f64().ok_or_else(|| mismatch(&value))?)),
            ColumnType::DateTime => match value {
                Value::DateTime(_) => Ok(value),
                Value::Date(secs) => Ok(Value::DateTime(secs)),
                Value::Text(text) => Value::parse_datetime(&text),
                other => other
                    .as_integer()
                    .map(Value::DateTime)
                    .ok_or_else(|| mismatch(&other)),
            },
            ColumnType::Date => match value {
                Value::Date(_) => Ok(value),
                Value::DateTime(secs) => Ok(Value::date_from_timestamp(secs)),
                Value::Text(text) => Value::parse_date(&text),
                other => other
                    .as_integer()
                    .map(Value::date_from_timestamp)
                    .ok_or_else(|| mismatch(&other)),
            },
            ColumnType::Text(width) => {
                let text = match value {
                    Value::Text(text) => text,
                    other => return Err(mismatch(&other)),
                };
                let max = width.map_or(TypeCode::MAX_TEXT_LEN, |w| w as usize);
                if text.len() > max {
                    return Err(DatabaseError::ValueTooLong {
                        column: column.to_string(),
                        max,
                    });
                }
                Ok(Value::Text(match *width {
                    Some(w) => pad_text(&text, w as usize),
                    None => text,
                }))
            }
        }
    }

    /// Parses a default value as stored in the catalog.
    pub fn parse_literal(&self, column: &str, literal: &str) -> Result<Value> {
        if literal.eq_ignore_ascii_case("NULL") {
            return Ok(self.null_value());
        }
        let value = match self {
            ColumnType::TinyInt | ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt => {
                Value::BigInt(literal.trim().parse().map_err(|_| DatabaseError::TypeMismatch {
                    expected: self.to_string(),
                    actual: format!("'{}'", literal),
                })?)
            }
            ColumnType::Real | ColumnType::Double => {
                Value::Double(literal.trim().parse().map_err(|_| DatabaseError::TypeMismatch {
                    expected: self.to_string(),
                    actual: format!("'{}'", literal),
                })?)
            }
            _ => Value::Text(literal.to_string()),
        };
        self.coerce(column, value)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::TinyInt => write!(f, "TINYINT"),
            ColumnType::SmallInt => write!(f, "SMALLINT"),
            ColumnType::Int => write!(f, "INT"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::Real => write!(f, "REAL"),
            ColumnType::Double => write!(f, "DOUBLE"),
            ColumnType::DateTime => write!(f, "DATETIME"),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Text(None) => write!(f, "TEXT"),
            ColumnType::Text(Some(width)) => write!(f, "TEXT({})", width),
        }
    }
}

/// Represents a column definition in a table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
    pub position: usize,
    pub nullable: bool,
    pub default_value: Option<Value>,
    pub primary_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType, position: usize) -> Self {
        Self {
            name: name.into(),
            column_type,
            position,
            nullable: true,
            default_value: None,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default_value: Value) -> Self {
        self.default_value = Some(default_value);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false; // Primary keys are always NOT NULL
        self
    }

    /// Row for `davisbase_columns`.
    pub fn to_catalog_row(&self, database: &str, table_name: &str) -> Result<Vec<Value>> {
        let default = match &self.default_value {
            Some(value) => value.to_string(),
            None => "NULL".to_string(),
        };
        if default.len() > MAX_DEFAULT_LEN {
            return Err(DatabaseError::InvalidSchema {
                details: format!(
                    "default for column '{}' is longer than {} bytes",
                    self.name, MAX_DEFAULT_LEN
                ),
            });
        }
        let position = i8::try_from(self.position).map_err(|_| DatabaseError::InvalidSchema {
            details: format!("column position {} is too large", self.position),
        })?;
        Ok(vec![
            Value::Text(database.to_string()),
            Value::Text(table_name.to_string()),
            Value::Text(self.name.clone()),
            Value::Text(self.column_type.to_string()),
            Value::TinyInt(position),
            Value::Text(default),
            Value::Text(if self.nullable { "YES" } else { "NO " }.to_string()),
            Value::Text(if self.primary_key { "PRI" } else { "   " }.to_string()),
        ])
    }

    /// Create column schema from a `davisbase_columns` row
    pub fn from_catalog_row(values: &[Value]) -> Result<Self> {
        let text = |index: usize, what: &str| -> Result<String> {
            match values.get(index) {
                Some(Value::Text(text)) => Ok(text.trim_end().to_string()),
                _ => Err(DatabaseError::InvalidSchema {
                    details: format!("catalog row has no {}", what),
                }),
            }
        };

        let name = text(2, "column name")?;
        let column_type = ColumnType::parse(&text(3, "data type")?)?;
        let position = match values.get(4) {
            Some(Value::TinyInt(position)) if *position >= 0 => *position as usize,
            _ => {
                return Err(DatabaseError::InvalidSchema {
                    details: format!("invalid ordinal position for column '{}'", name),
                });
            }
        };
        let default = text(5, "column default")?;
        let default_value = if default == "NULL" {
            None
        } else {
            Some(column_type.parse_literal(&name, &default)?)
        };

        Ok(Self {
            nullable: text(6, "nullability")? == "YES",
            primary_key: text(7, "column key")?.eq_ignore_ascii_case("PRI"),
            name,
            column_type,
            position,
            default_value,
        })
    }
}

/// Represents a complete table schema with all column definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|col| col.name.eq_ignore_ascii_case(name))
    }

    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name.eq_ignore_ascii_case(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }

    pub fn primary_key_column(&self) -> Option<(usize, &ColumnSchema)> {
        self.columns.iter().enumerate().find(|(_, col)| col.primary_key)
    }

    /// Integer primary keys double as the row key; anything else gets
    /// surrogate row ids.
    pub fn key_mode(&self) -> KeyMode {
        match self.primary_key_column() {
            Some((index, column)) if column.column_type.is_integer_key() => KeyMode::PrimaryKey(index),
            _ => KeyMode::Surrogate,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_identifier(&self.table_name)?;
        if self.columns.is_empty() {
            return Err(DatabaseError::InvalidSchema {
                details: format!("table '{}' has no columns", self.table_name),
            });
        }
        if self.columns.iter().filter(|col| col.primary_key).count() > 1 {
            return Err(DatabaseError::MultiplePrimaryKeys {
                table: self.table_name.clone(),
            });
        }
        for (index, column) in self.columns.iter().enumerate() {
            check_identifier(&column.name)?;
            if column.position != index {
                return Err(DatabaseError::InvalidSchema {
                    details: format!(
                        "column '{}' has position {}, expected {}",
                        column.name, column.position, index
                    ),
                });
            }
            if self.get_column_index(&column.name) != Some(index) {
                return Err(DatabaseError::InvalidSchema {
                    details: format!("duplicate column '{}'", column.name),
                });
            }
            if let Some(default) = &column.default_value {
                column.column_type.coerce(&column.name, default.clone())?;
            }
        }
        Ok(())
    }

    /// Turns a column-name→value map into a full row in column order:
    /// defaults filled in, NOT NULL and primary-key presence enforced, values
    /// coerced to their declared types.
    pub fn prepare_row(&self, values: &HashMap<String, Value>) -> Result<Vec<Value>> {
        self.check_known_columns(values)?;
        let mut row = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let provided = values
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&column.name))
                .map(|(_, value)| value);
            let value = match provided {
                Some(value) if !value.is_null() => column.column_type.coerce(&column.name, value.clone())?,
                Some(_) if !column.nullable => {
                    return Err(DatabaseError::NotNull {
                        column: column.name.clone(),
                    });
                }
                Some(_) => column.column_type.null_value(),
                None => match &column.default_value {
                    Some(default) => column.column_type.coerce(&column.name, default.clone())?,
                    None if !column.nullable => {
                        return Err(DatabaseError::MissingValue {
                            column: column.name.clone(),
                        });
                    }
                    None => column.column_type.null_value(),
                },
            };
            row.push(value);
        }
        Ok(row)
    }

    /// Coerces `SET` assignments, returning (column index, value) pairs.
    pub fn prepare_assignments(&self, values: &HashMap<String, Value>) -> Result<Vec<(usize, Value)>> {
        self.check_known_columns(values)?;
        let mut assignments = Vec::with_capacity(values.len());
        for (name, value) in values {
            let index = self.get_column_index(name).ok_or_else(|| DatabaseError::ColumnNotFound {
                name: name.clone(),
                table: self.table_name.clone(),
            })?;
            let column = &self.columns[index];
            if value.is_null() && !column.nullable {
                return Err(DatabaseError::NotNull {
                    column: column.name.clone(),
                });
            }
            assignments.push((index, column.column_type.coerce(&column.name, value.clone())?));
        }
        assignments.sort_by_key(|(index, _)| *index);
        Ok(assignments)
    }

    fn check_known_columns(&self, values: &HashMap<String, Value>) -> Result<()> {
        for name in values.keys() {
            if self.get_column_index(name).is_none() {
                return Err(DatabaseError::ColumnNotFound {
                    name: name.clone(),
                    table: self.table_name.clone(),
                });
            }
        }
        Ok(())
    }
}

pub fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DatabaseError::InvalidSchema {
            details: format!(
                "'{}' is not a valid identifier (1-{} characters of [A-Za-z0-9_])",
                name, MAX_IDENTIFIER_LEN
            ),
        })
    }
}

/// Cache of table schemas already read from the catalog
#[derive(Debug, Default)]
pub struct SchemaManager {
    schemas: HashMap<String, TableSchema>,
}

impl SchemaManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table_schema(&mut self, schema: TableSchema) {
        self.schemas.insert(schema.table_name.to_ascii_lowercase(), schema);
    }

    pub fn get_table_schema(&self, table_name: &str) -> Option<&TableSchema> {
        self.schemas.get(&table_name.to_ascii_lowercase())
    }

    pub fn remove_table_schema(&mut self, table_name: &str) -> Option<TableSchema> {
        self.schemas.remove(&table_name.to_ascii_lowercase())
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        self.schemas.contains_key(&table_name.to_ascii_lowercase())
    }
}
