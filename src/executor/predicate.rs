use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    executor::scan::StoredRow,
    storage::schema::TableSchema,
    types::{
        error::{DatabaseError, Result},
        value::Value,
    },
};

/// Comparison operators for predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl ComparisonOp {
    pub fn matches(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessThanOrEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterThanOrEqual => ordering != Ordering::Less,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Equal => "=",
            ComparisonOp::NotEqual => "!=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEqual => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEqual => ">=",
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "=" => Ok(ComparisonOp::Equal),
            "!=" | "<>" => Ok(ComparisonOp::NotEqual),
            "<" => Ok(ComparisonOp::LessThan),
            "<=" => Ok(ComparisonOp::LessThanOrEqual),
            ">" => Ok(ComparisonOp::GreaterThan),
            ">=" => Ok(ComparisonOp::GreaterThanOrEqual),
            other => Err(DatabaseError::UnsupportedOperator(other.to_string())),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single `column op literal` condition, as handed over by a front end.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column_name: String,
    pub op: ComparisonOp,
    pub value: Value,
}

impl Predicate {
    pub fn new(column_name: impl Into<String>, op: ComparisonOp, value: Value) -> Self {
        Self {
            column_name: column_name.into(),
            op,
            value,
        }
    }

    /// Builds a predicate from an operator token such as `"<>"`.
    pub fn parse(column_name: impl Into<String>, op: &str, value: Value) -> Result<Self> {
        Ok(Self::new(column_name, op.parse()?, value))
    }

    pub fn eq(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::Equal, value)
    }

    pub fn ne(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::NotEqual, value)
    }

    pub fn lt(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::LessThan, value)
    }

    pub fn le(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::LessThanOrEqual, value)
    }

    pub fn gt(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::GreaterThan, value)
    }

    pub fn ge(column_name: impl Into<String>, value: Value) -> Self {
        Self::new(column_name, ComparisonOp::GreaterThanOrEqual, value)
    }

    /// Resolves the column name against a schema.
    pub fn bind(&self, schema: &TableSchema) -> Result<BoundPredicate> {
        let column_index = schema.get_column_index(&self.column_name).ok_or_else(|| {
            DatabaseError::ColumnNotFound {
                name: self.column_name.clone(),
                table: schema.table_name.clone(),
            }
        })?;
        Ok(BoundPredicate::new(column_index, self.op, self.value.clone()))
    }
}

/// A predicate whose column has been resolved to a position in the row.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundPredicate {
    pub column_index: usize,
    pub op: ComparisonOp,
    pub value: Value,
}

impl BoundPredicate {
    pub fn new(column_index: usize, op: ComparisonOp, value: Value) -> Self {
        Self {
            column_index,
            op,
            value,
        }
    }

    /// Nulls never match.
    pub fn evaluate(&self, row: &StoredRow) -> Result<bool> {
        let stored = row
            .values
            .get(self.column_index)
            .ok_or(DatabaseError::ColumnIndexOutOfBounds {
                index: self.column_index,
            })?;
        Ok(stored
            .compare_stored(&self.value)?
            .is_some_and(|ordering| self.op.matches(ordering)))
    }
}
