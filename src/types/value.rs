use std::{cmp::Ordering, fmt};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::error::{DatabaseError, Result};

const SECONDS_PER_DAY: i64 = 86_400;
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One-byte tag stored in a leaf cell's payload header. It decides both the
/// logical type of a column value and how many bytes the value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeCode(u8);

impl TypeCode {
    pub const NULL_1: TypeCode = TypeCode(0x00);
    pub const NULL_2: TypeCode = TypeCode(0x01);
    pub const NULL_4: TypeCode = TypeCode(0x02);
    pub const NULL_8: TypeCode = TypeCode(0x03);
    pub const TINYINT: TypeCode = TypeCode(0x04);
    pub const SMALLINT: TypeCode = TypeCode(0x05);
    pub const INT: TypeCode = TypeCode(0x06);
    pub const BIGINT: TypeCode = TypeCode(0x07);
    pub const REAL: TypeCode = TypeCode(0x08);
    pub const DOUBLE: TypeCode = TypeCode(0x09);
    pub const DATETIME: TypeCode = TypeCode(0x0A);
    pub const DATE: TypeCode = TypeCode(0x0B);

    pub const TEXT_BASE: u8 = 0x0C;
    pub const MAX_TEXT_LEN: usize = (u8::MAX - Self::TEXT_BASE) as usize;

    pub const fn from_u8(code: u8) -> Self {
        TypeCode(code)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub fn text(len: usize) -> Result<Self> {
        if len > Self::MAX_TEXT_LEN {
            return Err(DatabaseError::SerializationError {
                details: format!(
                    "text of {} bytes exceeds the {} byte limit",
                    len,
                    Self::MAX_TEXT_LEN
                ),
            });
        }
        Ok(TypeCode(Self::TEXT_BASE + len as u8))
    }

    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self.0 {
            0x00 | 0x04 => 1,
            0x01 | 0x05 => 2,
            0x02 | 0x06 | 0x08 => 4,
            0x03 | 0x07 | 0x09 | 0x0A | 0x0B => 8,
            code => (code - Self::TEXT_BASE) as usize,
        }
    }

    pub const fn is_null(self) -> bool {
        self.0 <= 0x03
    }

    pub const fn is_text(self) -> bool {
        self.0 >= Self::TEXT_BASE
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0x00..=0x03 => "NULL",
            0x04 => "TINYINT",
            0x05 => "SMALLINT",
            0x06 => "INT",
            0x07 => "BIGINT",
            0x08 => "REAL",
            0x09 => "DOUBLE",
            0x0A => "DATETIME",
            0x0B => "DATE",
            _ => "TEXT",
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_text() {
            write!(f, "TEXT({})", self.width())
        } else {
            write!(f, "{}", self.name())
        }
    }
}

/// Width of the zero-filled slot a null value occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullSlot {
    One,
    Two,
    Four,
    Eight,
}

impl NullSlot {
    pub const fn width(self) -> usize {
        match self {
            NullSlot::One => 1,
            NullSlot::Two => 2,
            NullSlot::Four => 4,
            NullSlot::Eight => 8,
        }
    }

    pub const fn type_code(self) -> TypeCode {
        match self {
            NullSlot::One => TypeCode::NULL_1,
            NullSlot::Two => TypeCode::NULL_2,
            NullSlot::Four => TypeCode::NULL_4,
            NullSlot::Eight => TypeCode::NULL_8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null(NullSlot),
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    /// Seconds since the Unix epoch.
    DateTime(i64),
    /// Seconds since the Unix epoch at midnight UTC.
    Date(i64),
    Text(String),
}

impl Value {
    /// The type code this value encodes under when written as-is.
    pub fn type_code(&self) -> Result<TypeCode> {
        Ok(match self {
            Value::Null(slot) => slot.type_code(),
            Value::TinyInt(_) => TypeCode::TINYINT,
            Value::SmallInt(_) => TypeCode::SMALLINT,
            Value::Int(_) => TypeCode::INT,
            Value::BigInt(_) => TypeCode::BIGINT,
            Value::Real(_) => TypeCode::REAL,
            Value::Double(_) => TypeCode::DOUBLE,
            Value::DateTime(_) => TypeCode::DATETIME,
            Value::Date(_) => TypeCode::DATE,
            Value::Text(s) => TypeCode::text(s.len())?,
        })
    }

    pub fn serialized_size(&self) -> Result<usize> {
        Ok(self.type_code()?.width())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null(_) => "NULL",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Int(_) => "INT",
            Value::BigInt(_) => "BIGINT",
            Value::Real(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::DateTime(_) => "DATETIME",
            Value::Date(_) => "DATE",
            Value::Text(_) => "TEXT",
        }
    }

    /// Integer variants only.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::TinyInt(v) => Some(*v as i64),
            Value::SmallInt(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => self.as_integer().map(|v| v as f64),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn parse_datetime(text: &str) -> Result<Value> {
        let text = text.trim();
        NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
            .map(|dt| Value::DateTime(dt.and_utc().timestamp()))
            .or_else(|_| Value::parse_date(text).map(|date| match date {
                Value::Date(secs) => Value::DateTime(secs),
                other => other,
            }))
    }

    pub fn parse_date(text: &str) -> Result<Value> {
        let date = NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).map_err(|e| {
            DatabaseError::TypeMismatch {
                expected: "DATE (YYYY-MM-DD)".to_string(),
                actual: format!("'{}' ({})", text, e),
            }
        })?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| DatabaseError::TypeMismatch {
                expected: "DATE".to_string(),
                actual: text.to_string(),
            })?;
        Ok(Value::Date(midnight.and_utc().timestamp()))
    }

    /// Drops the time-of-day part of an epoch timestamp.
    pub fn date_from_timestamp(secs: i64) -> Value {
        Value::Date(secs - secs.rem_euclid(SECONDS_PER_DAY))
    }

    /// Compares a stored value against a literal, driven by the stored value's
    /// type. `None` means the pair is not comparable (a null on either side).
    pub fn compare_stored(&self, literal: &Value) -> Result<Option<Ordering>> {
        if self.is_null() || literal.is_null() {
            return Ok(None);
        }
        match self {
            Value::TinyInt(_) | Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
                let stored = self.as_integer().unwrap_or_default();
                match literal {
                    Value::Real(_) | Value::Double(_) => {
                        Ok((stored as f64).partial_cmp(&literal.as_f64().unwrap_or_default()))
                    }
                    Value::Text(s) => {
                        let parsed = s.trim().parse::<i64>().map_err(|_| mismatch(self, literal))?;
                        Ok(Some(stored.cmp(&parsed)))
                    }
                    _ => literal
                        .as_integer()
                        .map(|other| Some(stored.cmp(&other)))
                        .ok_or_else(|| mismatch(self, literal)),
                }
            }
            Value::Real(_) | Value::Double(_) => {
                let stored = self.as_f64().unwrap_or_default();
                let other = match literal {
                    Value::Text(s) => s.trim().parse::<f64>().map_err(|_| mismatch(self, literal))?,
                    _ => literal.as_f64().ok_or_else(|| mismatch(self, literal))?,
                };
                Ok(stored.partial_cmp(&other))
            }
            Value::DateTime(stored) | Value::Date(stored) => {
                let other = match literal {
                    Value::DateTime(v) | Value::Date(v) => *v,
                    Value::Text(s) if matches!(self, Value::Date(_)) => match Value::parse_date(s)? {
                        Value::Date(v) => v,
                        _ => return Err(mismatch(self, literal)),
                    },
                    Value::Text(s) => match Value::parse_datetime(s)? {
                        Value::DateTime(v) => v,
                        _ => return Err(mismatch(self, literal)),
                    },
                    _ => literal.as_integer().ok_or_else(|| mismatch(self, literal))?,
                };
                Ok(Some(stored.cmp(&other)))
            }
            Value::Text(stored) => match literal {
                Value::Text(other) => Ok(Some(stored.trim().cmp(other.trim()))),
                _ => Err(mismatch(self, literal)),
            },
            Value::Null(_) => Ok(None),
        }
    }
}

fn mismatch(stored: &Value, literal: &Value) -> DatabaseError {
    DatabaseError::TypeMismatch {
        expected: stored.kind_name().to_string(),
        actual: literal.kind_name().to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => write!(f, "NULL"),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::DateTime(secs) => match DateTime::from_timestamp(*secs, 0) {
                Some(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
                None => write!(f, "{}", secs),
            },
            Value::Date(secs) => match DateTime::from_timestamp(*secs, 0) {
                Some(dt) => write!(f, "{}", dt.format(DATE_FORMAT)),
                None => write!(f, "{}", secs),
            },
            Value::Text(s) => write!(f, "{}", s.trim_end_matches(' ')),
        }
    }
}

/// Pads with spaces or truncates (on a char boundary) to exactly `width` bytes.
pub fn pad_text(text: &str, width: usize) -> String {
    let mut end = text.len().min(width);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut padded = String::with_capacity(width);
    padded.push_str(&text[..end]);
    padded.push_str(&" ".repeat(width - end));
    padded
}

pub fn encode(code: TypeCode, value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(code.width());
    encode_into(code, value, &mut out)?;
    Ok(out)
}

/// Appends exactly `code.width()` bytes. Numeric values are big-endian.
pub fn encode_into(code: TypeCode, value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match (code.as_u8(), value) {
        (0x00..=0x03, Value::Null(slot)) if slot.width() == code.width() => {
            out.resize(out.len() + code.width(), 0);
        }
        (0x04, Value::TinyInt(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (0x05, Value::SmallInt(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (0x06, Value::Int(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (0x07, Value::BigInt(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (0x08, Value::Real(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (0x09, Value::Double(v)) => out.extend_from_slice(&v.to_be_bytes()),
        (0x0A, Value::DateTime(v)) | (0x0B, Value::Date(v)) => {
            out.extend_from_slice(&v.to_be_bytes())
        }
        (c, Value::Text(s)) if c >= TypeCode::TEXT_BASE => {
            out.extend_from_slice(pad_text(s, code.width()).as_bytes())
        }
        _ => {
            return Err(DatabaseError::TypeMismatch {
                expected: code.to_string(),
                actual: value.kind_name().to_string(),
            });
        }
    }
    Ok(())
}

/// Reads the first `code.width()` bytes of `bytes`. Text keeps its padding.
pub fn decode(code: TypeCode, bytes: &[u8]) -> Result<Value> {
    let width = code.width();
    if bytes.len() < width {
        return Err(DatabaseError::SerializationError {
            details: format!(
                "{} needs {} bytes, only {} available",
                code,
                width,
                bytes.len()
            ),
        });
    }
    let b = &bytes[..width];
    Ok(match code.as_u8() {
        0x00 => Value::Null(NullSlot::One),
        0x01 => Value::Null(NullSlot::Two),
        0x02 => Value::Null(NullSlot::Four),
        0x03 => Value::Null(NullSlot::Eight),
        0x04 => Value::TinyInt(i8::from_be_bytes(array(b))),
        0x05 => Value::SmallInt(i16::from_be_bytes(array(b))),
        0x06 => Value::Int(i32::from_be_bytes(array(b))),
        0x07 => Value::BigInt(i64::from_be_bytes(array(b))),
        0x08 => Value::Real(f32::from_be_bytes(array(b))),
        0x09 => Value::Double(f64::from_be_bytes(array(b))),
        0x0A => Value::DateTime(i64::from_be_bytes(array(b))),
        0x0B => Value::Date(i64::from_be_bytes(array(b))),
        _ => Value::Text(String::from_utf8(b.to_vec()).map_err(|e| {
            DatabaseError::SerializationError {
                details: format!("invalid UTF-8 in text value: {}", e),
            }
        })?),
    })
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}
