//! Positional argument values and typed scan destinations.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// A single positional statement argument or result column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Why a row could not be copied into the caller's destinations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// `scan` was called before `advance` or after the cursor ran out.
    NoCurrentRow,
    ArityMismatch {
        destinations: usize,
        columns: usize,
    },
    TypeMismatch {
        column: usize,
        expected: &'static str,
        found: &'static str,
    },
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCurrentRow => write!(f, "scan called without a current row"),
            Self::ArityMismatch {
                destinations,
                columns,
            } => write!(
                f,
                "scan expected {destinations} destinations to match {columns} columns"
            ),
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => write!(
                f,
                "cannot scan {found} value in column {column} into {expected} destination"
            ),
        }
    }
}

impl Error for ScanError {}

/// A typed destination a column value can be scanned into.
///
/// Scanning is keyed by the destination type: each implementation decides
/// which stored value kinds it accepts.
pub trait Scan {
    /// Name of the destination type, used in mismatch errors.
    fn expected(&self) -> &'static str;

    /// Overwrites `self` from `value`, or returns the found type name when
    /// the value kind is not accepted.
    fn scan_value(&mut self, value: &Value) -> Result<(), &'static str>;
}

impl Scan for String {
    fn expected(&self) -> &'static str {
        "text"
    }

    fn scan_value(&mut self, value: &Value) -> Result<(), &'static str> {
        match value {
            Value::Text(text) => {
                self.clone_from(text);
                Ok(())
            }
            other => Err(other.type_name()),
        }
    }
}

impl Scan for i64 {
    fn expected(&self) -> &'static str {
        "integer"
    }

    fn scan_value(&mut self, value: &Value) -> Result<(), &'static str> {
        match value {
            Value::Integer(number) => {
                *self = *number;
                Ok(())
            }
            other => Err(other.type_name()),
        }
    }
}

impl Scan for f64 {
    fn expected(&self) -> &'static str {
        "real"
    }

    fn scan_value(&mut self, value: &Value) -> Result<(), &'static str> {
        match value {
            Value::Real(number) => {
                *self = *number;
                Ok(())
            }
            other => Err(other.type_name()),
        }
    }
}

impl Scan for bool {
    fn expected(&self) -> &'static str {
        "boolean"
    }

    fn scan_value(&mut self, value: &Value) -> Result<(), &'static str> {
        match value {
            Value::Integer(0) => *self = false,
            Value::Integer(1) => *self = true,
            other => return Err(other.type_name()),
        }
        Ok(())
    }
}

impl Scan for Vec<u8> {
    fn expected(&self) -> &'static str {
        "blob"
    }

    fn scan_value(&mut self, value: &Value) -> Result<(), &'static str> {
        match value {
            Value::Blob(bytes) => {
                self.clone_from(bytes);
                Ok(())
            }
            other => Err(other.type_name()),
        }
    }
}

impl<T: Scan + Default> Scan for Option<T> {
    fn expected(&self) -> &'static str {
        "nullable"
    }

    fn scan_value(&mut self, value: &Value) -> Result<(), &'static str> {
        if matches!(value, Value::Null) {
            *self = None;
            return Ok(());
        }
        let mut inner = T::default();
        inner.scan_value(value)?;
        *self = Some(inner);
        Ok(())
    }
}

/// Copies one row of values into destinations, checking arity first.
///
/// Destinations before a failing column may already have been overwritten;
/// callers discard them on error.
pub fn scan_row(row: &[Value], dest: &mut [&mut dyn Scan]) -> Result<(), ScanError> {
    if row.len() != dest.len() {
        return Err(ScanError::ArityMismatch {
            destinations: dest.len(),
            columns: row.len(),
        });
    }

    for (column, (value, target)) in row.iter().zip(dest.iter_mut()).enumerate() {
        let expected = target.expected();
        target
            .scan_value(value)
            .map_err(|found| ScanError::TypeMismatch {
                column,
                expected,
                found,
            })?;
    }
    Ok(())
}
