//! Untyped result rows as returned by the warehouse.
//!
//! Values are kept exactly as the driver (or a JSON-lines fixture) produced
//! them; typed decoding into access events happens in the engine, against a
//! column description resolved once per result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// Deserializes untagged from JSON, so `null`, booleans, integers, floats and
/// strings map onto the obvious variants. Strings that parse as RFC-3339 become
/// [`RowValue::Timestamp`]; other date formats stay [`RowValue::Text`] and are
/// parsed later by whoever knows the column is a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValue {
    /// SQL NULL.
    Null,
    /// Boolean column.
    Bool(bool),
    /// Integer column (ids, row counts).
    Int(i64),
    /// Floating point column.
    Float(f64),
    /// Timestamp already resolved to UTC.
    Timestamp(DateTime<Utc>),
    /// Any textual column.
    Text(String),
}

impl RowValue {
    /// Short type name used in decode error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            RowValue::Null => "null",
            RowValue::Bool(_) => "bool",
            RowValue::Int(_) => "int",
            RowValue::Float(_) => "float",
            RowValue::Timestamp(_) => "timestamp",
            RowValue::Text(_) => "text",
        }
    }
}

impl From<&str> for RowValue {
    fn from(s: &str) -> Self {
        RowValue::Text(s.to_string())
    }
}

impl From<String> for RowValue {
    fn from(s: String) -> Self {
        RowValue::Text(s)
    }
}

impl From<i64> for RowValue {
    fn from(v: i64) -> Self {
        RowValue::Int(v)
    }
}

impl From<DateTime<Utc>> for RowValue {
    fn from(ts: DateTime<Utc>) -> Self {
        RowValue::Timestamp(ts)
    }
}

impl<T: Into<RowValue>> From<Option<T>> for RowValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(RowValue::Null, Into::into)
    }
}

/// One result row; values are positional and line up with the result's
/// column description.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub values: Vec<RowValue>,
}

impl Row {
    pub fn new(values: Vec<RowValue>) -> Self {
        Self { values }
    }

    /// Value at `idx`, treating a short row as NULL-padded.
    pub fn get(&self, idx: usize) -> &RowValue {
        self.values.get(idx).unwrap_or(&RowValue::Null)
    }
}

impl FromIterator<RowValue> for Row {
    fn from_iter<I: IntoIterator<Item = RowValue>>(iter: I) -> Self {
        Row::new(iter.into_iter().collect())
    }
}
