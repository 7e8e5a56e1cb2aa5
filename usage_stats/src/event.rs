//! Typed decoding of raw warehouse rows into [`AccessEvent`]s.
//!
//! A result's column description is resolved once into a [`RowSchema`]
//! holding the position of every expected column. Resolution fails closed:
//! a missing or unknown column means the query template and this decoder
//! disagree, which is fatal for the pass. Individual rows are then decoded
//! positionally; a row that does not fit becomes a [`RowRejection`].

use chrono::{DateTime, Utc};
use warehouse_source::{QueryKind, Row, RowValue};

use crate::error::{RowRejection, UsageError};
use crate::timestamp::parse_warehouse_ts;

/// One validated read or write against a warehouse object.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessEvent {
    pub user_id: i64,
    /// Warehouse user name; may be empty.
    pub username: String,
    pub query_id: i64,
    pub table_id: i64,
    /// Trimmed query text; `None` when absent or blank.
    pub query_text: Option<String>,
    pub database: String,
    pub schema: String,
    pub table: String,
    /// Rows written; only the operation query reports it.
    pub rows: Option<i64>,
    /// Raw `operation_type` tag; only the operation query reports it.
    pub operation_type: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl AccessEvent {
    /// `"{database}.{schema}.{table}"`, case as reported by the warehouse.
    pub fn resource(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.table)
    }
}

/// Column positions for one result shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowSchema {
    user_id: usize,
    query_id: usize,
    username: usize,
    table_id: usize,
    query_text: usize,
    database: usize,
    schema: usize,
    table: usize,
    start_time: usize,
    end_time: usize,
    rows: Option<usize>,
    operation_type: Option<usize>,
}

impl RowSchema {
    /// Columns a result of `kind` must carry, in template order.
    pub fn expected_columns(kind: QueryKind) -> Vec<&'static str> {
        kind.columns().to_vec()
    }

    /// Map a column description onto the shape expected for `kind`.
    ///
    /// Column names are compared case-insensitively since warehouses differ
    /// in how they fold unquoted aliases.
    pub fn resolve(kind: QueryKind, columns: &[String]) -> Result<Self, UsageError> {
        let expected = Self::expected_columns(kind);
        let lowered: Vec<String> = columns.iter().map(|c| c.trim().to_ascii_lowercase()).collect();

        let missing: Vec<String> = expected
            .iter()
            .filter(|e| !lowered.iter().any(|c| c == *e))
            .map(|e| e.to_string())
            .collect();
        let unexpected: Vec<String> = columns
            .iter()
            .zip(&lowered)
            .filter(|(_, c)| !expected.contains(&c.as_str()))
            .map(|(orig, _)| orig.clone())
            .collect();
        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(UsageError::QueryShape { missing, unexpected });
        }

        let pos = |name: &str| lowered.iter().position(|c| c == name).unwrap_or_default();
        Ok(Self {
            user_id: pos("userid"),
            query_id: pos("query"),
            username: pos("username"),
            table_id: pos("tbl"),
            query_text: pos("querytxt"),
            database: pos("database"),
            schema: pos("schema"),
            table: pos("table"),
            start_time: pos("starttime"),
            end_time: pos("endtime"),
            rows: (kind == QueryKind::Operation).then(|| pos("rows")),
            operation_type: (kind == QueryKind::Operation).then(|| pos("operation_type")),
        })
    }

    /// Decode one row laid out according to this schema.
    pub fn decode(&self, row: &Row) -> Result<AccessEvent, RowRejection> {
        let start_time = timestamp(row.get(self.start_time), "starttime")?;
        let end_time = timestamp(row.get(self.end_time), "endtime")?;
        if start_time > end_time {
            return Err(RowRejection::InvertedTimes {
                start: start_time,
                end: end_time,
            });
        }

        let query_text = optional_text(row.get(self.query_text), "querytxt")?
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(AccessEvent {
            user_id: int(row.get(self.user_id), "userid")?,
            username: text(row.get(self.username), "username")?.to_string(),
            query_id: int(row.get(self.query_id), "query")?,
            table_id: int(row.get(self.table_id), "tbl")?,
            query_text,
            database: text(row.get(self.database), "database")?.to_string(),
            schema: text(row.get(self.schema), "schema")?.to_string(),
            table: text(row.get(self.table), "table")?.to_string(),
            rows: match self.rows {
                Some(idx) => optional_int(row.get(idx), "rows")?,
                None => None,
            },
            operation_type: match self.operation_type {
                Some(idx) => optional_text(row.get(idx), "operation_type")?
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
                None => None,
            },
            start_time,
            end_time,
        })
    }
}

fn wrong_type(column: &'static str, expected: &'static str, found: &RowValue) -> RowRejection {
    RowRejection::WrongType {
        column,
        expected,
        found: found.type_name(),
    }
}

fn optional_int(v: &RowValue, column: &'static str) -> Result<Option<i64>, RowRejection> {
    match v {
        RowValue::Null => Ok(None),
        RowValue::Int(i) => Ok(Some(*i)),
        other => Err(wrong_type(column, "integer", other)),
    }
}

fn int(v: &RowValue, column: &'static str) -> Result<i64, RowRejection> {
    optional_int(v, column)?.ok_or(RowRejection::MissingValue { column })
}

fn optional_text<'r>(v: &'r RowValue, column: &'static str) -> Result<Option<&'r str>, RowRejection> {
    match v {
        RowValue::Null => Ok(None),
        RowValue::Text(s) => Ok(Some(s.as_str())),
        other => Err(wrong_type(column, "text", other)),
    }
}

fn text<'r>(v: &'r RowValue, column: &'static str) -> Result<&'r str, RowRejection> {
    optional_text(v, column)?.ok_or(RowRejection::MissingValue { column })
}

fn timestamp(v: &RowValue, column: &'static str) -> Result<DateTime<Utc>, RowRejection> {
    match v {
        RowValue::Null => Err(RowRejection::MissingValue { column }),
        RowValue::Timestamp(ts) => Ok(*ts),
        RowValue::Text(s) => parse_warehouse_ts(s).ok_or_else(|| RowRejection::BadTimestamp {
            column,
            value: s.clone(),
        }),
        other => Err(wrong_type(column, "timestamp", other)),
    }
}
