#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use usage_stats::UsageConfig;
use usage_stats::bucket::BucketDuration;
use usage_stats::catalog::TableCatalog;
use warehouse_source::providers::memory::MemorySource;
use warehouse_source::{QueryKind, Row, RowValue};

pub fn ts(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, h, m, 0).unwrap()
}

pub fn columns(kind: QueryKind) -> Vec<String> {
    kind.columns().iter().map(|c| c.to_string()).collect()
}

/// Builder for one raw result row; defaults describe a read of `db.pub.orders`.
#[derive(Clone, Debug)]
pub struct RowFixture {
    pub username: RowValue,
    pub query: RowValue,
    pub database: String,
    pub schema: String,
    pub table: String,
    pub start: DateTime<Utc>,
    pub end: RowValue,
    pub rows: i64,
    pub operation: Option<&'static str>,
}

impl RowFixture {
    pub fn read(username: &str, query: &str) -> Self {
        Self {
            username: RowValue::from(username),
            query: RowValue::from(query),
            database: "db".into(),
            schema: "pub".into(),
            table: "orders".into(),
            start: ts(10, 5),
            end: RowValue::Timestamp(ts(10, 6)),
            rows: 0,
            operation: None,
        }
    }

    pub fn write(username: &str, operation: &'static str) -> Self {
        Self {
            rows: 5,
            operation: Some(operation),
            ..Self::read(username, "INSERT INTO orders SELECT * FROM staging")
        }
    }

    pub fn at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self.end = RowValue::Timestamp(start);
        self
    }

    pub fn on(mut self, database: &str, schema: &str, table: &str) -> Self {
        self.database = database.into();
        self.schema = schema.into();
        self.table = table.into();
        self
    }

    pub fn without_end(mut self) -> Self {
        self.end = RowValue::Null;
        self
    }

    /// Values in `columns(kind)` order.
    pub fn row(&self, kind: QueryKind) -> Row {
        kind.columns()
            .iter()
            .map(|col| match *col {
                "userid" => RowValue::Int(100),
                "query" => RowValue::Int(7),
                "username" => self.username.clone(),
                "tbl" => RowValue::Int(42),
                "querytxt" => self.query.clone(),
                "database" => RowValue::from(self.database.as_str()),
                "schema" => RowValue::from(self.schema.as_str()),
                "table" => RowValue::from(self.table.as_str()),
                "starttime" => RowValue::Timestamp(self.start),
                "endtime" => self.end.clone(),
                "rows" => RowValue::Int(self.rows),
                "operation_type" => RowValue::from(self.operation),
                other => panic!("no fixture value for column {other}"),
            })
            .collect()
    }
}

pub fn catalog() -> TableCatalog {
    TableCatalog::new()
        .with_table("db", "pub", "orders")
        .with_table("db", "pub", "customers")
}

pub fn config() -> UsageConfig {
    let mut cfg = UsageConfig::new(ts(0, 0), ts(23, 0), "db");
    cfg.bucket_duration = BucketDuration::Hour;
    cfg.email_domain = Some("co.com".into());
    cfg
}

pub fn source(page_size: usize, scans: &[RowFixture], writes: &[RowFixture]) -> MemorySource {
    MemorySource::new(page_size)
        .with_result(
            QueryKind::Scan,
            columns(QueryKind::Scan),
            scans.iter().map(|r| r.row(QueryKind::Scan)).collect(),
        )
        .with_result(
            QueryKind::Operation,
            columns(QueryKind::Operation),
            writes.iter().map(|r| r.row(QueryKind::Operation)).collect(),
        )
}
