//! The two warehouse queries the usage engine consumes.
//!
//! Both results are ordered by query end time, newest first. The scan query
//! lists every table read; the operation query is the union of row-level
//! inserts and deletes (each restricted to `rows > 0` and non-aborted
//! queries) and carries two extra columns, `rows` and `operation_type`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Datetime format the warehouse accepts in query literals.
pub const WAREHOUSE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCAN_QUERY_TEMPLATE: &str = r#"
SELECT DISTINCT ss.userid as userid,
       ss.query as query,
       sui.usename as username,
       ss.tbl as tbl,
       sq.querytxt as querytxt,
       sti.database as database,
       sti.schema as schema,
       sti.table as table,
       sq.starttime as starttime,
       sq.endtime as endtime
FROM stl_scan ss
  JOIN svv_table_info sti ON ss.tbl = sti.table_id
  JOIN stl_query sq ON ss.query = sq.query
  JOIN svl_user_info sui ON sq.userid = sui.usesysid
WHERE ss.starttime >= '{start_time}'
AND ss.starttime < '{end_time}'
AND sti.database = '{database}'
AND sq.aborted = 0
ORDER BY ss.endtime DESC;
"#;

const OPERATION_QUERY_TEMPLATE: &str = r#"
  (SELECT
      DISTINCT si.userid AS userid,
      si.query AS query,
      si.rows AS rows,
      sui.usename AS username,
      si.tbl AS tbl,
      sq.querytxt AS querytxt,
      sti.database AS database,
      sti.schema AS schema,
      sti.table AS table,
      sq.starttime AS starttime,
      sq.endtime AS endtime,
      'insert' AS operation_type
    FROM
      stl_insert si
      JOIN svv_table_info sti ON si.tbl = sti.table_id
      JOIN stl_query sq ON si.query = sq.query
      JOIN svl_user_info sui ON sq.userid = sui.usesysid
    WHERE
      si.starttime >= '{start_time}'
      AND si.starttime < '{end_time}'
      AND si.rows > 0
      AND sq.aborted = 0)
UNION
  (SELECT
      DISTINCT sd.userid AS userid,
      sd.query AS query,
      sd.rows AS ROWS,
      sui.usename AS username,
      sd.tbl AS tbl,
      sq.querytxt AS querytxt,
      sti.database AS database,
      sti.schema AS schema,
      sti.table AS table,
      sq.starttime AS starttime,
      sq.endtime AS endtime,
      'delete' AS operation_type
    FROM
      stl_delete sd
      JOIN svv_table_info sti ON sd.tbl = sti.table_id
      JOIN stl_query sq ON sd.query = sq.query
      JOIN svl_user_info sui ON sq.userid = sui.usesysid
    WHERE
      sd.starttime >= '{start_time}'
      AND sd.starttime < '{end_time}'
      AND sd.rows > 0
      AND sq.aborted = 0)
ORDER BY
  endtime DESC
"#;

/// Which of the two result shapes a query produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Table reads (`stl_scan`), feeds the usage aggregation.
    Scan,
    /// Row-level inserts/deletes, feeds the operation classifier.
    Operation,
}

const SCAN_COLUMNS: &[&str] = &[
    "userid",
    "query",
    "username",
    "tbl",
    "querytxt",
    "database",
    "schema",
    "table",
    "starttime",
    "endtime",
];

const OPERATION_COLUMNS: &[&str] = &[
    "userid",
    "query",
    "rows",
    "username",
    "tbl",
    "querytxt",
    "database",
    "schema",
    "table",
    "starttime",
    "endtime",
    "operation_type",
];

impl QueryKind {
    /// Column names the query template selects, in select-list order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            QueryKind::Scan => SCAN_COLUMNS,
            QueryKind::Operation => OPERATION_COLUMNS,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKind::Scan => write!(f, "scan"),
            QueryKind::Operation => write!(f, "operation"),
        }
    }
}

/// A fully parameterized usage query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageQuery {
    /// Reads of tables in `database` within `[start, end)`.
    Scan {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        database: String,
    },
    /// Inserts and deletes within `[start, end)`, across all databases.
    Operation {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl UsageQuery {
    pub fn kind(&self) -> QueryKind {
        match self {
            UsageQuery::Scan { .. } => QueryKind::Scan,
            UsageQuery::Operation { .. } => QueryKind::Operation,
        }
    }

    /// Render the SQL text sent to the warehouse.
    pub fn render(&self) -> String {
        match self {
            UsageQuery::Scan {
                start,
                end,
                database,
            } => SCAN_QUERY_TEMPLATE
                .trim()
                .replace("{start_time}", &format_ts(*start))
                .replace("{end_time}", &format_ts(*end))
                .replace("{database}", &escape_literal(database)),
            UsageQuery::Operation { start, end } => OPERATION_QUERY_TEMPLATE
                .trim()
                .replace("{start_time}", &format_ts(*start))
                .replace("{end_time}", &format_ts(*end)),
        }
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(WAREHOUSE_DATETIME_FORMAT).to_string()
}

// single quotes are doubled inside SQL string literals
fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn scan_query_binds_window_and_database() {
        let (start, end) = window();
        let sql = UsageQuery::Scan {
            start,
            end,
            database: "dev".into(),
        }
        .render();

        assert!(sql.starts_with("SELECT DISTINCT ss.userid"));
        assert!(sql.contains("ss.starttime >= '2024-05-01 00:00:00'"));
        assert!(sql.contains("ss.starttime < '2024-05-02 00:00:00'"));
        assert!(sql.contains("sti.database = 'dev'"));
        assert!(!sql.contains('{'));
    }

    #[test]
    fn operation_query_unions_inserts_and_deletes() {
        let (start, end) = window();
        let q = UsageQuery::Operation { start, end };
        assert_eq!(q.kind(), QueryKind::Operation);

        let sql = q.render();
        assert!(sql.contains("'insert' AS operation_type"));
        assert!(sql.contains("'delete' AS operation_type"));
        assert!(sql.contains("UNION"));
        for col in QueryKind::Operation.columns() {
            assert!(sql.contains(&format!("AS {col}")), "{col}");
        }
        assert_eq!(sql.matches("rows > 0").count(), 2);
        assert!(!sql.contains("{start_time}"));
    }

    #[test]
    fn database_literal_is_escaped() {
        let (start, end) = window();
        let sql = UsageQuery::Scan {
            start,
            end,
            database: "o'neil".into(),
        }
        .render();
        assert!(sql.contains("sti.database = 'o''neil'"));
    }
}
