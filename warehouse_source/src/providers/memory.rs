//! In-memory source serving canned results, split into fixed-size pages.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::vec;

use async_trait::async_trait;

use crate::models::{
    query::{QueryKind, UsageQuery},
    row::Row,
};
use crate::providers::{RowPager, SourceError, WarehouseSource};

#[derive(Debug, Clone)]
struct CannedResult {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// A [`WarehouseSource`] backed by rows held in memory.
///
/// Mostly used by tests: it records how often each query kind was opened and
/// can be told to fail mid-stream to exercise abort handling.
#[derive(Debug)]
pub struct MemorySource {
    results: HashMap<QueryKind, CannedResult>,
    page_size: usize,
    fail_after_pages: Option<usize>,
    scan_opens: AtomicUsize,
    operation_opens: AtomicUsize,
}

impl MemorySource {
    /// Create an empty source; `page_size` is clamped to at least one row.
    pub fn new(page_size: usize) -> Self {
        Self {
            results: HashMap::new(),
            page_size: page_size.max(1),
            fail_after_pages: None,
            scan_opens: AtomicUsize::new(0),
            operation_opens: AtomicUsize::new(0),
        }
    }

    /// Register the result returned for queries of `kind`.
    pub fn with_result(mut self, kind: QueryKind, columns: Vec<String>, rows: Vec<Row>) -> Self {
        self.results.insert(kind, CannedResult { columns, rows });
        self
    }

    /// Make every pager fail with a connection error once `pages` pages were served.
    pub fn failing_after(mut self, pages: usize) -> Self {
        self.fail_after_pages = Some(pages);
        self
    }

    /// How many times a query of `kind` was opened.
    pub fn opened(&self, kind: QueryKind) -> usize {
        match kind {
            QueryKind::Scan => self.scan_opens.load(Ordering::Relaxed),
            QueryKind::Operation => self.operation_opens.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl WarehouseSource for MemorySource {
    async fn open(&self, query: &UsageQuery) -> Result<Box<dyn RowPager>, SourceError> {
        let kind = query.kind();
        match kind {
            QueryKind::Scan => self.scan_opens.fetch_add(1, Ordering::Relaxed),
            QueryKind::Operation => self.operation_opens.fetch_add(1, Ordering::Relaxed),
        };

        let canned = self
            .results
            .get(&kind)
            .cloned()
            .ok_or(SourceError::UnknownQuery(kind))?;

        Ok(Box::new(MemoryPager {
            columns: canned.columns,
            rows: canned.rows.into_iter(),
            page_size: self.page_size,
            served: 0,
            fail_after_pages: self.fail_after_pages,
        }))
    }
}

struct MemoryPager {
    columns: Vec<String>,
    rows: vec::IntoIter<Row>,
    page_size: usize,
    served: usize,
    fail_after_pages: Option<usize>,
}

#[async_trait]
impl RowPager for MemoryPager {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn fetch_page(&mut self) -> Result<Option<Vec<Row>>, SourceError> {
        if self.fail_after_pages.is_some_and(|limit| self.served >= limit) {
            return Err(SourceError::Connection(format!(
                "connection reset after {} pages",
                self.served
            )));
        }

        let page: Vec<Row> = self.rows.by_ref().take(self.page_size).collect();
        if page.is_empty() {
            return Ok(None);
        }
        self.served += 1;
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::row::RowValue;
    use chrono::{TimeZone, Utc};

    fn scan_query() -> UsageQuery {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        UsageQuery::Scan {
            start,
            end: start,
            database: "dev".into(),
        }
    }

    fn rows(n: i64) -> Vec<Row> {
        (0..n).map(|i| Row::new(vec![RowValue::Int(i)])).collect()
    }

    #[tokio::test]
    async fn pages_are_split_by_page_size() {
        let source = MemorySource::new(2).with_result(QueryKind::Scan, vec!["userid".into()], rows(5));
        let mut pager = source.open(&scan_query()).await.unwrap();

        let mut sizes = Vec::new();
        while let Some(page) = pager.fetch_page().await.unwrap() {
            sizes.push(page.len());
        }
        assert_eq!(sizes, vec![2, 2, 1]);
        // end-of-stream is sticky
        assert!(pager.fetch_page().await.unwrap().is_none());
        assert_eq!(source.opened(QueryKind::Scan), 1);
        assert_eq!(source.opened(QueryKind::Operation), 0);
    }

    #[tokio::test]
    async fn missing_result_is_an_error() {
        let source = MemorySource::new(10);
        let err = source.open(&scan_query()).await.err().unwrap();
        assert!(matches!(err, SourceError::UnknownQuery(QueryKind::Scan)));
    }

    #[tokio::test]
    async fn failure_injection_stops_the_stream() {
        let source = MemorySource::new(1)
            .with_result(QueryKind::Scan, vec!["userid".into()], rows(3))
            .failing_after(1);
        let mut pager = source.open(&scan_query()).await.unwrap();

        assert!(pager.fetch_page().await.unwrap().is_some());
        let err = pager.fetch_page().await.unwrap_err();
        assert!(matches!(err, SourceError::Connection(_)));
    }
}
