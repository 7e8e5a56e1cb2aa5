//! Source abstraction for warehouse query results.
//!
//! This module defines the [`WarehouseSource`] trait, the unified interface the
//! usage engine uses to run a [`UsageQuery`] and pull its result back one page
//! at a time through a [`RowPager`].
//!
//! Each concrete connection (a live warehouse driver, a fixture file, an
//! in-memory table for tests) implements [`WarehouseSource`]. The traits are
//! async and object safe, so sources can be chosen at runtime behind
//! `Box<dyn WarehouseSource>`.
//!
//! # Example
//!
//! ```rust
//! use warehouse_source::providers::memory::MemorySource;
//! use warehouse_source::{QueryKind, Row, RowValue, UsageQuery, WarehouseSource};
//! # use chrono::{TimeZone, Utc};
//! # tokio_test_block(async {
//! let source = MemorySource::new(100).with_result(
//!     QueryKind::Operation,
//!     vec!["userid".into()],
//!     vec![Row::new(vec![RowValue::Int(1)])],
//! );
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let mut pager = source
//!     .open(&UsageQuery::Operation { start, end: start })
//!     .await
//!     .unwrap();
//! assert_eq!(pager.columns(), ["userid"]);
//! assert_eq!(pager.fetch_page().await.unwrap().unwrap().len(), 1);
//! assert!(pager.fetch_page().await.unwrap().is_none());
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    query::{QueryKind, UsageQuery},
    row::Row,
};

/// Runs usage queries against a warehouse.
#[async_trait]
pub trait WarehouseSource: Send + Sync {
    /// Executes `query` and returns a pager positioned before the first page.
    ///
    /// Results can only be restarted by calling `open` again; pagers never seek.
    async fn open(&self, query: &UsageQuery) -> Result<Box<dyn RowPager>, SourceError>;
}

/// Incremental access to one query result.
#[async_trait]
pub trait RowPager: Send {
    /// Column names of the result, in row order.
    fn columns(&self) -> &[String];

    /// Fetches the next page of rows.
    ///
    /// * `Ok(Some(rows))` - the next non-empty page.
    /// * `Ok(None)` - end of stream; further calls keep returning `None`.
    /// * `Err(_)` - the result can no longer be read.
    async fn fetch_page(&mut self) -> Result<Option<Vec<Row>>, SourceError>;
}

/// Errors that can occur within a [`WarehouseSource`] implementation.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The connection to the warehouse failed or was dropped.
    #[error("warehouse connection failed: {0}")]
    Connection(String),

    /// The warehouse rejected the query.
    #[error("query failed: {0}")]
    Query(String),

    /// The source has no result for this kind of query.
    #[error("no result available for {0} query")]
    UnknownQuery(QueryKind),

    /// A fixture line could not be decoded.
    #[error("failed to decode row at line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
