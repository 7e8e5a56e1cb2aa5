//! Dataset usage statistics from warehouse access logs.
//!
//! Raw rows from the scan and operation queries are decoded into
//! [`event::AccessEvent`]s, filtered against a [`catalog::TableCatalog`], then
//! either folded into per-(bucket, resource) aggregates or classified into
//! insert/delete operation records. [`extractor::UsageExtractor`] drives both
//! passes over a [`warehouse_source::WarehouseSource`].

pub mod aggregate;
pub mod bucket;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod extractor;
pub mod operation;
pub mod publish;
pub mod report;
pub mod timestamp;
pub mod top_n;
pub mod validate;

pub use config::UsageConfig;
pub use error::{RowRejection, UsageError};
pub use extractor::{UsageExtractor, UsageOutput};
pub use report::UsageReport;
