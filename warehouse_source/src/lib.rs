//! Warehouse-side collaborator for the usage engine.
//!
//! This crate owns everything that touches the data warehouse: the SQL the
//! usage passes run, the untyped row model those queries return, and the
//! paginated [`providers::WarehouseSource`] seam the engine pulls pages from.

pub mod models;
pub mod providers;

pub use models::query::{QueryKind, UsageQuery};
pub use models::row::{Row, RowValue};
pub use providers::{RowPager, SourceError, WarehouseSource};
