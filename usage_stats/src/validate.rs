//! Row validation and catalog filtering shared by both passes.

use tracing::{debug, warn};
use warehouse_source::{QueryKind, Row};

use crate::catalog::TableCatalog;
use crate::error::UsageError;
use crate::event::{AccessEvent, RowSchema};

/// Per-pass counters owned by the caller of [`EventValidator::validate`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ValidationStats {
    pub accepted: u64,
    /// Rows that could not be decoded.
    pub malformed: u64,
    /// Decoded events whose resource is not in the catalog.
    pub filtered: u64,
}

/// Turns raw rows of one result into catalog-approved [`AccessEvent`]s.
#[derive(Debug)]
pub struct EventValidator<'a> {
    kind: QueryKind,
    schema: RowSchema,
    catalog: &'a TableCatalog,
    database_alias: Option<&'a str>,
}

impl<'a> EventValidator<'a> {
    /// Resolve the result's columns for `kind`. Fails if they do not match.
    pub fn new(
        kind: QueryKind,
        columns: &[String],
        catalog: &'a TableCatalog,
        database_alias: Option<&'a str>,
    ) -> Result<Self, UsageError> {
        Ok(Self {
            kind,
            schema: RowSchema::resolve(kind, columns)?,
            catalog,
            database_alias,
        })
    }

    /// Decode `row`, apply the database alias, then check the catalog.
    ///
    /// Returns `None` for skipped rows; `stats` records why.
    pub fn validate(&self, row: &Row, stats: &mut ValidationStats) -> Option<AccessEvent> {
        let mut event = match self.schema.decode(row) {
            Ok(ev) => ev,
            Err(reason) => {
                warn!(kind = %self.kind, %reason, "skipping malformed row");
                stats.malformed += 1;
                return None;
            }
        };

        if let Some(alias) = self.database_alias {
            event.database = alias.to_string();
        }

        if !self
            .catalog
            .contains(&event.database, &event.schema, &event.table)
        {
            debug!(kind = %self.kind, resource = %event.resource(), "resource not in catalog");
            stats.filtered += 1;
            return None;
        }

        stats.accepted += 1;
        Some(event)
    }
}
