//! Insert/delete operation records, one per qualifying write event.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::TableCatalog;
use crate::error::UsageError;
use crate::event::AccessEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Insert,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "INSERT"),
            OperationKind::Delete => write!(f, "DELETE"),
        }
    }
}

impl FromStr for OperationKind {
    type Err = String;

    /// Only the exact tags produced by the operation query are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(OperationKind::Insert),
            "delete" => Ok(OperationKind::Delete),
            other => Err(other.to_string()),
        }
    }
}

/// A discrete write against a catalog resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRecord {
    /// Raw-cased `database.schema.table`.
    pub resource: String,
    /// Local part of the writer's user name.
    pub actor: String,
    /// Query end time.
    pub last_updated: DateTime<Utc>,
    /// When the record was produced.
    pub observed_at: DateTime<Utc>,
    pub kind: OperationKind,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierStats {
    /// Events missing a field an operation needs (scan events always are).
    pub incomplete: u64,
    /// Events whose resource is not in the catalog.
    pub filtered: u64,
    pub emitted: u64,
}

/// Stateless event-to-operation mapping.
#[derive(Debug, Clone, Copy)]
pub struct OperationClassifier<'a> {
    catalog: &'a TableCatalog,
}

impl<'a> OperationClassifier<'a> {
    pub fn new(catalog: &'a TableCatalog) -> Self {
        Self { catalog }
    }

    /// Classify one event.
    ///
    /// `Ok(None)` means the event was skipped (see `stats`). An operation tag
    /// other than `insert`/`delete` is an error: it means the query feeding
    /// this classifier is not the operation query.
    pub fn classify(
        &self,
        event: &AccessEvent,
        observed_at: DateTime<Utc>,
        stats: &mut ClassifierStats,
    ) -> Result<Option<OperationRecord>, UsageError> {
        let Some(op) = event.operation_type.as_deref().filter(|_| {
            !(event.database.is_empty()
                || event.username.is_empty()
                || event.schema.is_empty()
                || event.table.is_empty())
        }) else {
            stats.incomplete += 1;
            return Ok(None);
        };

        if !self
            .catalog
            .contains(&event.database, &event.schema, &event.table)
        {
            debug!(resource = %event.resource(), "operation on resource not in catalog");
            stats.filtered += 1;
            return Ok(None);
        }

        let kind = op
            .parse::<OperationKind>()
            .map_err(|value| UsageError::UnknownOperation {
                value,
                resource: event.resource(),
            })?;

        let actor = event
            .username
            .split_once('@')
            .map_or(event.username.as_str(), |(local, _)| local)
            .to_string();

        stats.emitted += 1;
        Ok(Some(OperationRecord {
            resource: event.resource(),
            actor,
            last_updated: event.end_time,
            observed_at,
            kind,
        }))
    }

    /// Classify a sequence, stopping at the first contract violation.
    pub fn classify_all<'e>(
        &self,
        events: impl IntoIterator<Item = &'e AccessEvent>,
        observed_at: DateTime<Utc>,
        stats: &mut ClassifierStats,
    ) -> Result<Vec<OperationRecord>, UsageError> {
        let mut out = Vec::new();
        for ev in events {
            if let Some(rec) = self.classify(ev, observed_at, stats)? {
                out.push(rec);
            }
        }
        Ok(out)
    }
}
