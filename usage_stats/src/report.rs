//! Pass summary counters.

use std::fmt;

use serde::Serialize;

use crate::operation::ClassifierStats;
use crate::validate::ValidationStats;

/// Counters describing one `generate_usage` call.
///
/// Each pass fills its own report, which the caller merges.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub usage_events_aggregated: u64,
    pub usage_rows_malformed: u64,
    pub usage_rows_filtered: u64,
    pub usage_records_emitted: u64,
    pub operation_rows_malformed: u64,
    pub operation_rows_filtered: u64,
    pub operation_events_incomplete: u64,
    pub operation_events_filtered: u64,
    pub operation_records_emitted: u64,
    pub query_evictions: u64,
    pub user_evictions: u64,
    pub buckets: u64,
}

impl UsageReport {
    /// Report for the scan pass.
    pub fn from_usage_pass(validation: ValidationStats, records: u64, buckets: u64) -> Self {
        Self {
            usage_events_aggregated: validation.accepted,
            usage_rows_malformed: validation.malformed,
            usage_rows_filtered: validation.filtered,
            usage_records_emitted: records,
            buckets,
            ..Self::default()
        }
    }

    /// Report for the operation pass.
    pub fn from_operation_pass(validation: ValidationStats, classifier: ClassifierStats) -> Self {
        Self {
            operation_rows_malformed: validation.malformed,
            operation_rows_filtered: validation.filtered,
            operation_events_incomplete: classifier.incomplete,
            operation_events_filtered: classifier.filtered,
            operation_records_emitted: classifier.emitted,
            ..Self::default()
        }
    }

    pub fn merge(&mut self, other: &UsageReport) {
        self.usage_events_aggregated += other.usage_events_aggregated;
        self.usage_rows_malformed += other.usage_rows_malformed;
        self.usage_rows_filtered += other.usage_rows_filtered;
        self.usage_records_emitted += other.usage_records_emitted;
        self.operation_rows_malformed += other.operation_rows_malformed;
        self.operation_rows_filtered += other.operation_rows_filtered;
        self.operation_events_incomplete += other.operation_events_incomplete;
        self.operation_events_filtered += other.operation_events_filtered;
        self.operation_records_emitted += other.operation_records_emitted;
        self.query_evictions += other.query_evictions;
        self.user_evictions += other.user_evictions;
        self.buckets += other.buckets;
    }

    /// Rows skipped for any reason across both passes.
    pub fn rows_skipped(&self) -> u64 {
        self.usage_rows_malformed
            + self.usage_rows_filtered
            + self.operation_rows_malformed
            + self.operation_rows_filtered
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Usage:")?;
        writeln!(f, "  events aggregated: {}", self.usage_events_aggregated)?;
        writeln!(f, "  rows malformed:    {}", self.usage_rows_malformed)?;
        writeln!(f, "  rows filtered:     {}", self.usage_rows_filtered)?;
        writeln!(f, "  buckets:           {}", self.buckets)?;
        writeln!(f, "  records emitted:   {}", self.usage_records_emitted)?;
        if self.query_evictions > 0 || self.user_evictions > 0 {
            writeln!(
                f,
                "  evictions:         {} queries, {} users",
                self.query_evictions, self.user_evictions
            )?;
        }
        writeln!(f, "Operations:")?;
        writeln!(f, "  rows malformed:    {}", self.operation_rows_malformed)?;
        writeln!(f, "  rows filtered:     {}", self.operation_rows_filtered)?;
        writeln!(f, "  events incomplete: {}", self.operation_events_incomplete)?;
        writeln!(f, "  events filtered:   {}", self.operation_events_filtered)?;
        writeln!(f, "  records emitted:   {}", self.operation_records_emitted)?;
        write!(f, "Rows skipped:        {}", self.rows_skipped())
    }
}
