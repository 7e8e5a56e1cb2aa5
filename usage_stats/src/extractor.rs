//! Drives the scan and operation passes over a warehouse source.
//!
//! Each pass opens its query, resolves the column layout, then pulls pages
//! until the source is exhausted, fetching the next page while the current
//! one is folded. The two passes share no state and run concurrently; if
//! either fails, the whole call fails and nothing is returned.

use chrono::Utc;
use tracing::{debug, info, instrument};
use warehouse_source::{QueryKind, Row, RowPager, WarehouseSource};

use crate::aggregate::UsageAggregator;
use crate::catalog::TableCatalog;
use crate::config::UsageConfig;
use crate::error::UsageError;
use crate::operation::{ClassifierStats, OperationClassifier};
use crate::publish::{OperationAspect, UsageAggregateRecord, UsagePublisher};
use crate::report::UsageReport;
use crate::validate::{EventValidator, ValidationStats};

/// Everything one `generate_usage` call produces.
#[derive(Debug, Clone, Default)]
pub struct UsageOutput {
    /// Ascending by (bucket, resource).
    pub usage: Vec<UsageAggregateRecord>,
    pub operations: Vec<OperationAspect>,
    pub report: UsageReport,
}

#[derive(Debug, Clone)]
pub struct UsageExtractor {
    config: UsageConfig,
    publisher: UsagePublisher,
}

impl UsageExtractor {
    pub fn new(config: UsageConfig) -> Self {
        let publisher = UsagePublisher::from_config(&config);
        Self { config, publisher }
    }

    /// Run the usage pass and, when enabled, the operation pass.
    pub async fn generate_usage(
        &self,
        source: &dyn WarehouseSource,
        catalog: &TableCatalog,
    ) -> Result<UsageOutput, UsageError> {
        let operations = async {
            if self.config.include_operational_stats {
                self.operation_pass(source, catalog).await.map(Some)
            } else {
                debug!("operational stats disabled");
                Ok(None)
            }
        };

        let ((usage, mut report), operations) =
            tokio::try_join!(self.usage_pass(source, catalog), operations)?;

        let operations = match operations {
            Some((aspects, op_report)) => {
                report.merge(&op_report);
                aspects
            }
            None => Vec::new(),
        };

        Ok(UsageOutput {
            usage,
            operations,
            report,
        })
    }

    #[instrument(skip_all, fields(database = %self.config.database))]
    async fn usage_pass(
        &self,
        source: &dyn WarehouseSource,
        catalog: &TableCatalog,
    ) -> Result<(Vec<UsageAggregateRecord>, UsageReport), UsageError> {
        let mut pager = source.open(&self.config.scan_query()).await?;
        let validator = EventValidator::new(
            QueryKind::Scan,
            pager.columns(),
            catalog,
            self.config.database_alias.as_deref(),
        )?;
        let mut aggregator = UsageAggregator::new(self.config.aggregator_settings()?);
        let mut stats = ValidationStats::default();

        drain_pages(pager.as_mut(), |rows| {
            for row in &rows {
                if let Some(event) = validator.validate(row, &mut stats) {
                    aggregator.fold(&event);
                }
            }
            Ok(())
        })
        .await?;

        let buckets = aggregator.bucket_count() as u64;
        let aggregates = aggregator.finish();
        let records: Vec<_> = aggregates
            .iter()
            .map(|agg| self.publisher.usage_record(agg))
            .collect();

        let mut report = UsageReport::from_usage_pass(stats, records.len() as u64, buckets);
        report.query_evictions = aggregates.iter().map(|a| a.query_freq.evictions()).sum();
        report.user_evictions = aggregates.iter().map(|a| a.user_freq.evictions()).sum();

        info!(
            events = report.usage_events_aggregated,
            malformed = report.usage_rows_malformed,
            filtered = report.usage_rows_filtered,
            buckets,
            records = records.len(),
            "usage pass complete"
        );
        Ok((records, report))
    }

    #[instrument(skip_all)]
    async fn operation_pass(
        &self,
        source: &dyn WarehouseSource,
        catalog: &TableCatalog,
    ) -> Result<(Vec<OperationAspect>, UsageReport), UsageError> {
        let mut pager = source.open(&self.config.operation_query()).await?;
        let validator = EventValidator::new(
            QueryKind::Operation,
            pager.columns(),
            catalog,
            self.config.database_alias.as_deref(),
        )?;
        let classifier = OperationClassifier::new(catalog);
        let mut validation = ValidationStats::default();
        let mut classified = ClassifierStats::default();
        let mut aspects = Vec::new();

        drain_pages(pager.as_mut(), |rows| {
            for row in &rows {
                let Some(event) = validator.validate(row, &mut validation) else {
                    continue;
                };
                if let Some(op) = classifier.classify(&event, Utc::now(), &mut classified)? {
                    aspects.push(self.publisher.operation_aspect(&op));
                }
            }
            Ok(())
        })
        .await?;

        let report = UsageReport::from_operation_pass(validation, classified);
        info!(
            malformed = report.operation_rows_malformed,
            filtered = report.operation_rows_filtered + report.operation_events_filtered,
            incomplete = report.operation_events_incomplete,
            records = report.operation_records_emitted,
            "operation pass complete"
        );
        Ok((aspects, report))
    }
}

/// Feed every page of `pager` to `fold`, in delivery order.
///
/// The fetch of page `n + 1` is in flight while page `n` is folded.
async fn drain_pages<F>(pager: &mut dyn RowPager, mut fold: F) -> Result<(), UsageError>
where
    F: FnMut(Vec<Row>) -> Result<(), UsageError>,
{
    let mut page = pager.fetch_page().await?;
    let mut pages = 0usize;
    while let Some(rows) = page {
        pages += 1;
        debug!(page = pages, rows = rows.len(), "folding page");
        let (next, folded) = tokio::join!(pager.fetch_page(), async { fold(rows) });
        folded?;
        page = next?;
    }
    debug!(pages, "source exhausted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use warehouse_source::RowValue;
    use warehouse_source::providers::memory::MemorySource;

    fn config() -> UsageConfig {
        UsageConfig::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap(),
            "dev",
        )
    }

    fn scan_columns() -> Vec<String> {
        crate::event::RowSchema::expected_columns(QueryKind::Scan)
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn scan_row(user: &str) -> Row {
        Row::new(vec![
            RowValue::Int(1),
            RowValue::Int(2),
            RowValue::from(user),
            RowValue::Int(3),
            RowValue::from("SELECT 1"),
            RowValue::from("dev"),
            RowValue::from("public"),
            RowValue::from("orders"),
            RowValue::from("2024-03-01 10:00:00"),
            RowValue::from("2024-03-01 10:00:01"),
        ])
    }

    #[tokio::test]
    async fn drain_pages_preserves_order() {
        let rows: Vec<Row> = (0..5).map(|i| Row::new(vec![RowValue::Int(i)])).collect();
        let source = MemorySource::new(2).with_result(QueryKind::Scan, vec!["n".into()], rows);
        let mut pager = source.open(&config().scan_query()).await.unwrap();

        let mut seen = Vec::new();
        let mut sizes = Vec::new();
        drain_pages(pager.as_mut(), |rows| {
            sizes.push(rows.len());
            seen.extend(rows.into_iter().map(|r| r.get(0).clone()));
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(seen, (0..5).map(RowValue::Int).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn wrong_shape_is_fatal() {
        let source = MemorySource::new(10).with_result(
            QueryKind::Scan,
            vec!["userid".into()],
            vec![Row::new(vec![RowValue::Int(1)])],
        );
        let mut cfg = config();
        cfg.include_operational_stats = false;
        let catalog = TableCatalog::new().with_table("dev", "public", "orders");

        let err = UsageExtractor::new(cfg)
            .generate_usage(&source, &catalog)
            .await
            .unwrap_err();
        assert!(matches!(err, UsageError::QueryShape { .. }));
    }

    #[tokio::test]
    async fn usage_only_run() {
        let source = MemorySource::new(1).with_result(
            QueryKind::Scan,
            scan_columns(),
            vec![scan_row("alice"), scan_row("bob")],
        );
        let mut cfg = config();
        cfg.include_operational_stats = false;
        let catalog = TableCatalog::new().with_table("dev", "public", "orders");

        let out = UsageExtractor::new(cfg)
            .generate_usage(&source, &catalog)
            .await
            .unwrap();
        assert_eq!(out.usage.len(), 1);
        assert!(out.operations.is_empty());
        assert_eq!(out.report.usage_events_aggregated, 2);
        assert_eq!(out.report.buckets, 1);
        assert_eq!(source.opened(QueryKind::Operation), 0);
    }
}
