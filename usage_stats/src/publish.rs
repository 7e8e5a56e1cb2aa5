//! Records handed to the metadata catalog.
//!
//! Usage aggregates become [`UsageAggregateRecord`]s and operation records
//! become [`OperationAspect`]s, both serialized in camelCase. Resources are
//! lower-cased here and only here; aggregation keys keep warehouse case.

use serde::{Deserialize, Serialize};
use sqlformat::{FormatOptions, QueryParams};

use crate::aggregate::AggregatedDataset;
use crate::bucket::BucketDuration;
use crate::config::UsageConfig;
use crate::operation::{OperationKind, OperationRecord};
use crate::timestamp::to_millis;

/// Character budget shared by all top queries of one record.
pub const QUERY_LIST_BUDGET: usize = 24_000;

const TRIM_SUFFIX: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUsageCount {
    /// `urn:li:corpuser:{local part}`
    pub user: String,
    pub count: u64,
    pub user_email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageAggregateRecord {
    /// Bucket start.
    pub timestamp_millis: i64,
    pub event_granularity: BucketDuration,
    pub dataset_urn: String,
    /// Every accepted event, with or without query text.
    pub total_event_count: u64,
    pub unique_user_count: u64,
    /// Events that carried query text.
    pub total_sql_queries: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_sql_queries: Option<Vec<String>>,
    /// Every user the tracker retained, in rank order; the tracker capacity
    /// bounds it, `top_n_queries` does not.
    pub user_counts: Vec<UserUsageCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationAspect {
    /// When the operation was observed.
    pub timestamp_millis: i64,
    pub last_updated_timestamp: i64,
    pub actor: String,
    pub operation_type: OperationKind,
    pub dataset_urn: String,
}

pub fn make_user_urn(username: &str) -> String {
    format!("urn:li:corpuser:{username}")
}

pub fn make_dataset_urn(platform: &str, name: &str, platform_instance: Option<&str>, env: &str) -> String {
    let name = match platform_instance {
        Some(instance) => format!("{instance}.{name}"),
        None => name.to_string(),
    };
    format!("urn:li:dataset:(urn:li:dataPlatform:{platform},{name},{env})")
}

/// Cut `query` to at most `budget` characters, marking the cut with `...`.
pub fn trim_query(query: &str, budget: usize) -> String {
    if query.chars().count() <= budget {
        return query.to_string();
    }
    if budget <= TRIM_SUFFIX.len() {
        return query.chars().take(budget).collect();
    }
    let mut out: String = query.chars().take(budget - TRIM_SUFFIX.len()).collect();
    out.push_str(TRIM_SUFFIX);
    out
}

/// Pretty-print SQL with upper-cased keywords.
pub fn format_sql(query: &str) -> String {
    sqlformat::format(
        query,
        &QueryParams::None,
        FormatOptions {
            uppercase: true,
            ..FormatOptions::default()
        },
    )
}

/// Turns engine output into catalog records.
#[derive(Debug, Clone)]
pub struct UsagePublisher {
    platform: String,
    platform_instance: Option<String>,
    env: String,
    bucket_duration: BucketDuration,
    top_n_queries: usize,
    include_top_n_queries: bool,
    format_sql_queries: bool,
}

impl UsagePublisher {
    pub fn from_config(cfg: &UsageConfig) -> Self {
        Self {
            platform: cfg.platform.clone(),
            platform_instance: cfg.platform_instance.clone(),
            env: cfg.env.clone(),
            bucket_duration: cfg.bucket_duration,
            top_n_queries: cfg.top_n_queries,
            include_top_n_queries: cfg.include_top_n_queries,
            format_sql_queries: cfg.format_sql_queries,
        }
    }

    pub fn dataset_urn(&self, resource: &str) -> String {
        make_dataset_urn(
            &self.platform,
            &resource.to_lowercase(),
            self.platform_instance.as_deref(),
            &self.env,
        )
    }

    pub fn usage_record(&self, agg: &AggregatedDataset) -> UsageAggregateRecord {
        let top_sql_queries = self.include_top_n_queries.then(|| {
            let budget = QUERY_LIST_BUDGET / self.top_n_queries.max(1);
            agg.query_freq
                .top_k(self.top_n_queries)
                .into_iter()
                .map(|(query, _)| {
                    let text = if self.format_sql_queries {
                        format_sql(&query)
                    } else {
                        query
                    };
                    trim_query(&text, budget)
                })
                .collect()
        });

        // All retained users, not a top-K slice.
        let user_counts = agg
            .user_freq
            .ranked()
            .into_iter()
            .map(|(email, count)| UserUsageCount {
                user: make_user_urn(email.split('@').next().unwrap_or_default()),
                count,
                user_email: email,
            })
            .collect();

        UsageAggregateRecord {
            timestamp_millis: to_millis(agg.bucket_start_time),
            event_granularity: self.bucket_duration,
            dataset_urn: self.dataset_urn(&agg.resource),
            total_event_count: agg.total_event_count,
            unique_user_count: agg.user_freq.len() as u64,
            total_sql_queries: agg.query_count,
            top_sql_queries,
            user_counts,
        }
    }

    pub fn operation_aspect(&self, op: &OperationRecord) -> OperationAspect {
        OperationAspect {
            timestamp_millis: to_millis(op.observed_at),
            last_updated_timestamp: to_millis(op.last_updated),
            actor: make_user_urn(&op.actor),
            operation_type: op.kind,
            dataset_urn: self.dataset_urn(&op.resource),
        }
    }
}
