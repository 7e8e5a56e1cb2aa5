//! Bucketed usage aggregation.
//!
//! Every accepted scan event is floored to its time bucket and folded into the
//! [`AggregatedDataset`] for `(bucket, resource)`. Aggregates are created on
//! first sight and only leave memory when [`UsageAggregator::finish`] drains
//! them after the whole pass; there is no incremental flush.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::bucket::BucketDuration;
use crate::error::UsageError;
use crate::event::AccessEvent;
use crate::top_n::TopNTracker;

/// Running usage summary for one resource within one time bucket.
#[derive(Debug, Clone)]
pub struct AggregatedDataset {
    pub bucket_start_time: DateTime<Utc>,
    /// Raw-cased `database.schema.table`.
    pub resource: String,
    pub total_event_count: u64,
    /// Events that carried query text.
    pub query_count: u64,
    pub user_freq: TopNTracker<String>,
    pub query_freq: TopNTracker<String>,
}

impl AggregatedDataset {
    fn new(
        bucket_start_time: DateTime<Utc>,
        resource: String,
        query_capacity: usize,
        user_capacity: usize,
    ) -> Self {
        Self {
            bucket_start_time,
            resource,
            total_event_count: 0,
            query_count: 0,
            user_freq: TopNTracker::with_capacity(user_capacity),
            query_freq: TopNTracker::with_capacity(query_capacity),
        }
    }

    /// Count one read by `user_email`, and its query text when present.
    pub fn add_read_entry(&mut self, user_email: String, query: Option<&str>) {
        self.total_event_count += 1;
        self.user_freq.record(user_email);
        if let Some(q) = query {
            self.query_count += 1;
            self.query_freq.record(q.to_string());
        }
    }
}

/// Derives the user identity recorded for an event.
#[derive(Debug, Clone, Default)]
pub struct UserEmailNormalizer {
    email_domain: Option<String>,
    pattern: Option<Regex>,
}

impl UserEmailNormalizer {
    pub fn new(email_domain: Option<String>, pattern: Option<&str>) -> Result<Self, UsageError> {
        Ok(Self {
            email_domain,
            pattern: pattern.map(Regex::new).transpose()?,
        })
    }

    /// `username` (or `unknown` when empty), suffixed with the fallback domain
    /// when it has no `@`. With a pattern configured, the first capture group
    /// (or the whole match) replaces the result; non-matching names are kept.
    pub fn normalize(&self, username: &str) -> String {
        let mut email = if username.is_empty() {
            "unknown".to_string()
        } else {
            username.to_string()
        };
        if !email.contains('@')
            && let Some(domain) = &self.email_domain
        {
            email.push('@');
            email.push_str(domain);
        }

        if let Some(re) = &self.pattern
            && let Some(caps) = re.captures(&email)
            && let Some(m) = caps.get(1).or_else(|| caps.get(0))
        {
            return m.as_str().to_string();
        }
        email
    }
}

/// Tracker capacities and bucketing used by a [`UsageAggregator`].
#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub bucket_duration: BucketDuration,
    pub query_capacity: usize,
    pub user_capacity: usize,
    pub users: UserEmailNormalizer,
}

#[derive(Debug)]
pub struct UsageAggregator {
    settings: AggregatorSettings,
    buckets: BTreeMap<DateTime<Utc>, BTreeMap<String, AggregatedDataset>>,
    events: u64,
}

impl UsageAggregator {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self {
            settings,
            buckets: BTreeMap::new(),
            events: 0,
        }
    }

    /// Fold one event into its `(bucket, resource)` aggregate.
    pub fn fold(&mut self, event: &AccessEvent) {
        let bucket = self.settings.bucket_duration.floor(event.start_time);
        let resource = event.resource();
        let AggregatorSettings {
            query_capacity,
            user_capacity,
            ..
        } = self.settings;

        let agg = self
            .buckets
            .entry(bucket)
            .or_default()
            .entry(resource.clone())
            .or_insert_with(|| {
                AggregatedDataset::new(bucket, resource, query_capacity, user_capacity)
            });
        agg.add_read_entry(
            self.settings.users.normalize(&event.username),
            event.query_text.as_deref(),
        );
        self.events += 1;
    }

    /// Events folded so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drain every aggregate in ascending `(bucket, resource)` order.
    pub fn finish(self) -> Vec<AggregatedDataset> {
        self.buckets
            .into_values()
            .flat_map(BTreeMap::into_values)
            .collect()
    }
}

/// Aggregate a complete event sequence in one go.
pub fn aggregate<'e>(
    events: impl IntoIterator<Item = &'e AccessEvent>,
    settings: AggregatorSettings,
) -> Vec<AggregatedDataset> {
    let mut agg = UsageAggregator::new(settings);
    for ev in events {
        agg.fold(ev);
    }
    agg.finish()
}
