//! Usage extraction settings.
//!
//! Loaded from TOML; every key except the window and the database has a
//! default:
//!
//! ```toml
//! start_time = "2024-03-01T00:00:00Z"
//! end_time = "2024-03-02T00:00:00Z"
//! database = "dev"
//! bucket_duration = "HOUR"
//! email_domain = "co.com"
//! ```

use anyhow::{Context, bail, ensure};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use warehouse_source::UsageQuery;

use crate::aggregate::{AggregatorSettings, UserEmailNormalizer};
use crate::bucket::BucketDuration;
use crate::error::UsageError;
use crate::publish::QUERY_LIST_BUDGET;

const TRIM_SUFFIX_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsageConfig {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Database the scan query reads.
    pub database: String,
    /// Replaces the database name of every event before catalog filtering.
    #[serde(default)]
    pub database_alias: Option<String>,
    #[serde(default)]
    pub bucket_duration: BucketDuration,
    #[serde(default = "default_top_n_queries")]
    pub top_n_queries: usize,
    #[serde(default = "default_true")]
    pub include_top_n_queries: bool,
    #[serde(default = "default_query_tracker_capacity")]
    pub query_tracker_capacity: usize,
    #[serde(default = "default_user_tracker_capacity")]
    pub user_tracker_capacity: usize,
    #[serde(default = "default_true")]
    pub include_operational_stats: bool,
    #[serde(default)]
    pub email_domain: Option<String>,
    #[serde(default)]
    pub user_email_pattern: Option<String>,
    #[serde(default)]
    pub format_sql_queries: bool,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub platform_instance: Option<String>,
    #[serde(default = "default_env")]
    pub env: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_top_n_queries() -> usize {
    10
}
fn default_true() -> bool {
    true
}
fn default_query_tracker_capacity() -> usize {
    1000
}
fn default_user_tracker_capacity() -> usize {
    10_000
}
fn default_platform() -> String {
    "redshift".to_string()
}
fn default_env() -> String {
    "PROD".to_string()
}
fn default_page_size() -> usize {
    1000
}

impl UsageConfig {
    /// Defaults for everything but the window and the database.
    pub fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>, database: impl Into<String>) -> Self {
        Self {
            start_time,
            end_time,
            database: database.into(),
            database_alias: None,
            bucket_duration: BucketDuration::default(),
            top_n_queries: default_top_n_queries(),
            include_top_n_queries: true,
            query_tracker_capacity: default_query_tracker_capacity(),
            user_tracker_capacity: default_user_tracker_capacity(),
            include_operational_stats: true,
            email_domain: None,
            user_email_pattern: None,
            format_sql_queries: false,
            platform: default_platform(),
            platform_instance: None,
            env: default_env(),
            page_size: default_page_size(),
        }
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.end_time > self.start_time,
            "end_time {} must be after start_time {}",
            self.end_time,
            self.start_time
        );
        ensure!(!self.database.trim().is_empty(), "database cannot be empty");
        if let Some(alias) = &self.database_alias {
            ensure!(!alias.trim().is_empty(), "database_alias cannot be empty");
        }
        ensure!(self.top_n_queries > 0, "top_n_queries must be positive");
        if QUERY_LIST_BUDGET / self.top_n_queries <= TRIM_SUFFIX_LEN {
            bail!(
                "top_n_queries {} leaves no room per query; lower it",
                self.top_n_queries
            );
        }
        ensure!(
            self.query_tracker_capacity >= self.top_n_queries,
            "query_tracker_capacity ({}) must be at least top_n_queries ({})",
            self.query_tracker_capacity,
            self.top_n_queries
        );
        ensure!(self.user_tracker_capacity > 0, "user_tracker_capacity must be positive");
        ensure!(self.page_size > 0, "page_size must be positive");
        ensure!(!self.platform.trim().is_empty(), "platform cannot be empty");
        if let Some(p) = &self.user_email_pattern {
            Regex::new(p).with_context(|| format!("invalid user_email_pattern {p:?}"))?;
        }
        Ok(())
    }

    pub fn scan_query(&self) -> UsageQuery {
        UsageQuery::Scan {
            start: self.start_time,
            end: self.end_time,
            database: self.database.clone(),
        }
    }

    pub fn operation_query(&self) -> UsageQuery {
        UsageQuery::Operation {
            start: self.start_time,
            end: self.end_time,
        }
    }

    pub fn aggregator_settings(&self) -> Result<AggregatorSettings, UsageError> {
        Ok(AggregatorSettings {
            bucket_duration: self.bucket_duration,
            query_capacity: self.query_tracker_capacity,
            user_capacity: self.user_tracker_capacity,
            users: UserEmailNormalizer::new(
                self.email_domain.clone(),
                self.user_email_pattern.as_deref(),
            )?,
        })
    }
}

/// Parse and validate a config from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<UsageConfig> {
    let cfg: UsageConfig = toml::from_str(toml_str).context("failed to parse usage config TOML")?;
    cfg.validate().context("invalid usage config")?;
    Ok(cfg)
}

/// Read a config file from disk, parse, and validate it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<UsageConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        start_time = "2024-03-01T00:00:00Z"
        end_time = "2024-03-02T00:00:00Z"
        database = "dev"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = load_config_str(MINIMAL).unwrap();
        assert_eq!(cfg.bucket_duration, BucketDuration::Day);
        assert_eq!(cfg.top_n_queries, 10);
        assert_eq!(cfg.query_tracker_capacity, 1000);
        assert_eq!(cfg.user_tracker_capacity, 10_000);
        assert!(cfg.include_top_n_queries);
        assert!(cfg.include_operational_stats);
        assert!(!cfg.format_sql_queries);
        assert_eq!(cfg.platform, "redshift");
        assert_eq!(cfg.env, "PROD");
        assert_eq!(cfg.email_domain, None);
        assert_eq!(cfg, UsageConfig::new(cfg.start_time, cfg.end_time, "dev"));
    }

    #[test]
    fn parses_every_option() {
        let cfg = load_config_str(
            r#"
            start_time = "2024-03-01T00:00:00-05:00"
            end_time = "2024-03-01T12:00:00Z"
            database = "dev"
            database_alias = "analytics"
            bucket_duration = "HOUR"
            top_n_queries = 5
            include_top_n_queries = false
            query_tracker_capacity = 50
            user_tracker_capacity = 20
            include_operational_stats = false
            email_domain = "co.com"
            user_email_pattern = "^(.*)$"
            format_sql_queries = true
            platform = "redshift"
            platform_instance = "cluster1"
            env = "DEV"
            page_size = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.start_time.to_rfc3339(), "2024-03-01T05:00:00+00:00");
        assert_eq!(cfg.bucket_duration, BucketDuration::Hour);
        assert_eq!(cfg.database_alias.as_deref(), Some("analytics"));
        assert_eq!(cfg.platform_instance.as_deref(), Some("cluster1"));
        assert!(cfg.aggregator_settings().is_ok());
    }

    fn config_with(overrides: &str) -> String {
        let mut text = String::from("database = \"dev\"\n");
        if !overrides.contains("start_time") {
            text.push_str("start_time = \"2024-03-01T00:00:00Z\"\n");
        }
        if !overrides.contains("end_time") {
            text.push_str("end_time = \"2024-03-02T00:00:00Z\"\n");
        }
        text + overrides
    }

    #[test]
    fn rejects_bad_combinations() {
        let cases = [
            ("end_time = \"2024-02-01T00:00:00Z\"", "end_time"),
            ("top_n_queries = 0", "top_n_queries"),
            ("top_n_queries = 20\nquery_tracker_capacity = 5", "query_tracker_capacity"),
            ("top_n_queries = 7000\nquery_tracker_capacity = 7000", "no room"),
            ("user_email_pattern = \"(\"", "user_email_pattern"),
            ("page_size = 0", "page_size"),
            ("database_alias = \" \"", "database_alias"),
        ];
        for (overrides, needle) in cases {
            let err = load_config_str(&config_with(overrides)).unwrap_err();
            assert!(format!("{err:#}").contains(needle), "{overrides}: {err:#}");
        }
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = load_config_str(&format!("{MINIMAL}\nbucket = \"DAY\"")).unwrap_err();
        assert!(format!("{err:#}").contains("parse usage config"));
    }

    #[test]
    fn loads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(MINIMAL.as_bytes()).unwrap();
        let cfg = load_config_path(f.path()).unwrap();
        assert_eq!(cfg.database, "dev");
        assert!(load_config_path(f.path().with_extension("missing")).is_err());
    }

    #[test]
    fn queries_use_the_window() {
        let cfg = load_config_str(MINIMAL).unwrap();
        assert_eq!(cfg.scan_query().kind(), warehouse_source::QueryKind::Scan);
        assert!(cfg.scan_query().render().contains("'2024-03-01 00:00:00'"));
        assert!(cfg.operation_query().render().contains("'2024-03-02 00:00:00'"));
    }
}
