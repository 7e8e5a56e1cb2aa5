//! UTC time-bucket mapping for usage aggregation.
//!
//! - One stable epoch: Unix (1970-01-01T00:00:00Z).
//! - Hour and day buckets are fixed width, so flooring is second-based math.
//!
//! All functions assume the input timestamp is UTC.

use std::{fmt, str::FromStr};

use anyhow::bail;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

/// Unix epoch start (1970-01-01T00:00:00Z).
pub const EPOCH_UNIX: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Number of seconds in an hour.
pub const SECS_PER_HOUR: i64 = 60 * 60;
/// Number of seconds in a day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Granularity of usage buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BucketDuration {
    /// UTC hour
    Hour,
    /// UTC day
    #[default]
    Day,
}

impl BucketDuration {
    /// Bucket width in seconds.
    pub const fn width_secs(self) -> i64 {
        match self {
            BucketDuration::Hour => SECS_PER_HOUR,
            BucketDuration::Day => SECS_PER_DAY,
        }
    }

    /// Floor `ts` to the start of its bucket.
    pub fn floor(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        bucket_start_utc(bucket_id(ts, self), self)
    }
}

/// Compute the bucket id for a UTC timestamp.
///
/// Ids are signed so instants before the epoch still floor downwards.
pub fn bucket_id(ts_utc: DateTime<Utc>, duration: BucketDuration) -> i64 {
    let secs = ts_utc.signed_duration_since(EPOCH_UNIX).num_seconds();
    secs.div_euclid(duration.width_secs())
}

/// Get the UTC start instant for a bucket id.
pub fn bucket_start_utc(id: i64, duration: BucketDuration) -> DateTime<Utc> {
    EPOCH_UNIX + Duration::seconds(id * duration.width_secs())
}

impl fmt::Display for BucketDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketDuration::Hour => write!(f, "HOUR"),
            BucketDuration::Day => write!(f, "DAY"),
        }
    }
}

impl FromStr for BucketDuration {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOUR" => Ok(BucketDuration::Hour),
            "DAY" => Ok(BucketDuration::Day),
            "" => bail!("empty bucket duration"),
            other => bail!("unknown bucket duration: {other}"),
        }
    }
}

/// Accepts `HOUR`/`DAY` in any case.
impl<'de> Deserialize<'de> for BucketDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
