//! Measurement dataset loading
//!
//! Resolves one threshold per bucket from the oracle's measurement history.
//! The history file is additive (every measurement is appended to the bucket's
//! `history` and mirrored into `latest`); only `latest` is consulted here.
//!
//! **Resolution per bucket:**
//! - no `latest` (missing, null or empty) → bucket omitted, never zero-filled
//! - `min_threshold` present and status not TIMEOUT → `min_threshold`
//! - otherwise → `safety_threshold`, or the policy fallback (79) if absent
//!
//! The reserved bucket is always dropped regardless of its data.

use crate::{Error, Result};
use qcal_common::CalibrationConfig;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Index of one piece of the approximated domain
pub type Bucket = u32;

/// Outcome tag the oracle attaches to a threshold measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThresholdStatus {
    Success,
    Failed,
    Timeout,
    #[serde(other)]
    Unknown,
}

/// The `latest` measurement of one bucket
///
/// Fields the calibration does not need (seed ranges, fuzz run counts,
/// timestamps) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ThresholdRecord {
    #[serde(default)]
    pub min_threshold: Option<i64>,

    #[serde(default)]
    pub min_threshold_status: Option<ThresholdStatus>,

    #[serde(default)]
    pub safety_threshold: Option<i64>,
}

impl ThresholdRecord {
    /// Resolve the threshold this record contributes
    pub fn resolve(&self, fallback: i64) -> i64 {
        match self.min_threshold {
            Some(min) if self.min_threshold_status != Some(ThresholdStatus::Timeout) => min,
            _ => self.safety_threshold.unwrap_or(fallback),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    #[serde(default)]
    latest: Option<Map<String, Value>>,
}

/// Loader policy knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Bucket index excluded from the domain
    pub reserved_bucket: Bucket,

    /// Threshold used when a record carries no usable value
    pub fallback_threshold: i64,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            reserved_bucket: 64,
            fallback_threshold: 79,
        }
    }
}

impl From<&CalibrationConfig> for LoadPolicy {
    fn from(config: &CalibrationConfig) -> Self {
        Self {
            reserved_bucket: config.reserved_bucket,
            fallback_threshold: config.fallback_threshold,
        }
    }
}

/// Sorted, unique buckets with their aligned resolved thresholds
///
/// Immutable once built; never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    buckets: Vec<Bucket>,
    thresholds: Vec<i64>,
}

impl Dataset {
    /// Build a dataset from aligned sequences
    ///
    /// # Errors
    /// `Error::Data` if the sequences are empty, differ in length, or the
    /// buckets are not strictly increasing.
    pub fn new(buckets: Vec<Bucket>, thresholds: Vec<i64>) -> Result<Self> {
        if buckets.len() != thresholds.len() {
            return Err(Error::Data(format!(
                "{} buckets but {} thresholds",
                buckets.len(),
                thresholds.len()
            )));
        }
        if buckets.is_empty() {
            return Err(Error::Data("dataset contains no buckets".to_string()));
        }
        if let Some(pair) = buckets.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::Data(format!(
                "buckets must be strictly increasing: {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self {
            buckets,
            thresholds,
        })
    }

    /// Build a dataset from `(bucket, threshold)` pairs in any order
    pub fn from_pairs(pairs: &[(Bucket, i64)]) -> Result<Self> {
        let mut sorted = pairs.to_vec();
        sorted.sort_by_key(|&(bucket, _)| bucket);
        let (buckets, thresholds) = sorted.into_iter().unzip();
        Self::new(buckets, thresholds)
    }

    /// Load and resolve a measurement history file
    pub fn load<P: AsRef<Path>>(path: P, policy: LoadPolicy) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Data(format!("cannot read {}: {}", path.display(), e)))?;
        let dataset = Self::from_json_str(&content, policy)?;
        info!(
            "Loaded {} buckets from {}: {} - {}",
            dataset.len(),
            path.display(),
            dataset.buckets[0],
            dataset.buckets[dataset.len() - 1]
        );
        Ok(dataset)
    }

    /// Resolve a measurement history from JSON text
    ///
    /// Accepts either the oracle's file layout (`{"metadata": ..., "buckets": {...}}`)
    /// or a bare object keyed by bucket index.
    pub fn from_json_str(content: &str, policy: LoadPolicy) -> Result<Self> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| Error::Data(format!("invalid JSON: {}", e)))?;

        let section = match root {
            Value::Object(mut map) => match map.remove("buckets") {
                Some(buckets) => buckets,
                None => Value::Object(map),
            },
            other => {
                return Err(Error::Data(format!(
                    "expected an object at top level, found {}",
                    json_kind(&other)
                )))
            }
        };

        let entries: BTreeMap<String, BucketEntry> = serde_json::from_value(section)
            .map_err(|e| Error::Data(format!("invalid bucket section: {}", e)))?;

        Self::from_entries(entries, policy)
    }

    fn from_entries(entries: BTreeMap<String, BucketEntry>, policy: LoadPolicy) -> Result<Self> {
        let mut resolved: BTreeMap<Bucket, i64> = BTreeMap::new();

        for (key, entry) in entries {
            let bucket: Bucket = key
                .trim()
                .parse()
                .map_err(|_| Error::Data(format!("invalid bucket key '{}'", key)))?;

            if bucket == policy.reserved_bucket {
                debug!("Skipping reserved bucket {}", bucket);
                continue;
            }

            let latest = match entry.latest {
                Some(latest) if !latest.is_empty() => latest,
                _ => {
                    debug!("Bucket {} has no latest measurement, omitted", bucket);
                    continue;
                }
            };

            let record: ThresholdRecord = serde_json::from_value(Value::Object(latest))
                .map_err(|e| Error::Data(format!("bucket {}: {}", bucket, e)))?;
            let threshold = record.resolve(policy.fallback_threshold);

            if resolved.insert(bucket, threshold).is_some() {
                return Err(Error::Data(format!("bucket {} appears more than once", bucket)));
            }
        }

        let (buckets, thresholds) = resolved.into_iter().unzip();
        Self::new(buckets, thresholds)
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn thresholds(&self) -> &[i64] {
        &self.thresholds
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Always false for a constructed dataset
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// `(bucket, threshold)` pairs in bucket order
    pub fn iter(&self) -> impl Iterator<Item = (Bucket, i64)> + '_ {
        self.buckets.iter().copied().zip(self.thresholds.iter().copied())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
