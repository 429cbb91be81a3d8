//! Flat metric record types and stream parsing.
//!
//! These types match the line-delimited JSON produced by the telemetry
//! query API: one flat `{timestamp, name, value, meta}` object per line.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity attached to sanity-test records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Warning,
}

/// Record metadata.
///
/// Only `node`, `host`, `vsn`, `severity`, and `device` are read by the
/// core; any other keys are preserved in `extra` and pass through opaquely
/// to tooltip/label formatters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A metric value: numeric for most system metrics, textual for things
/// like IP addresses and upload URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    /// Numeric view of the value; `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::Number(_) => None,
            MetricValue::Text(s) => Some(s),
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A single time-stamped telemetry record, immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub value: MetricValue,
    /// Explicit end time for ranged samples; most records are points and
    /// assume a configured cell unit instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub meta: Meta,
}

/// A record within an aggregated bucket: the metric name has become the
/// bucket key and is dropped from the leaf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub meta: Meta,
}

impl From<&MetricRecord> for MetricSample {
    fn from(r: &MetricRecord) -> Self {
        Self {
            timestamp: r.timestamp,
            value: r.value.clone(),
            end: r.end,
            meta: r.meta.clone(),
        }
    }
}

/// Parse a newline-delimited JSON record stream.
///
/// Blank lines are skipped; a malformed line is an error (the upstream API
/// frames exactly one record per line).
pub fn parse_records(input: &str) -> Result<Vec<MetricRecord>> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("bad record on line {}", i + 1))
        })
        .collect()
}
