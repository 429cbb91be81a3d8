//! Join and derivation engine.
//!
//! Joins the static inventory (the fleet registry's view of nodes) with
//! aggregated telemetry and pre-fetched health/sanity summaries into the
//! enriched per-node rows the status table and export consume.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Settings;

use super::aggregate::{aggregate, NodeMetrics};
use super::record::{MetricRecord, MetricSample, MetricValue};

/// One row of the fleet inventory, as registered upstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub id: String,
    pub vsn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lon: Option<f64>,
}

/// Reporting status derived from host heartbeat freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Reporting,
    NotReporting,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Reporting => write!(f, "reporting"),
            ReportStatus::NotReporting => write!(f, "not reporting"),
        }
    }
}

/// Pass/fail counts over one node's summary records, details included.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthRollup {
    pub details: Vec<MetricRecord>,
    pub passed: usize,
    pub failed: usize,
}

/// Both rollups for one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeHealth {
    pub sanity: HealthRollup,
    pub health: HealthRollup,
}

/// Per-VSN summary records, pre-fetched by the host layer.
pub type SummaryByVsn = BTreeMap<String, Vec<MetricRecord>>;

/// An inventory row enriched with everything telemetry can derive.
///
/// `status: None` means the node has never been joined with telemetry
/// (newly registered, or no records in the query window), which is
/// distinct from a node whose hosts have gone stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedNode {
    #[serde(flatten)]
    pub inventory: InventoryRow,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    /// Milliseconds since each host's most recent uptime sample, keyed by
    /// host alias. Hosts with no uptime sample are absent, not zero.
    #[serde(default)]
    pub elapsed_times: BTreeMap<String, i64>,
    /// Core-board temperature in degrees C, when the nx host reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub has_static_gps: bool,
    pub has_live_gps: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
    #[serde(default)]
    pub uptimes: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub sys_times: BTreeMap<String, MetricValue>,
    /// Cumulative CPU seconds per host, kept as a full series.
    #[serde(default)]
    pub cpu: BTreeMap<String, Vec<MetricSample>>,
    #[serde(default)]
    pub mem_total: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub mem_free: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub mem_avail: BTreeMap<String, MetricValue>,
    #[serde(default)]
    pub fs_avail: BTreeMap<String, Vec<MetricSample>>,
    #[serde(default)]
    pub fs_size: BTreeMap<String, Vec<MetricSample>>,
    /// Public IP from the wan0 interface, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default)]
    pub health: NodeHealth,
}

/// Short alias for a host string: the second dot-segment remapped through
/// the configured suffix table, falling back to the raw suffix, then to
/// the full host string when there is no dot.
fn host_alias(host: &str, suffixes: &BTreeMap<String, String>) -> String {
    match host.split('.').nth(1) {
        Some(suffix) => suffixes.get(suffix).cloned().unwrap_or_else(|| suffix.to_string()),
        None => host.to_string(),
    }
}

/// Milliseconds since each host's most recent `sys.uptime` sample.
///
/// Hosts without an uptime sample in the window are skipped. When two
/// hosts collapse to the same alias, the fresher timestamp wins.
fn elapsed_times(
    metrics: &NodeMetrics,
    now: DateTime<Utc>,
    suffixes: &BTreeMap<String, String>,
) -> BTreeMap<String, i64> {
    let mut by_alias = BTreeMap::new();
    let mut most_recent: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();

    for (host, host_metrics) in metrics {
        let Some(uptimes) = host_metrics.get("sys.uptime") else {
            continue;
        };
        let Some(latest) = uptimes.iter().map(|s| s.timestamp).max() else {
            continue;
        };

        let key = host_alias(host, suffixes);
        if most_recent.get(&key).is_some_and(|seen| *seen >= latest) {
            continue;
        }

        by_alias.insert(key.clone(), (now - latest).num_milliseconds());
        most_recent.insert(key, latest);
    }

    by_alias
}

/// Latest value of a named metric per host alias.
fn latest_metric(
    metrics: &NodeMetrics,
    name: &str,
    suffixes: &BTreeMap<String, String>,
) -> BTreeMap<String, MetricValue> {
    let mut out = BTreeMap::new();
    for (host, host_metrics) in metrics {
        if let Some(value) = host_metrics.get(name).and_then(|s| s.last()) {
            out.insert(host_alias(host, suffixes), value.value.clone());
        }
    }
    out
}

/// Full series of a named metric per host alias.
fn metric_series(
    metrics: &NodeMetrics,
    name: &str,
    suffixes: &BTreeMap<String, String>,
) -> BTreeMap<String, Vec<MetricSample>> {
    let mut out = BTreeMap::new();
    for (host, host_metrics) in metrics {
        if let Some(samples) = host_metrics.get(name) {
            out.insert(host_alias(host, suffixes), samples.clone());
        }
    }
    out
}

/// Sanity rollup: a check passes on `value == 0` and fails on `> 0`.
pub fn count_node_sanity(data: Option<&[MetricRecord]>) -> HealthRollup {
    rollup(data, |v| v == 0.0, |v| v > 0.0)
}

/// Health rollup: a check passes on `value == 1` and fails on `<= 0`.
pub fn count_node_health(data: Option<&[MetricRecord]>) -> HealthRollup {
    rollup(data, |v| v == 1.0, |v| v <= 0.0)
}

fn rollup(
    data: Option<&[MetricRecord]>,
    pass: impl Fn(f64) -> bool,
    fail: impl Fn(f64) -> bool,
) -> HealthRollup {
    let Some(data) = data else {
        return HealthRollup::default();
    };

    let mut passed = 0;
    let mut failed = 0;
    for record in data {
        if let Some(v) = record.value.as_f64() {
            if pass(v) {
                passed += 1;
            }
            if fail(v) {
                failed += 1;
            }
        }
    }

    let mut details = data.to_vec();
    details.sort_by_key(|r| r.timestamp);

    HealthRollup { details, passed, failed }
}

/// Join inventory with telemetry and summaries into enriched rows.
///
/// Records whose VSN is not in the inventory are dropped first: after a
/// VSN reassignment the old VSN's lingering metrics must not bleed into a
/// new node's row. Missing health/sanity summaries degrade to empty
/// rollups rather than failing the join.
pub fn merge(
    inventory: &[InventoryRow],
    records: &[MetricRecord],
    health: Option<&SummaryByVsn>,
    sanity: Option<&SummaryByVsn>,
    now: DateTime<Utc>,
    settings: &Settings,
) -> Vec<EnrichedNode> {
    let known_vsns: Vec<&str> = inventory.iter().map(|row| row.vsn.as_str()).collect();
    let filtered: Vec<MetricRecord> = records
        .iter()
        .filter(|r| r.meta.vsn.as_deref().is_some_and(|vsn| known_vsns.contains(&vsn)))
        .cloned()
        .collect();

    let by_node = aggregate(Some(filtered.as_slice())).unwrap_or_default();
    let suffixes = &settings.host_suffixes;

    inventory
        .iter()
        .map(|row| {
            let Some(metrics) = by_node.get(&row.id.to_lowercase()) else {
                // no telemetry joined yet, pass the row through
                return EnrichedNode {
                    inventory: row.clone(),
                    ..EnrichedNode::default()
                };
            };

            let elapsed = elapsed_times(metrics, now, suffixes);
            let stale = elapsed.values().any(|ms| *ms > settings.thresholds.fail_ms);
            let status = if stale { ReportStatus::NotReporting } else { ReportStatus::Reporting };

            let temperature = latest_metric(metrics, "iio.in_temp_input", suffixes)
                .get("nx")
                .and_then(MetricValue::as_f64)
                .map(|v| v / 1000.0);

            let live_lat =
                latest_metric(metrics, "sys.gps.lat", suffixes).get("nx").and_then(MetricValue::as_f64);
            let live_lon =
                latest_metric(metrics, "sys.gps.lon", suffixes).get("nx").and_then(MetricValue::as_f64);
            let alt =
                latest_metric(metrics, "sys.gps.alt", suffixes).get("nx").and_then(MetricValue::as_f64);

            let has_static_gps = row.gps_lat.is_some() && row.gps_lon.is_some();
            let has_live_gps = live_lat.is_some() && live_lon.is_some();

            let ip = metric_series(metrics, "sys.net.ip", suffixes)
                .get("nx")
                .and_then(|series| {
                    series.iter().find(|s| s.meta.device.as_deref() == Some("wan0"))
                })
                .map(|s| s.value.to_string());

            EnrichedNode {
                inventory: row.clone(),
                status: Some(status),
                elapsed_times: elapsed,
                temperature,
                has_static_gps,
                has_live_gps,
                lat: row.gps_lat.or(live_lat),
                lng: row.gps_lon.or(live_lon),
                alt,
                uptimes: latest_metric(metrics, "sys.uptime", suffixes),
                sys_times: latest_metric(metrics, "sys.time", suffixes),
                cpu: metric_series(metrics, "sys.cpu_seconds", suffixes),
                mem_total: latest_metric(metrics, "sys.mem.total", suffixes),
                mem_free: latest_metric(metrics, "sys.mem.free", suffixes),
                mem_avail: latest_metric(metrics, "sys.mem.avail", suffixes),
                fs_avail: metric_series(metrics, "sys.fs.avail", suffixes),
                fs_size: metric_series(metrics, "sys.fs.size", suffixes),
                ip,
                health: NodeHealth {
                    sanity: count_node_sanity(sanity.and_then(|s| s.get(&row.vsn)).map(Vec::as_slice)),
                    health: count_node_health(health.and_then(|h| h.get(&row.vsn)).map(Vec::as_slice)),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::Meta;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn inventory_row(id: &str, vsn: &str) -> InventoryRow {
        InventoryRow {
            id: id.to_string(),
            vsn: vsn.to_string(),
            ..InventoryRow::default()
        }
    }

    fn record(
        name: &str,
        value: MetricValue,
        ts: DateTime<Utc>,
        node: &str,
        host: &str,
        vsn: &str,
    ) -> MetricRecord {
        MetricRecord {
            timestamp: ts,
            name: name.to_string(),
            value,
            end: None,
            meta: Meta {
                node: Some(node.to_string()),
                host: Some(host.to_string()),
                vsn: Some(vsn.to_string()),
                ..Meta::default()
            },
        }
    }

    fn uptime(ts: DateTime<Utc>, node: &str, host: &str, vsn: &str) -> MetricRecord {
        record("sys.uptime", MetricValue::Number(300.0), ts, node, host, vsn)
    }

    #[test]
    fn test_fresh_node_is_reporting() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let records = vec![uptime(now() - Duration::minutes(5), "node-1", "node-1.ws-nxcore", "W001")];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].status, Some(ReportStatus::Reporting));
        assert_eq!(merged[0].elapsed_times["nx"], 300_000);
    }

    #[test]
    fn test_any_stale_host_marks_node_not_reporting() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let records = vec![
            uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W001"),
            uptime(now() - Duration::hours(2), "node-1", "node-1.ws-rpi", "W001"),
        ];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        assert_eq!(merged[0].status, Some(ReportStatus::NotReporting));
        // the fresh host's elapsed time is still present
        assert_eq!(merged[0].elapsed_times["nx"], 60_000);
    }

    #[test]
    fn test_node_without_telemetry_passes_through() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let merged = merge(&inventory, &[], None, None, now(), &Settings::default());

        assert_eq!(merged[0].inventory.vsn, "W001");
        assert!(merged[0].status.is_none());
        assert!(merged[0].elapsed_times.is_empty());
    }

    #[test]
    fn test_stale_vsn_records_are_dropped() {
        let inventory = vec![inventory_row("node-1", "W001")];
        // W999 was reassigned away; its records must not join anywhere
        let records = vec![uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W999")];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        assert!(merged[0].status.is_none());
    }

    #[test]
    fn test_lookup_is_by_lowercased_id() {
        let inventory = vec![inventory_row("NODE-1", "W001")];
        let records = vec![uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W001")];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        assert_eq!(merged[0].status, Some(ReportStatus::Reporting));
    }

    #[test]
    fn test_host_alias_mapping_and_fallbacks() {
        let suffixes = Settings::default().host_suffixes;
        assert_eq!(host_alias("node-1.ws-nxcore", &suffixes), "nx");
        assert_eq!(host_alias("node-1.ws-rpi", &suffixes), "rpi");
        // unknown suffix falls back to the raw suffix
        assert_eq!(host_alias("node-1.ws-custom", &suffixes), "ws-custom");
        // no dot falls back to the full host string
        assert_eq!(host_alias("bareword", &suffixes), "bareword");
    }

    #[test]
    fn test_host_without_uptime_absent_from_elapsed() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let records = vec![
            uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W001"),
            record(
                "sys.mem.free",
                MetricValue::Number(1024.0),
                now() - Duration::minutes(1),
                "node-1",
                "node-1.ws-rpi",
                "W001",
            ),
        ];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        // absent, not zero
        assert!(!merged[0].elapsed_times.contains_key("rpi"));
        assert_eq!(merged[0].mem_free["rpi"].as_f64(), Some(1024.0));
    }

    #[test]
    fn test_cpu_seconds_kept_as_full_series() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let records = vec![
            uptime(now() - Duration::minutes(3), "node-1", "node-1.ws-nxcore", "W001"),
            record(
                "sys.cpu_seconds",
                MetricValue::Number(100.0),
                now() - Duration::minutes(2),
                "node-1",
                "node-1.ws-nxcore",
                "W001",
            ),
            record(
                "sys.cpu_seconds",
                MetricValue::Number(160.0),
                now() - Duration::minutes(1),
                "node-1",
                "node-1.ws-nxcore",
                "W001",
            ),
        ];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        // every sample survives, keyed by alias, in stream order
        let series = &merged[0].cpu["nx"];
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].value.as_f64(), Some(100.0));
        assert_eq!(series[1].value.as_f64(), Some(160.0));
        // a host that never reported cpu is absent
        assert!(!merged[0].cpu.contains_key("rpi"));
    }

    #[test]
    fn test_temperature_scaled_from_millidegrees() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let records = vec![
            uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W001"),
            record(
                "iio.in_temp_input",
                MetricValue::Number(42_500.0),
                now() - Duration::minutes(1),
                "node-1",
                "node-1.ws-nxcore",
                "W001",
            ),
        ];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        assert_eq!(merged[0].temperature, Some(42.5));
    }

    #[test]
    fn test_wan_ip_from_nx_series() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let mut lan = record(
            "sys.net.ip",
            MetricValue::Text("192.168.1.5".into()),
            now() - Duration::minutes(2),
            "node-1",
            "node-1.ws-nxcore",
            "W001",
        );
        lan.meta.device = Some("lan0".to_string());
        let mut wan = record(
            "sys.net.ip",
            MetricValue::Text("10.31.81.1".into()),
            now() - Duration::minutes(1),
            "node-1",
            "node-1.ws-nxcore",
            "W001",
        );
        wan.meta.device = Some("wan0".to_string());

        let records = vec![
            uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W001"),
            lan,
            wan,
        ];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        assert_eq!(merged[0].ip.as_deref(), Some("10.31.81.1"));
    }

    #[test]
    fn test_static_gps_wins_over_live() {
        let mut row = inventory_row("node-1", "W001");
        row.gps_lat = Some(41.88);
        row.gps_lon = Some(-87.63);

        let records = vec![
            uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W001"),
            record(
                "sys.gps.lat",
                MetricValue::Number(40.0),
                now() - Duration::minutes(1),
                "node-1",
                "node-1.ws-nxcore",
                "W001",
            ),
            record(
                "sys.gps.lon",
                MetricValue::Number(-88.0),
                now() - Duration::minutes(1),
                "node-1",
                "node-1.ws-nxcore",
                "W001",
            ),
        ];

        let merged = merge(&vec![row], &records, None, None, now(), &Settings::default());
        assert!(merged[0].has_static_gps);
        assert!(merged[0].has_live_gps);
        assert_eq!(merged[0].lat, Some(41.88));
        assert_eq!(merged[0].lng, Some(-87.63));
    }

    #[test]
    fn test_sanity_rollup_counts() {
        let details: Vec<MetricRecord> = [0.0, 0.0, 1.0]
            .iter()
            .enumerate()
            .map(|(i, v)| {
                record(
                    "sys.sanity_status.wifi",
                    MetricValue::Number(*v),
                    now() - Duration::minutes(i as i64),
                    "node-1",
                    "node-1.ws-nxcore",
                    "W001",
                )
            })
            .collect();

        let rollup = count_node_sanity(Some(details.as_slice()));
        assert_eq!(rollup.passed, 2);
        assert_eq!(rollup.failed, 1);
        // details come back sorted by timestamp
        assert!(rollup.details.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_health_rollup_counts() {
        let details: Vec<MetricRecord> = [1.0, 0.0, -1.0, 1.0]
            .iter()
            .map(|v| {
                record(
                    "node_health_check",
                    MetricValue::Number(*v),
                    now(),
                    "node-1",
                    "node-1.ws-nxcore",
                    "W001",
                )
            })
            .collect();

        let rollup = count_node_health(Some(details.as_slice()));
        assert_eq!(rollup.passed, 2);
        assert_eq!(rollup.failed, 2);
    }

    #[test]
    fn test_missing_summaries_degrade_to_empty() {
        let inventory = vec![inventory_row("node-1", "W001")];
        let records = vec![uptime(now() - Duration::minutes(1), "node-1", "node-1.ws-nxcore", "W001")];

        let merged = merge(&inventory, &records, None, None, now(), &Settings::default());
        assert_eq!(merged[0].health.sanity, HealthRollup::default());
        assert_eq!(merged[0].health.health, HealthRollup::default());

        // present summary for another VSN still yields empty for this one
        let mut sanity = SummaryByVsn::new();
        sanity.insert("W999".to_string(), vec![]);
        let merged = merge(&inventory, &records, None, Some(&sanity), now(), &Settings::default());
        assert_eq!(merged[0].health.sanity, HealthRollup::default());
    }
}
