//! Aggregation of a flat record stream into the nested node/host/metric
//! structure the rest of the dashboard consumes.

use std::collections::BTreeMap;

use super::record::{MetricRecord, MetricSample};

/// Samples grouped by metric name for one host.
pub type HostMetrics = BTreeMap<String, Vec<MetricSample>>;

/// Host metrics grouped by host string for one node.
pub type NodeMetrics = BTreeMap<String, HostMetrics>;

/// The full nested grouping: node id → host → metric name → samples.
///
/// Samples within a bucket are in stream order, which is not necessarily
/// time order; consumers that need chronology must sort by timestamp
/// themselves.
pub type AggregatedMetrics = BTreeMap<String, NodeMetrics>;

/// Group a flat record stream by node, host, and metric name.
///
/// `None` in means "no data yet" and yields `None`, which is distinct from
/// an empty stream yielding an empty mapping. Records missing `meta.node`
/// or `meta.host` cannot be placed in the nested structure and are skipped;
/// that is a filtering policy, not an error, since partial telemetry is
/// routine. No sorting and no deduplication happen here.
pub fn aggregate(records: Option<&[MetricRecord]>) -> Option<AggregatedMetrics> {
    let records = records?;

    let mut by_node = AggregatedMetrics::new();
    for record in records {
        let (Some(node), Some(host)) = (&record.meta.node, &record.meta.host) else {
            continue;
        };

        by_node
            .entry(node.clone())
            .or_default()
            .entry(host.clone())
            .or_default()
            .entry(record.name.clone())
            .or_default()
            .push(MetricSample::from(record));
    }

    Some(by_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{Meta, MetricValue};
    use chrono::{TimeZone, Utc};

    fn record(ts_min: u32, name: &str, value: f64, node: Option<&str>, host: Option<&str>) -> MetricRecord {
        MetricRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 0, ts_min, 0).unwrap(),
            name: name.to_string(),
            value: MetricValue::Number(value),
            end: None,
            meta: Meta {
                node: node.map(String::from),
                host: host.map(String::from),
                ..Meta::default()
            },
        }
    }

    #[test]
    fn test_none_is_distinct_from_empty() {
        assert!(aggregate(None).is_none());
        let empty = aggregate(Some([].as_slice())).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_drops_records_without_node_or_host() {
        let records = vec![
            record(0, "sys.uptime", 1.0, Some("n1"), Some("n1.ws-nxcore")),
            record(1, "sys.uptime", 2.0, None, Some("n1.ws-nxcore")),
            record(2, "sys.uptime", 3.0, Some("n1"), None),
        ];

        let agg = aggregate(Some(records.as_slice())).unwrap();
        let samples = &agg["n1"]["n1.ws-nxcore"]["sys.uptime"];
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value.as_f64(), Some(1.0));
    }

    #[test]
    fn test_includes_every_complete_record_exactly_once() {
        let records = vec![
            record(0, "sys.uptime", 1.0, Some("n1"), Some("n1.ws-nxcore")),
            record(1, "sys.mem.free", 2.0, Some("n1"), Some("n1.ws-nxcore")),
            record(2, "sys.uptime", 3.0, Some("n1"), Some("n1.ws-rpi")),
            record(3, "sys.uptime", 4.0, Some("n2"), Some("n2.ws-nxcore")),
        ];

        let agg = aggregate(Some(records.as_slice())).unwrap();
        let total: usize = agg
            .values()
            .flat_map(|hosts| hosts.values())
            .flat_map(|metrics| metrics.values())
            .map(|samples| samples.len())
            .sum();
        assert_eq!(total, 4);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg["n1"].len(), 2);
    }

    #[test]
    fn test_same_name_buckets_preserve_stream_order() {
        // Deliberately out of time order: the aggregator must not reorder.
        let records = vec![
            record(30, "sys.uptime", 3.0, Some("n1"), Some("n1.ws-nxcore")),
            record(10, "sys.uptime", 1.0, Some("n1"), Some("n1.ws-nxcore")),
            record(20, "sys.uptime", 2.0, Some("n1"), Some("n1.ws-nxcore")),
        ];

        let agg = aggregate(Some(records.as_slice())).unwrap();
        let values: Vec<f64> = agg["n1"]["n1.ws-nxcore"]["sys.uptime"]
            .iter()
            .filter_map(|s| s.value.as_f64())
            .collect();
        assert_eq!(values, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_name_key_is_dropped_from_leaf() {
        let records = vec![record(0, "sys.uptime", 1.0, Some("n1"), Some("n1.ws-nxcore"))];
        let agg = aggregate(Some(records.as_slice())).unwrap();
        let sample = &agg["n1"]["n1.ws-nxcore"]["sys.uptime"][0];
        // MetricSample has no name field; the bucket key carries it.
        assert_eq!(sample.value.as_f64(), Some(1.0));
    }
}
