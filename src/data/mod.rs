//! Data models and processing for fleet telemetry.
//!
//! This module handles the transformation of flat metric record streams
//! into the structured, health-annotated data the views display.
//!
//! ## Submodules
//!
//! - [`record`]: Flat record types and NDJSON stream parsing
//! - [`aggregate`]: Grouping of flat records by node, host, and metric name
//! - [`merge`]: Join of inventory with telemetry into [`EnrichedNode`] rows
//! - [`debounce`]: Restart-on-event debouncer for resize redraws
//!
//! ## Data Flow
//!
//! ```text
//! Vec<MetricRecord> (NDJSON stream)
//!        │
//!        ▼
//! aggregate() ──▶ AggregatedMetrics (node → host → metric → samples)
//!        │
//!        ▼
//! merge(inventory, …) ──▶ Vec<EnrichedNode> (status, elapsed, rollups)
//! ```

pub mod aggregate;
pub mod debounce;
pub mod merge;
pub mod record;

pub use aggregate::{aggregate, AggregatedMetrics, HostMetrics, NodeMetrics};
pub use debounce::Debouncer;
pub use merge::{
    count_node_health, count_node_sanity, merge, EnrichedNode, HealthRollup, InventoryRow,
    NodeHealth, ReportStatus, SummaryByVsn,
};
pub use record::{parse_records, Meta, MetricRecord, MetricSample, MetricValue, Severity};
