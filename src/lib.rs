// Library crate: public API items may not be used by the binary
#![allow(unused)]

//! # fleetwatch
//!
//! An operations dashboard (TUI and library) for a distributed sensor-node
//! fleet.
//!
//! This crate joins three inputs into one live picture of a fleet: a stream
//! of per-host metric records, a registry of the nodes that should exist
//! (the inventory), and optional per-node check summaries. The result is
//! rendered as an interactive terminal UI with a sortable status table and
//! a pan/zoom timeline of check outcomes.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Application                           │
//! │  ┌─────────┐    ┌──────────┐    ┌─────────┐    ┌─────────┐  │
//! │  │  app    │───▶│   data   │───▶│   ui    │───▶│ Terminal│  │
//! │  │ (state) │    │  (join)  │    │(render) │    │         │  │
//! │  └────┬────┘    └──────────┘    └────┬────┘    └─────────┘  │
//! │       │                              │                       │
//! │       ▼                              ▼                       │
//! │  ┌─────────┐                   ┌──────────┐                  │
//! │  │ source  │◀── File | TCP     │ timeline │ scales, viewport │
//! │  │ (input) │     | Channel     │ (chart)  │ hit-testing      │
//! │  └─────────┘                   └──────────┘                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`app`]**: Application state, view navigation, and user interaction logic
//! - **[`source`]**: Data source abstraction ([`DataSource`] trait) with implementations
//!   for file polling, TCP streams, and channel-based input
//! - **[`data`]**: Record parsing, per-host aggregation, and the inventory join
//!   that produces [`EnrichedNode`] values with reporting status and check rollups
//! - **[`timeline`]**: Time/band scales, the zoomable viewport, and the cell
//!   matrix widget with tooltips and click hit-testing
//! - **[`ui`]**: Terminal rendering using ratatui - the status table, timeline
//!   view, node detail overlay, and theme support
//! - **[`config`]**: Layered settings (TOML file plus `FLEETWATCH_*` environment
//!   variables) for thresholds, palette, and timeline defaults
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch an NDJSON records file alongside the fleet inventory
//! fleetwatch --records records.ndjson --inventory nodes.json
//!
//! # Live records over TCP, with check summaries
//! fleetwatch --connect localhost:9090 --inventory nodes.json \
//!     --sanity sanity.json --health health.json
//! ```
//!
//! ### As a library with file source
//!
//! ```
//! use fleetwatch::{App, FileSource, Settings};
//!
//! let source = Box::new(FileSource::new("records.ndjson"));
//! let app = App::new(source, Settings::default());
//! ```
//!
//! ### As a library with stream source (TCP, etc.)
//!
//! ```no_run
//! use std::io::Cursor;
//! use fleetwatch::{App, Settings, StreamSource};
//!
//! # tokio_test::block_on(async {
//! // Example with a cursor (in practice, use TcpStream)
//! let data = b"";
//! let stream = Cursor::new(data.to_vec());
//! let source = StreamSource::spawn(stream, "example");
//! let app = App::new(Box::new(source), Settings::default());
//! # });
//! ```
//!
//! ### As a library with channel source (for embedding)
//!
//! ```
//! use fleetwatch::{App, ChannelSource, Settings};
//!
//! // Create a channel for pushing record batches
//! let (tx, source) = ChannelSource::create("ingest");
//!
//! // Create the app
//! let app = App::new(Box::new(source), Settings::default());
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod events;
pub mod source;
pub mod timeline;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::{Settings, Thresholds};
pub use data::{
    merge, parse_records, EnrichedNode, InventoryRow, Meta, MetricRecord, MetricSample,
    MetricValue, ReportStatus, Severity, SummaryByVsn,
};
pub use source::{ChannelSource, DataSource, FileSource, StreamSource};
pub use timeline::{
    CellUnit, Palette, Timeline, TimelineConfig, TimelineData, TooltipPos, ViewportState,
};
