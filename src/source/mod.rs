//! Data source abstraction for receiving metric records.
//!
//! This module provides a trait-based abstraction for receiving telemetry
//! from various backends (files, network streams, in-memory channels).

mod channel;
mod file;
mod stream;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use stream::StreamSource;

use std::fmt::Debug;

use crate::data::record::MetricRecord;

/// Trait for receiving metric records from various sources.
///
/// Implementations provide batches of records from different backends -
/// file polling, network streams, or in-memory channels.
///
/// # Example
///
/// ```
/// use fleetwatch::{DataSource, FileSource};
///
/// let mut source = FileSource::new("records.ndjson");
/// if let Some(records) = source.poll() {
///     println!("got {} records", records.len());
/// }
/// ```
pub trait DataSource: Send + Debug {
    /// Poll for new records.
    ///
    /// Returns `Some(records)` if new data is available, `None` otherwise.
    /// This method should be non-blocking.
    fn poll(&mut self) -> Option<Vec<MetricRecord>>;

    /// Returns a human-readable description of the source.
    ///
    /// Used for display in the TUI status bar.
    fn description(&self) -> &str;

    /// Check if the source has encountered an error.
    ///
    /// Returns the error message if an error occurred during the last poll.
    fn error(&self) -> Option<&str>;
}
