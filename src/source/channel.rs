//! Channel-based data source.
//!
//! Receives metric record batches via a tokio watch channel. This is
//! useful for embedding the dashboard in a host that already has its own
//! transport and pushes data rather than having it polled.

use tokio::sync::watch;

use crate::data::record::MetricRecord;

use super::DataSource;

/// A data source that receives record batches via a channel.
///
/// The producer (e.g. an ingest task) sends batches through the channel,
/// and this source provides them to the TUI.
///
/// # Example
///
/// ```
/// use fleetwatch::ChannelSource;
///
/// let (tx, source) = ChannelSource::create("ingest");
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<Vec<MetricRecord>>,
    description: String,
    /// Track if we've returned the initial value yet
    initial_returned: bool,
}

impl ChannelSource {
    /// Create a new channel source.
    ///
    /// # Arguments
    ///
    /// * `receiver` - The receiving end of a watch channel
    /// * `source_description` - A description of where records come from
    pub fn new(receiver: watch::Receiver<Vec<MetricRecord>>, source_description: &str) -> Self {
        let description = format!("channel: {}", source_description);
        Self {
            receiver,
            description,
            initial_returned: false,
        }
    }

    /// Create a channel pair for sending record batches to a ChannelSource.
    ///
    /// Returns (sender, source) where the sender can be used to push
    /// batches and the source can be handed to the dashboard.
    pub fn create(source_description: &str) -> (watch::Sender<Vec<MetricRecord>>, Self) {
        let (tx, rx) = watch::channel(Vec::new());
        let source = Self::new(rx, source_description);
        (tx, source)
    }
}

impl DataSource for ChannelSource {
    fn poll(&mut self) -> Option<Vec<MetricRecord>> {
        // Return the initial value on first poll
        if !self.initial_returned {
            self.initial_returned = true;
            self.receiver.mark_changed();
        }

        // Check if there's a new value without blocking
        if self.receiver.has_changed().unwrap_or(false) {
            Some(self.receiver.borrow_and_update().clone())
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        // Channel sources don't have file-based errors; transport errors
        // belong to the producer side.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{Meta, MetricValue};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_channel_source_poll() {
        let (tx, mut source) = ChannelSource::create("test");

        // Initially returns the default (empty) batch
        let batch = source.poll();
        assert!(batch.is_some());
        assert!(batch.unwrap().is_empty());

        // No change, so poll returns None
        assert!(source.poll().is_none());

        // Send a new batch
        tx.send(vec![MetricRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            name: "sys.uptime".to_string(),
            value: MetricValue::Number(300.0),
            end: None,
            meta: Meta::default(),
        }])
        .unwrap();

        // Now poll returns the new batch
        let batch = source.poll();
        assert_eq!(batch.unwrap().len(), 1);
    }
}
