//! Stream-based data source.
//!
//! Receives metric records from an async byte stream. This is useful for
//! network-based sources like TCP connections.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use crate::data::record::MetricRecord;

use super::DataSource;

/// A data source that receives metric records from an async stream.
///
/// This source spawns a background task that reads newline-delimited JSON
/// from the provided async reader. Each line is one record; `poll()` drains
/// everything received since the last call and returns it as a batch.
///
/// # Example with a byte stream
///
/// ```
/// use std::io::Cursor;
/// use fleetwatch::StreamSource;
///
/// # tokio_test::block_on(async {
/// let data = b"";
/// let stream = Cursor::new(data.to_vec());
/// let source = StreamSource::spawn(stream, "example");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamSource {
    receiver: mpsc::Receiver<MetricRecord>,
    description: String,
    last_error: Arc<Mutex<Option<String>>>,
    error_text: Option<String>,
}

impl StreamSource {
    /// Spawn a background task that reads from the given async reader.
    ///
    /// The reader should provide newline-delimited JSON, one record per
    /// line. Malformed lines are recorded as errors and skipped.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let last_error = Arc::new(Mutex::new(None));
        let error_handle = last_error.clone();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        // EOF
                        *error_handle.lock().unwrap() = Some("Connection closed".to_string());
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<MetricRecord>(trimmed) {
                            Ok(record) => {
                                *error_handle.lock().unwrap() = None;
                                if tx.send(record).await.is_err() {
                                    // Receiver dropped
                                    break;
                                }
                            }
                            Err(e) => {
                                *error_handle.lock().unwrap() =
                                    Some(format!("Parse error: {}", e));
                            }
                        }
                    }
                    Err(e) => {
                        *error_handle.lock().unwrap() = Some(format!("Read error: {}", e));
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            last_error,
            error_text: None,
        }
    }
}

impl DataSource for StreamSource {
    fn poll(&mut self) -> Option<Vec<MetricRecord>> {
        let mut batch = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(record) => batch.push(record),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if batch.is_empty() {
                        *self.last_error.lock().unwrap() =
                            Some("Stream disconnected".to_string());
                    }
                    break;
                }
            }
        }

        // Refresh the cached error text so `error()` can hand out a borrow.
        self.error_text = self.last_error.lock().unwrap().clone();

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.error_text.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_line(vsn: &str) -> String {
        format!(
            r#"{{"timestamp":"2024-06-01T00:00:00Z","name":"sys.uptime","value":300,"meta":{{"node":"n1","host":"n1.ws-nxcore","vsn":"{}"}}}}"#,
            vsn
        )
    }

    #[tokio::test]
    async fn test_stream_source_batches_lines() {
        let data = format!("{}\n{}\n", sample_line("W001"), sample_line("W002"));
        let cursor = Cursor::new(data);

        let mut source = StreamSource::spawn(cursor, "test");

        // Give the background task time to process
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        // Both lines arrive as one batch
        let batch = source.poll().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].meta.vsn.as_deref(), Some("W002"));

        // No more data
        assert!(source.poll().is_none());
    }

    #[tokio::test]
    async fn test_stream_source_description() {
        let cursor = Cursor::new("");
        let source = StreamSource::spawn(cursor, "tcp://localhost:9090");
        assert_eq!(source.description(), "stream: tcp://localhost:9090");
    }

    #[tokio::test]
    async fn test_stream_source_skips_invalid_lines() {
        let data = format!("not valid json\n{}\n", sample_line("W001"));
        let cursor = Cursor::new(data);

        let mut source = StreamSource::spawn(cursor, "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        // The malformed line is dropped, the valid one still arrives
        let batch = source.poll().unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_source_empty_stream() {
        let cursor = Cursor::new("");
        let mut source = StreamSource::spawn(cursor, "test");

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(source.poll().is_none());
    }
}
