//! File-based data source.
//!
//! Polls a newline-delimited JSON records file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::data::record::{parse_records, MetricRecord};

use super::DataSource;

/// A data source that reads metric records from an NDJSON file.
///
/// Each line in the file is one flat metric record, the framing the
/// upstream query API uses when results are saved to disk.
///
/// The source tracks the file's modification time and only returns
/// new data when the file has been updated.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    last_error: Option<String>,
    last_modified: Option<SystemTime>,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            last_error: None,
            last_modified: None,
        }
    }

    /// Returns the path being monitored.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_modified_time(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).ok()?.modified().ok()
    }

    fn read_file(&mut self) -> Option<Vec<MetricRecord>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match parse_records(&content) {
                Ok(records) => {
                    self.last_error = None;
                    Some(records)
                }
                Err(e) => {
                    self.last_error = Some(format!("Parse error: {:#}", e));
                    None
                }
            },
            Err(e) => {
                self.last_error = Some(format!("Read error: {}", e));
                None
            }
        }
    }
}

impl DataSource for FileSource {
    fn poll(&mut self) -> Option<Vec<MetricRecord>> {
        let current_modified = self.get_modified_time();

        // Check if file has been modified since last read
        let file_changed = match (&self.last_modified, &current_modified) {
            (None, _) => true,        // First poll, always read
            (Some(_), None) => false, // File disappeared, don't update
            (Some(last), Some(current)) => current > last,
        };

        if file_changed {
            if let Some(records) = self.read_file() {
                self.last_modified = current_modified;
                return Some(records);
            }
        }

        None
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, Write};
    use tempfile::NamedTempFile;

    fn sample_ndjson() -> &'static str {
        concat!(
            r#"{"timestamp":"2024-06-01T00:00:00Z","name":"sys.uptime","value":300,"meta":{"node":"n1","host":"n1.ws-nxcore","vsn":"W001"}}"#,
            "\n",
            r#"{"timestamp":"2024-06-01T00:01:00Z","name":"sys.uptime","value":360,"meta":{"node":"n1","host":"n1.ws-rpi","vsn":"W001"}}"#,
        )
    }

    #[test]
    fn test_file_source_new() {
        let source = FileSource::new("/tmp/records.ndjson");
        assert_eq!(source.path(), Path::new("/tmp/records.ndjson"));
        assert_eq!(source.description(), "file: /tmp/records.ndjson");
        assert!(source.error().is_none());
    }

    #[test]
    fn test_file_source_poll_reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_ndjson()).unwrap();

        let mut source = FileSource::new(file.path());

        // First poll should return data
        let records = source.poll();
        assert!(records.is_some());
        assert_eq!(records.unwrap().len(), 2);

        // Second poll without file change should return None
        assert!(source.poll().is_none());
    }

    #[test]
    fn test_file_source_detects_changes() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", sample_ndjson()).unwrap();

        let mut source = FileSource::new(file.path());
        let _ = source.poll();

        // Modify the file (need to wait a bit for mtime to change)
        std::thread::sleep(std::time::Duration::from_millis(10));
        file.rewind().unwrap();
        writeln!(
            file,
            r#"{{"timestamp":"2024-06-01T01:00:00Z","name":"sys.uptime","value":30,"meta":{{"node":"n2","host":"n2.ws-nxcore","vsn":"W002"}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        // Poll again - should detect change
        // Note: This test may be flaky on some filesystems with low mtime resolution
        if let Some(records) = source.poll() {
            assert_eq!(records[0].meta.vsn.as_deref(), Some("W002"));
        }
    }

    #[test]
    fn test_file_source_missing_file() {
        let mut source = FileSource::new("/nonexistent/path/records.ndjson");

        assert!(source.poll().is_none());
        assert!(source.error().is_some());
        assert!(source.error().unwrap().contains("Read error"));
    }

    #[test]
    fn test_file_source_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let mut source = FileSource::new(file.path());

        assert!(source.poll().is_none());
        assert!(source.error().is_some());
        assert!(source.error().unwrap().contains("Parse error"));
    }
}
