//! Record sinks
//!
//! A sink is durable append-only storage for accepted records. The crawl
//! controller hands each accepted record to the sink exactly once; a sink
//! failure is retried once by the controller and then dropped-and-logged,
//! never fatal to the crawl.

use crate::record::StoryRecord;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors that can occur while appending records
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Append-only storage for accepted records
pub trait RecordSink: Send {
    /// Appends one record. Each append is self-contained; a partially
    /// written record must not corrupt previously appended ones.
    fn append(&mut self, record: &StoryRecord) -> SinkResult<()>;

    /// Flushes any buffered output
    fn flush(&mut self) -> SinkResult<()>;
}

/// JSONL sink: one self-contained JSON object per line.
///
/// Each line is independently parseable so a downstream consumer can
/// stream-process the file without loading the whole corpus.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Creates (truncating) the records file at the given path
    pub fn create(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl RecordSink for JsonlSink {
    fn append(&mut self, record: &StoryRecord) -> SinkResult<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        // Flush per record so an interrupted run keeps everything accepted so far
        self.writer.flush()?;
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink for tests; the handle stays readable after the crawl
/// consumes the sink.
#[derive(Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<StoryRecord>>>,
    fail_next: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the accepted records
    pub fn handle(&self) -> Arc<Mutex<Vec<StoryRecord>>> {
        Arc::clone(&self.records)
    }

    /// Makes the next `n` appends fail (for sink-retry tests)
    pub fn fail_next(&mut self, n: usize) {
        self.fail_next = n;
    }
}

impl RecordSink for MemorySink {
    fn append(&mut self, record: &StoryRecord) -> SinkResult<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected sink failure",
            )));
        }
        self.records
            .lock()
            .expect("sink poisoned")
            .push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> SinkResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_record(title: &str) -> StoryRecord {
        StoryRecord {
            title: title.to_string(),
            url: "https://stories.example/ru/2/drama/chitat_s_1.html".to_string(),
            category: "Drama".to_string(),
            tags: vec!["tag".to_string()],
            publish_date: "1 мая 2023".to_string(),
            author: "Anonymous".to_string(),
            rating: 4.0,
            views: 10,
            content: "text".to_string(),
            content_length: 4,
            word_count: 1,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_jsonl_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        let mut sink = JsonlSink::create(&path).unwrap();
        sink.append(&sample_record("First")).unwrap();
        sink.append(&sample_record("Second")).unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        // Each line independently parseable
        for line in lines {
            let parsed: StoryRecord = serde_json::from_str(line).unwrap();
            assert!(!parsed.title.is_empty());
        }
    }

    #[test]
    fn test_memory_sink_records_visible_through_handle() {
        let mut sink = MemorySink::new();
        let handle = sink.handle();

        sink.append(&sample_record("One")).unwrap();

        let records = handle.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "One");
    }

    #[test]
    fn test_memory_sink_injected_failure() {
        let mut sink = MemorySink::new();
        sink.fail_next(1);

        assert!(sink.append(&sample_record("Fails")).is_err());
        assert!(sink.append(&sample_record("Works")).is_ok());
        assert_eq!(sink.handle().lock().unwrap().len(), 1);
    }
}
