//! JSONL transcript of protocol exchanges.
//!
//! Each [`ExchangeEvent`] becomes one JSON line carrying `type`, `seq` and an
//! RFC 3339 `timestamp`, followed by the payload's fields. The file is opened
//! in append mode so consecutive sessions share one transcript.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use toolwire_application::{ExchangeEvent, ExchangeLogger};
use tracing::warn;

/// Thread-safe via `Mutex<BufWriter<File>>`; every line is flushed.
pub struct JsonlExchangeLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    seq: AtomicU64,
}

impl JsonlExchangeLogger {
    /// Open (or create) the transcript at `path`, creating parent directories.
    ///
    /// Returns `None` if the file cannot be opened; the caller runs without
    /// a transcript in that case.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create exchange log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open exchange log {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            seq: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self, event: ExchangeEvent) -> serde_json::Value {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        let mut record = serde_json::Map::new();
        record.insert("type".to_string(), event.event_type.into());
        record.insert("seq".to_string(), seq.into());
        record.insert("timestamp".to_string(), timestamp.into());
        match event.payload {
            serde_json::Value::Object(fields) => {
                for (key, value) in fields {
                    record.entry(key).or_insert(value);
                }
            }
            serde_json::Value::Null => {}
            other => {
                record.insert("data".to_string(), other);
            }
        }
        serde_json::Value::Object(record)
    }
}

impl ExchangeLogger for JsonlExchangeLogger {
    fn log(&self, event: ExchangeEvent) {
        let record = self.record(event);
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        if writeln!(writer, "{}", line)
            .and_then(|()| writer.flush())
            .is_err()
        {
            warn!("Exchange log write failed: {}", self.path.display());
        }
    }
}

impl Drop for JsonlExchangeLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn writes_one_record_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.jsonl");
        let logger = JsonlExchangeLogger::open(&path).unwrap();

        logger.log(ExchangeEvent::new(
            "tool_request",
            serde_json::json!({ "stream_id": "c-1", "tool": "read_file" }),
        ));
        logger.log(ExchangeEvent::new(
            "tool_response",
            serde_json::json!({ "stream_id": "c-1", "ok": true }),
        ));
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["type"], "tool_request");
        assert_eq!(records[0]["seq"], 0);
        assert_eq!(records[0]["tool"], "read_file");
        assert_eq!(records[1]["type"], "tool_response");
        assert_eq!(records[1]["seq"], 1);
        assert_eq!(records[1]["ok"], true);
        assert!(records[1]["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn payload_cannot_override_envelope_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange.jsonl");
        let logger = JsonlExchangeLogger::open(&path).unwrap();

        logger.log(ExchangeEvent::new(
            "init_finished",
            serde_json::json!({ "type": "spoofed", "events": 3 }),
        ));
        logger.log(ExchangeEvent::new("init_request", serde_json::json!("raw")));
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records[0]["type"], "init_finished");
        assert_eq!(records[0]["events"], 3);
        assert_eq!(records[1]["data"], "raw");
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("exchange.jsonl");

        for _ in 0..2 {
            let logger = JsonlExchangeLogger::open(&path).unwrap();
            logger.log(ExchangeEvent::new("tool_declined", serde_json::json!({})));
        }

        assert_eq!(read_lines(&path).len(), 2);
    }
}
