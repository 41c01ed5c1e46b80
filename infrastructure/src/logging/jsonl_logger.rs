//! JSONL file writer for engine events.
//!
//! Each [`EngineEvent`] is written as one JSON line carrying its `type`
//! tag plus a `timestamp`, appended through a buffered writer.

use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use triad_domain::EngineEvent;

/// Event logger that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlEventLogger {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlEventLogger {
    /// Create a logger writing to `path`, creating parent directories.
    ///
    /// Returns `None` (after a warning) if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, event: &EngineEvent) {
        self.write_record(event.to_json());
    }

    fn write_record(&self, record: Value) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        let record = match record {
            Value::Object(mut map) => {
                map.insert("timestamp".to_string(), Value::String(timestamp));
                Value::Object(map)
            }
            other => serde_json::json!({ "timestamp": timestamp, "data": other }),
        };

        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // Flushed per line so a crash keeps every event written so far
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlEventLogger {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use triad_domain::event::names;
    use triad_domain::{AgentId, Phase};

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_writes_one_record_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.events.jsonl");
        let logger = JsonlEventLogger::new(&path).unwrap();

        logger.log(&EngineEvent::transition(Phase::Thinking));
        logger.log(&EngineEvent::stream(AgentId::Gemini, "hm", Phase::Thinking, 1));
        logger.log(&EngineEvent::named(
            names::AGENT_RETRY,
            json!({ "agent": "codex", "retries_left": 1 }),
        ));
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r["timestamp"].is_string()));
        assert_eq!(records[0]["type"], "phase.transition");
        assert_eq!(records[0]["phase"], "THINKING");
        assert_eq!(records[1]["agent"], "gemini");
        assert_eq!(records[2]["name"], names::AGENT_RETRY);
        assert_eq!(records[2]["data"]["retries_left"], 1);
    }

    #[test]
    fn test_non_object_records_are_wrapped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.jsonl");
        let logger = JsonlEventLogger::new(&path).unwrap();
        logger.write_record(json!("just a string"));
        drop(logger);

        let records = read_lines(&path);
        assert_eq!(records[0]["data"], "just a string");
    }

    #[test]
    fn test_unwritable_path_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "").unwrap();
        assert!(JsonlEventLogger::new(blocker.join("events.jsonl")).is_none());
    }
}
