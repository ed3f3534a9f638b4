//! Structured health log.
//!
//! An append-only JSONL sink: one `{ts, level, event, data}` object per
//! line, UTC RFC-3339 timestamps. Logging is observational only: a sink
//! that fails to open or write must never abort the control loop, so every
//! failure here is swallowed after a diagnostic warning.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::warn;

pub struct HealthLog {
    // None when the sink could not be opened; events are then dropped.
    writer: Mutex<Option<File>>,
}

impl HealthLog {
    /// Open (or create) the log file in append mode. Never fails: an
    /// unopenable sink degrades to a disabled log.
    pub fn open(path: &Path) -> Self {
        let writer = open_append(path)
            .map_err(|e| warn!(path = %path.display(), "health log unavailable: {e}"))
            .ok();
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// A log that drops everything, for tests and degraded startup paths.
    pub fn disabled() -> Self {
        Self {
            writer: Mutex::new(None),
        }
    }

    pub fn info(&self, event: &str, data: Value) {
        self.write("info", event, data);
    }

    pub fn warn(&self, event: &str, data: Value) {
        self.write("warn", event, data);
    }

    pub fn error(&self, event: &str, data: Value) {
        self.write("error", event, data);
    }

    fn write(&self, level: &str, event: &str, data: Value) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "level": level,
            "event": event,
            "data": data,
        });

        let mut guard = self.writer.lock();
        if let Some(file) = guard.as_mut() {
            if writeln!(file, "{entry}").is_err() {
                // One warning, then stop trying; the bridge keeps running.
                warn!("health log write failed, disabling sink");
                *guard = None;
            }
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_append_as_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.jsonl");

        let log = HealthLog::open(&path);
        log.info("startup", json!({"instance": 1}));
        log.warn("serial_no_ports", json!({}));
        log.error("tcp_accept_failed", json!({"error": "boom"}));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["level"], "info");
        assert_eq!(first["event"], "startup");
        assert_eq!(first["data"]["instance"], 1);
        assert!(first["ts"].as_str().unwrap().ends_with('Z'));

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["level"], "warn");
        let third: Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(third["level"], "error");
    }

    #[test]
    fn reopen_appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.jsonl");

        HealthLog::open(&path).info("first", json!({}));
        HealthLog::open(&path).info("second", json!({}));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn disabled_sink_swallows_events() {
        let log = HealthLog::disabled();
        log.info("anything", json!({"ignored": true}));
    }

    #[test]
    fn unopenable_path_degrades_silently() {
        let dir = tempfile::tempdir().unwrap();
        // A directory at the target path makes the open fail.
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();

        let log = HealthLog::open(&path);
        log.info("dropped", json!({}));
    }
}
