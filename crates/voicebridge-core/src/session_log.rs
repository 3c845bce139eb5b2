//! Append-only session transcript log (spec.md §6 "Persisted state",
//! SPEC_FULL.md §6.7).
//!
//! One JSON line per finalized Utterance. Audio is never persisted, per
//! the spec's Non-goals. Opened once, in append mode, at Orchestrator
//! start; if `pipeline.session_log_path` is unset, no file is touched and
//! `record` is a no-op.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;
use serde::Serialize;

use voicebridge_foundation::error::VoiceBridgeError;

#[derive(Debug, Clone, Serialize)]
pub struct SessionLogRecord {
    pub sequence: u64,
    pub origin_timestamp_ms: u64,
    pub original_text: String,
    pub translated_text: String,
    pub stt_latency_ms: u64,
    pub translation_latency_ms: u64,
    pub synthesis_latency_ms: u64,
}

/// Replaces the literal `{start_time}` placeholder with an RFC 3339
/// timestamp (colons swapped for dashes so the result is a valid filename
/// on every target platform). spec.md §6: "a path templated by the start
/// time".
pub fn template_path(pattern: &str, started_at: chrono::DateTime<chrono::Utc>) -> String {
    let stamp = started_at.format("%Y%m%dT%H%M%SZ").to_string();
    pattern.replace("{start_time}", &stamp)
}

pub struct SessionLog {
    file: Option<Mutex<std::fs::File>>,
}

impl SessionLog {
    /// `path` is expected to already be templated by the caller (e.g. with
    /// the process start time); this type only ever appends to it.
    pub fn open(path: Option<&str>) -> Result<Self, VoiceBridgeError> {
        let file = match path {
            None => None,
            Some(path) => {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| VoiceBridgeError::Fatal(e.to_string()))?;
                    }
                }
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| VoiceBridgeError::Fatal(e.to_string()))?;
                Some(Mutex::new(file))
            }
        };
        Ok(Self { file })
    }

    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn record(&self, record: &SessionLogRecord) {
        let Some(file) = &self.file else { return };
        let Ok(mut line) = serde_json::to_string(record) else {
            return;
        };
        line.push('\n');
        let mut file = file.lock();
        let _ = file.write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_log_never_touches_filesystem() {
        let log = SessionLog::disabled();
        log.record(&SessionLogRecord {
            sequence: 0,
            origin_timestamp_ms: 0,
            original_text: "hola".to_string(),
            translated_text: "hello".to_string(),
            stt_latency_ms: 100,
            translation_latency_ms: 50,
            synthesis_latency_ms: 80,
        });
    }

    #[test]
    fn record_appends_one_json_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let log = SessionLog::open(Some(path.to_str().unwrap())).unwrap();

        log.record(&SessionLogRecord {
            sequence: 0,
            origin_timestamp_ms: 10,
            original_text: "hola".to_string(),
            translated_text: "hello".to_string(),
            stt_latency_ms: 100,
            translation_latency_ms: 50,
            synthesis_latency_ms: 80,
        });
        log.record(&SessionLogRecord {
            sequence: 1,
            origin_timestamp_ms: 20,
            original_text: "adios".to_string(),
            translated_text: "goodbye".to_string(),
            stt_latency_ms: 90,
            translation_latency_ms: 40,
            synthesis_latency_ms: 70,
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["sequence"], 0);
        assert_eq!(first["translated_text"], "hello");
    }

    #[test]
    fn template_path_substitutes_start_time() {
        let started = chrono::DateTime::parse_from_rfc3339("2026-07-31T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let path = template_path("logs/{start_time}-session.jsonl", started);
        assert_eq!(path, "logs/20260731T100000Z-session.jsonl");
    }

    #[test]
    fn missing_path_yields_disabled_log() {
        let log = SessionLog::open(None).unwrap();
        assert!(log.file.is_none());
    }
}
