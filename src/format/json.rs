//! Structured JSON record formatting.
//!
//! Adapted from the teacher's `format::json::JsonRecord` — same field set
//! and the same "serialize, then stringify" shape — with the Python-dict
//! bridging (`dict_to_pairs`, `pyo3` types) dropped since this crate has no
//! language-binding surface.

use crate::record::LogRecord;
use serde::Serialize;

/// Structured JSON log record, one object per line when used by a sink.
#[derive(Serialize)]
struct JsonRecord<'a> {
    timestamp: chrono::DateTime<chrono::Utc>,
    level: &'a str,
    thread: String,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
}

pub fn to_json_string(record: &LogRecord, pretty: bool) -> String {
    let json_record = JsonRecord {
        timestamp: record.timestamp,
        level: record.formatted_level.as_deref().unwrap_or(record.level.as_str()),
        thread: record.thread.to_string(),
        message: &record.message,
        file: record.source.as_ref().map(|s| s.file.as_str()),
        line: record.source.as_ref().map(|s| s.line),
    };
    if pretty {
        serde_json::to_string_pretty(&json_record)
    } else {
        serde_json::to_string(&json_record)
    }
    .unwrap_or_else(|e| format!("{{\"error\":\"json serialization failed: {e}\"}}"))
}
