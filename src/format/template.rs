//! Placeholder-based text formatting, e.g. `"{time} | {level} | {message}"`.
//!
//! Adapted from the teacher's `format::template::format_with_template`: same
//! regex-driven placeholder substitution and `{time:FORMAT}` custom time
//! patterns, retargeted from `(timestamp: &str, extra_fields: &[(String,
//! String)])` onto a `LogRecord` directly since this crate has no per-call
//! extra-fields map — source location fills the equivalent role.

use crate::record::LogRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}:]+)(?::([^}]+))?\}").unwrap());

/// Converts a `YYYY-MM-DD HH:mm:ss`-style pattern into a chrono format string.
fn convert_time_pattern(pattern: &str) -> String {
    pattern
        .replace("YYYY", "%Y")
        .replace("YY", "%y")
        .replace("MM", "%m")
        .replace("DD", "%d")
        .replace("HH", "%H")
        .replace("mm", "%M")
        .replace("ss", "%S")
        .replace("SSS", "%3f")
}

pub fn format_with_template(template: &str, record: &LogRecord) -> String {
    let level = record.formatted_level.as_deref().unwrap_or(record.level.as_str());
    let file = record.source.as_ref().map(|s| s.file.as_str()).unwrap_or("");
    let line = record.source.as_ref().map(|s| s.line.to_string()).unwrap_or_default();
    let thread = record.thread.to_string();

    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let key = caps[1].to_lowercase();
            let time_pattern = caps.get(2).map(|m| m.as_str());
            match key.as_str() {
                "time" => match time_pattern {
                    Some(pattern) => record.timestamp.format(&convert_time_pattern(pattern)).to_string(),
                    None => record.timestamp.to_rfc3339(),
                },
                "level" => level.to_string(),
                "message" => record.message.clone(),
                "thread" => thread.clone(),
                "file" => file.to_string(),
                "line" => line.clone(),
                _ => caps[0].to_string(),
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Severity;

    #[test]
    fn basic_placeholders() {
        let record = LogRecord::new(Severity::Info, "hello");
        let result = format_with_template("[{level}] {message}", &record);
        assert_eq!(result, "[INFO] hello");
    }

    #[test]
    fn unknown_placeholder_is_left_untouched() {
        let record = LogRecord::new(Severity::Info, "hello");
        let result = format_with_template("{nonsense}", &record);
        assert_eq!(result, "{nonsense}");
    }

    #[test]
    fn custom_time_pattern() {
        let record = LogRecord::new(Severity::Info, "hello");
        let result = format_with_template("{time:YYYY-MM-DD}", &record);
        assert_eq!(result.len(), "2026-08-01".len());
        assert!(result.chars().nth(4) == Some('-'));
    }

    #[test]
    fn source_placeholders() {
        let record = LogRecord::new(Severity::Info, "hello").with_source("writer.rs", 10);
        let result = format_with_template("{file}:{line}", &record);
        assert_eq!(result, "writer.rs:10");
    }
}
