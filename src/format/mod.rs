//! Record formatters used by output sinks: structured JSON and
//! placeholder-based text templates.

pub mod json;
pub mod template;

use crate::record::LogRecord;

/// Renders a `LogRecord` into the bytes a sink writes. Sinks hold an
/// `Option<Box<dyn Formatter>>`; `None` means "write the raw message".
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> String;
}

/// The default formatter when a sink has none configured: just the message,
/// matching spec §4.4's "default passes the raw message".
pub struct RawFormatter;

impl Formatter for RawFormatter {
    fn format(&self, record: &LogRecord) -> String {
        record.message.clone()
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> String {
        json::to_json_string(record, self.pretty)
    }
}

pub struct TemplateFormatter {
    pub template: String,
}

impl Formatter for TemplateFormatter {
    fn format(&self, record: &LogRecord) -> String {
        template::format_with_template(&self.template, record)
    }
}
