//! Archive file naming: renders a configurable pattern with placeholders
//! `{basename}`, `{timestamp}`, `{index}`, `{size}`, `{extension}`.

use chrono::{DateTime, Utc};

pub const DEFAULT_PATTERN: &str = "{basename}_{timestamp}.{extension}";

pub struct NameContext<'a> {
    pub basename: &'a str,
    pub timestamp: DateTime<Utc>,
    pub index: u64,
    pub size: u64,
    pub extension: &'a str,
}

/// Renders `pattern` against `ctx`. `{timestamp}` always uses `YYYYMMDD_HHMMSS`,
/// matching spec §6's default `{basename}_{YYYYMMDD_HHMMSS}.{ext}` naming.
pub fn render(pattern: &str, ctx: &NameContext) -> String {
    pattern
        .replace("{basename}", ctx.basename)
        .replace("{timestamp}", &ctx.timestamp.format("%Y%m%d_%H%M%S").to_string())
        .replace("{index}", &ctx.index.to_string())
        .replace("{size}", &ctx.size.to_string())
        .replace("{extension}", ctx.extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pattern_matches_spec_shape() {
        let ts = DateTime::parse_from_rfc3339("2026-08-01T12:30:45Z").unwrap().with_timezone(&Utc);
        let ctx = NameContext { basename: "app", timestamp: ts, index: 0, size: 0, extension: "log" };
        assert_eq!(render(DEFAULT_PATTERN, &ctx), "app_20260801_123045.log");
    }

    #[test]
    fn all_placeholders_substitute() {
        let ts = DateTime::parse_from_rfc3339("2026-08-01T12:30:45Z").unwrap().with_timezone(&Utc);
        let ctx = NameContext { basename: "app", timestamp: ts, index: 3, size: 4096, extension: "zip" };
        let rendered = render("{basename}-{index}-{size}_{timestamp}.{extension}", &ctx);
        assert_eq!(rendered, "app-3-4096_20260801_123045.zip");
    }
}
