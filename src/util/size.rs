//! Human-readable byte-size parsing, backing the rotation `Size` strategy,
//! the pre-check disk-space formula, and the config schema's size fields.
//!
//! The teacher crate duplicated this parser three times (`utils::error`,
//! `backend::rotation`, `backend::file`); this crate keeps one copy built
//! on `byte_unit`.

use byte_unit::Byte;

/// Parses strings like `"10MB"`, `"1.5 GiB"`, `"500"` (bytes) into a byte
/// count. Returns `None` on malformed input rather than erroring, since
/// callers generally want to fall back to a sane default.
pub fn parse_bytes(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    Byte::parse_str(trimmed, true).ok().map(|b| b.as_u64())
}

/// Renders a byte count using `byte_unit`'s adaptive unit selection, e.g.
/// `format_bytes(10_485_760) == "10.00 MiB"`.
pub fn format_bytes(bytes: u64) -> String {
    Byte::from_u64(bytes).get_appropriate_unit(byte_unit::UnitType::Binary).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_units() {
        assert_eq!(parse_bytes("500B"), Some(500));
        assert_eq!(parse_bytes("1KB"), Some(1000));
        assert_eq!(parse_bytes("1KiB"), Some(1024));
        assert_eq!(parse_bytes("10MB"), Some(10_000_000));
        assert_eq!(parse_bytes("1GiB"), Some(1024 * 1024 * 1024));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_bytes(""), None);
        assert_eq!(parse_bytes("not-a-size"), None);
    }

    #[test]
    fn format_round_trips_order_of_magnitude() {
        let s = format_bytes(10 * 1024 * 1024);
        assert!(s.contains("MiB"), "got {s}");
    }
}
