//! Local search over a log file's contents.
//!
//! Trimmed from the teacher's `backend::search` module: substring/regex
//! matching with line-range, level, and context-line options, generalized
//! to work over any `Read + Seek` source (an open `File` handle for the
//! active log, or one reopened for an archived file) instead of always
//! reopening the path by name. Structured-field indexing is out of scope.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub case_sensitive: bool,
    pub first_only: bool,
    pub use_regex: bool,
    pub start_line: Option<usize>,
    pub end_line: Option<usize>,
    pub max_results: Option<usize>,
    pub context_before: Option<usize>,
    pub context_after: Option<usize>,
    pub level_filter: Option<String>,
    pub invert_match: bool,
}

#[derive(Debug, Clone)]
pub struct SearchMatch {
    pub line_number: usize,
    pub content: String,
    pub matched_text: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

/// Searches `path` for `pattern`, opening it fresh. Convenience wrapper
/// around [`search`] for callers that don't already hold an open handle.
pub fn search_file<P: AsRef<Path>>(path: P, pattern: &str, options: &SearchOptions) -> io::Result<Vec<SearchMatch>> {
    let mut file = std::fs::File::open(path)?;
    search(&mut file, pattern, options)
}

/// Searches any seekable byte source for `pattern`. Seeks to the start
/// before reading, so a caller can pass the active file's own handle and
/// continue appending afterward without reopening it.
pub fn search<R: Read + Seek>(source: &mut R, pattern: &str, options: &SearchOptions) -> io::Result<Vec<SearchMatch>> {
    source.seek(SeekFrom::Start(0))?;
    let reader = BufReader::new(source);
    let mut all_lines = Vec::new();
    for line in reader.lines() {
        all_lines.push(line?);
    }

    let regex_matcher = if options.use_regex {
        match regex::Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(_) => return Ok(Vec::new()),
        }
    } else {
        None
    };

    let start = options.start_line.unwrap_or(1);
    let end = options.end_line.unwrap_or(all_lines.len());
    let mut results = Vec::new();

    for (idx, line) in all_lines.iter().enumerate() {
        let line_num = idx + 1;
        if line_num < start || line_num > end {
            continue;
        }

        if let Some(level) = &options.level_filter {
            if !line.to_uppercase().contains(&level.to_uppercase()) {
                continue;
            }
        }

        let matches = if let Some(re) = &regex_matcher {
            re.is_match(line)
        } else if options.case_sensitive {
            line.contains(pattern)
        } else {
            line.to_lowercase().contains(&pattern.to_lowercase())
        };

        if matches == options.invert_match {
            continue;
        }

        let matched_text = matched_text(line, pattern, &regex_matcher, options.case_sensitive);
        let context_before = options.context_before.map(|n| all_lines[idx.saturating_sub(n)..idx].to_vec()).unwrap_or_default();
        let context_after = options
            .context_after
            .map(|n| all_lines[idx + 1..(idx + 1 + n).min(all_lines.len())].to_vec())
            .unwrap_or_default();

        results.push(SearchMatch { line_number: line_num, content: line.clone(), matched_text, context_before, context_after });

        if options.first_only || options.max_results.is_some_and(|max| results.len() >= max) {
            break;
        }
    }

    Ok(results)
}

fn matched_text(line: &str, pattern: &str, regex_matcher: &Option<regex::Regex>, case_sensitive: bool) -> String {
    if let Some(re) = regex_matcher {
        return re.find(line).map(|m| m.as_str().to_string()).unwrap_or_else(|| pattern.to_string());
    }
    if case_sensitive {
        line.find(pattern).map(|pos| line[pos..pos + pattern.len()].to_string()).unwrap_or_else(|| pattern.to_string())
    } else {
        let pattern_lower = pattern.to_lowercase();
        line.to_lowercase()
            .find(&pattern_lower)
            .map(|pos| line[pos..pos + pattern.len()].to_string())
            .unwrap_or_else(|| pattern.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn cursor(lines: &[&str]) -> Cursor<Vec<u8>> {
        let mut buf = Vec::new();
        for line in lines {
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
        }
        Cursor::new(buf)
    }

    #[test]
    fn finds_matching_lines() {
        let mut src = cursor(&["error occurred", "info message", "another error"]);
        let results = search(&mut src, "error", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].line_number, 1);
        assert_eq!(results[1].line_number, 3);
    }

    #[test]
    fn case_sensitive_narrows_matches() {
        let mut src = cursor(&["ERROR", "error", "Error"]);
        let options = SearchOptions { case_sensitive: true, ..Default::default() };
        let results = search(&mut src, "error", &options).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_number, 2);
    }

    #[test]
    fn regex_pattern_matches() {
        let mut src = cursor(&["error: 123", "error: abc", "warning: 456"]);
        let options = SearchOptions { use_regex: true, ..Default::default() };
        let results = search(&mut src, r"error:\s+\d+", &options).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn context_lines_are_captured() {
        let mut src = cursor(&["line 1", "line 2", "MATCH", "line 4", "line 5"]);
        let options = SearchOptions { context_before: Some(1), context_after: Some(1), ..Default::default() };
        let results = search(&mut src, "MATCH", &options).unwrap();
        assert_eq!(results[0].context_before, vec!["line 2"]);
        assert_eq!(results[0].context_after, vec!["line 4"]);
    }

    #[test]
    fn invert_match_returns_non_matching_lines() {
        let mut src = cursor(&["error", "info", "warning", "error"]);
        let options = SearchOptions { invert_match: true, ..Default::default() };
        let results = search(&mut src, "error", &options).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "info");
    }

    #[test]
    fn search_file_reads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "hello world").unwrap();
        let results = search_file(file.path(), "hello", &SearchOptions::default()).unwrap();
        assert_eq!(results.len(), 1);
    }
}
