//! Classification of downloader output lines.
//!
//! The downloader's progress output is semi-structured; everything the
//! orchestrator recognizes lives in one table here, so teaching it a new
//! message is a data change. Patterns are not mutually exclusive and are
//! evaluated per line.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// An event recognized in a single downloader output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// The named file already existed; counts as a completed file.
    AlreadyDownloaded(PathBuf),
    /// The downloader announced its destination file.
    Destination(PathBuf),
    /// The downloader revealed the raw media URL it is fetching. Often the
    /// only way to learn a true direct link for sites where static
    /// inspection fails.
    DirectUrl(String),
}

struct LinePattern {
    regex: &'static Lazy<Regex>,
    event: fn(&Captures<'_>) -> LineEvent,
}

static ALREADY_DOWNLOADED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[download\]\s+(.+?)\s+has already been downloaded\s*$").unwrap()
});

static DESTINATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[download\]\s+Destination:\s+(.+?)\s*$").unwrap());

static HTTP_DOWNLOADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Invoking http downloader on\s+"?(https://[^"\s`]+)"#).unwrap());

static PATTERNS: &[LinePattern] = &[
    LinePattern {
        regex: &ALREADY_DOWNLOADED_RE,
        event: |caps| LineEvent::AlreadyDownloaded(PathBuf::from(caps[1].trim_matches('"'))),
    },
    LinePattern {
        regex: &DESTINATION_RE,
        event: |caps| LineEvent::Destination(PathBuf::from(caps[1].trim_matches('"'))),
    },
    LinePattern {
        regex: &HTTP_DOWNLOADER_RE,
        event: |caps| LineEvent::DirectUrl(caps[1].to_string()),
    },
];

/// Runs every recognized pattern against one output line.
pub fn classify(line: &str) -> Vec<LineEvent> {
    PATTERNS
        .iter()
        .filter_map(|pattern| pattern.regex.captures(line).map(|caps| (pattern.event)(&caps)))
        .collect()
}

/// Markers that mean the downloader did useful work even when it exits
/// non-zero (e.g. one playlist item failed but the rest completed).
pub const SUCCESS_INDICATORS: [&str; 6] = [
    "has already been downloaded",
    "100%",
    "Download complete",
    "Finished downloading",
    "Merging formats",
    "Deleting original file",
];

/// Scans the full captured output for any success indicator.
pub fn indicates_success(output: &str) -> bool {
    SUCCESS_INDICATORS
        .iter()
        .any(|indicator| output.contains(indicator))
}

/// Maximum error-surface size carried by a download failure.
pub const ERROR_TAIL_LIMIT: usize = 1000;

/// Last [`ERROR_TAIL_LIMIT`] characters of the captured output.
pub fn output_tail(output: &str) -> &str {
    let total = output.chars().count();
    if total <= ERROR_TAIL_LIMIT {
        return output;
    }
    match output.char_indices().nth(total - ERROR_TAIL_LIMIT) {
        Some((index, _)) => &output[index..],
        None => output,
    }
}
