//! URL resolution: classifying an input URL and extracting direct media
//! links before the download starts.
//!
//! Resolution is advisory and never fatal. Whatever the inspection calls
//! report, the job proceeds to the download stage; an undecidable URL is
//! simply handed to the downloader opaque.

use std::time::Duration;

use log::debug;
use serde::Deserialize;

use crate::config::CoreConfig;
use crate::events::{Event, EventDispatcher};
use crate::process;

/// Selector for a single premuxed file, preferring mp4. Tried first because
/// one merged link is the most useful thing to surface.
pub const MERGED_SELECTOR: &str = "b[ext=mp4]/b";

/// Selector that accepts separate video and audio streams.
pub const SPLIT_SELECTOR: &str = "bv*+ba/b";

const INSPECT_TIMEOUT: Duration = Duration::from_secs(30);

/// What resolution learned about a URL.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// URL as the caller supplied it.
    pub original_url: String,
    /// Best URL known so far: a direct media link when one was extracted,
    /// otherwise the original URL.
    pub resolved_url: String,
    /// Whether `resolved_url` points at raw media rather than a page.
    pub is_direct: bool,
    /// Whether the URL expands to two or more entries.
    pub is_playlist: bool,
    /// Entry count when `is_playlist`.
    pub playlist_count: usize,
}

impl ResolvedTarget {
    /// A target nothing could be learned about; the downloader gets the
    /// URL as-is.
    pub fn opaque(url: &str) -> Self {
        Self {
            original_url: url.to_string(),
            resolved_url: url.to_string(),
            is_direct: false,
            is_playlist: false,
            playlist_count: 0,
        }
    }
}

/// Subset of the downloader's JSON metadata used for the fallback probe.
#[derive(Debug, Deserialize)]
struct ProbeMetadata {
    #[serde(default)]
    title: Option<String>,
}

pub struct UrlResolver<'a> {
    config: &'a CoreConfig,
    events: &'a EventDispatcher,
}

impl<'a> UrlResolver<'a> {
    pub fn new(config: &'a CoreConfig, events: &'a EventDispatcher) -> Self {
        Self { config, events }
    }

    /// Classifies `url` and extracts a direct link when possible.
    pub fn resolve(&self, url: &str) -> ResolvedTarget {
        self.events.log("resolving media URL...");

        if let Some(ids) = self.list_entry_ids(url) {
            self.events.log(format!("resolved: {url}"));
            if ids.len() > 1 {
                self.events
                    .log(format!("playlist detected with {} entries", ids.len()));
                let target = ResolvedTarget {
                    original_url: url.to_string(),
                    resolved_url: url.to_string(),
                    is_direct: false,
                    is_playlist: true,
                    playlist_count: ids.len(),
                };
                self.announce(&target);
                return target;
            }
        }

        // Single entry or failed listing: try to pull a direct link out.
        let target = self.extract_direct(url);
        if target.is_direct {
            self.announce(&target);
            return target;
        }

        // Nothing extractable. A metadata probe says whether the downloader
        // can handle the URL at all; either way the target stays opaque and
        // the real download gets to discover streams itself.
        match self.metadata_probe(url) {
            None => self
                .events
                .log("no direct link found; the downloader will discover streams itself"),
            Some(failure) => self.events.log(format!(
                "resolution failed, will attempt direct download anyway: {failure}"
            )),
        }
        self.announce(&target);
        target
    }

    fn announce(&self, target: &ResolvedTarget) {
        self.events.emit(Event::UrlResolved {
            url: target.resolved_url.clone(),
            is_direct: target.is_direct,
        });
    }

    /// Flat-playlist listing. `Some(ids)` on success (one id per entry),
    /// `None` when the listing call fails.
    fn list_entry_ids(&self, url: &str) -> Option<Vec<String>> {
        let args = ["--flat-playlist", "--get-id", url];
        match process::run_captured(&self.config.downloader, args, INSPECT_TIMEOUT) {
            Ok(out) if out.success() => Some(
                out.stdout
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            Ok(out) => {
                debug!("flat-playlist listing exited {:?}", out.code);
                None
            }
            Err(e) => {
                debug!("flat-playlist listing failed: {e}");
                None
            }
        }
    }

    /// Direct-link extraction: merged selector first, split selector as
    /// fallback. The first returned line is the authoritative resolved URL;
    /// a second line (separate audio) is only logged.
    fn extract_direct(&self, url: &str) -> ResolvedTarget {
        let mut lines = self.direct_url_lines(url, MERGED_SELECTOR);
        if lines.is_empty() {
            lines = self.direct_url_lines(url, SPLIT_SELECTOR);
        }

        if lines.is_empty() {
            return ResolvedTarget::opaque(url);
        }

        if lines.len() == 1 {
            self.events
                .log("extracted merged direct link (quality may be reduced)");
        } else {
            self.events.log(
                "separate video/audio direct links detected; video link is primary, all links follow",
            );
            for (index, link) in lines.iter().enumerate() {
                self.events.log(format!("direct link {}: {link}", index + 1));
            }
        }

        ResolvedTarget {
            original_url: url.to_string(),
            resolved_url: lines.swap_remove(0),
            is_direct: true,
            is_playlist: false,
            playlist_count: 0,
        }
    }

    fn direct_url_lines(&self, url: &str, selector: &str) -> Vec<String> {
        let args = ["-f", selector, "-g", "--no-playlist", url];
        match process::run_captured(&self.config.downloader, args, INSPECT_TIMEOUT) {
            Ok(out) if out.success() => out
                .stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Ok(out) => {
                debug!("direct extraction with '{selector}' exited {:?}", out.code);
                Vec::new()
            }
            Err(e) => {
                debug!("direct extraction with '{selector}' failed: {e}");
                Vec::new()
            }
        }
    }

    /// Metadata-only probe of the first entry. `None` when the downloader
    /// handles the URL, `Some(reason)` when it does not.
    fn metadata_probe(&self, url: &str) -> Option<String> {
        let args = ["--dump-json", "--max-downloads", "1", url];
        match process::run_captured(&self.config.downloader, args, INSPECT_TIMEOUT) {
            Ok(out) if out.success() => {
                if let Some(line) = out.stdout.lines().find(|line| !line.trim().is_empty()) {
                    if let Ok(meta) = serde_json::from_str::<ProbeMetadata>(line) {
                        if let Some(title) = meta.title {
                            self.events.log(format!("media title: {title}"));
                        }
                    }
                }
                None
            }
            Ok(out) => Some(
                out.stderr
                    .lines()
                    .map(str::trim)
                    .rev()
                    .find(|line| !line.is_empty())
                    .unwrap_or("no diagnostic output")
                    .to_string(),
            ),
            Err(e) => Some(e.to_string()),
        }
    }
}
