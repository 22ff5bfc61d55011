//! Core configuration for download and transcode orchestration.
//!
//! The caller supplies the resolved downloader/transcoder paths and the
//! target directory; tool discovery and persistence are out of scope here.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Environment variable that disables hardware-accelerated encoding when set
/// to `0`, `false`, `off`, or `no`.
pub const HWACCEL_ENV_VAR: &str = "YTGRAB_HWACCEL";

/// yt-dlp format selector chain: mp4 video + m4a audio, then any premuxed
/// mp4, then any best video+audio, then anything best.
pub const DEFAULT_FORMAT_SELECTOR: &str = "bv*[ext=mp4]+ba[ext=m4a]/b[ext=mp4]/bv*+ba/b";

/// Configuration for the orchestration core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Resolved path to the downloader executable (yt-dlp compatible).
    pub downloader: PathBuf,
    /// Resolved path to the transcoder executable (ffmpeg compatible).
    /// `None` means downloads are left unmerged/unconverted.
    pub transcoder: Option<PathBuf>,
    /// Directory downloads are written into.
    pub download_dir: PathBuf,
    /// Attempt hardware-accelerated encoding before falling back to software.
    pub hwaccel: bool,
    /// Files created within this window after job start are attributed to the job.
    pub recency_window: Duration,
    /// Format selector passed to the downloader.
    pub format_selector: String,
    /// Parallel fragment downloads.
    pub concurrent_fragments: u32,
    /// Per-fragment retry budget.
    pub fragment_retries: u32,
    /// Whole-download retry budget.
    pub retries: u32,
    /// Downloader buffer size argument.
    pub buffer_size: String,
}

impl CoreConfig {
    /// Creates a configuration with the standard tuning. Hardware
    /// acceleration is on unless `YTGRAB_HWACCEL` disables it.
    pub fn new(downloader: PathBuf, download_dir: PathBuf) -> Self {
        Self {
            downloader,
            transcoder: None,
            download_dir,
            hwaccel: hwaccel_value_enabled(env::var(HWACCEL_ENV_VAR).ok().as_deref()),
            recency_window: Duration::from_secs(300),
            format_selector: DEFAULT_FORMAT_SELECTOR.to_string(),
            concurrent_fragments: 10,
            fragment_retries: 10,
            retries: 5,
            buffer_size: "16K".to_string(),
        }
    }

    /// Validates the configuration before a job starts.
    pub fn validate(&self) -> CoreResult<()> {
        if self.downloader.as_os_str().is_empty() {
            return Err(CoreError::Config("downloader path is empty".to_string()));
        }
        if !self.download_dir.is_dir() {
            return Err(CoreError::Config(format!(
                "download directory does not exist: {}",
                self.download_dir.display()
            )));
        }
        if self.format_selector.is_empty() {
            return Err(CoreError::Config("format selector is empty".to_string()));
        }
        Ok(())
    }
}

/// Interprets the hwaccel toggle value; unset or anything other than the
/// recognized off-values keeps hardware acceleration enabled.
fn hwaccel_value_enabled(value: Option<&str>) -> bool {
    match value {
        Some(v) => !matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        ),
        None => true,
    }
}
