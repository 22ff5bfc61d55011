use std::path::PathBuf;

use thiserror::Error;

/// Custom error types for ytgrab
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {0}: {1}")]
    CommandStart(String, #[source] std::io::Error),

    #[error("command timed out after {0} seconds")]
    Timeout(u64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("download failed with exit code {code}: {tail}")]
    DownloadFailed { code: i32, tail: String },

    #[error("transcode failed for {}: {reason}", input.display())]
    TranscodeFailed { input: PathBuf, reason: String },
}

/// Result type for ytgrab operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;
