//! Core library for orchestrating media downloads and mp4 normalization
//! using yt-dlp-compatible downloaders and ffmpeg-compatible transcoders.
//!
//! This crate provides URL resolution, supervised child processes with
//! line-by-line output classification, hardware encoder probing with
//! software fallback, and cooperative cancellation. Presentation is the
//! caller's job: register an [`EventHandler`] to receive state changes,
//! resolved URLs and log messages.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use ytgrab_core::{
//!     CancellationController, CoreConfig, DownloadJob, DownloadOrchestrator, EncoderProbe,
//!     EventDispatcher,
//! };
//! use std::path::PathBuf;
//!
//! let mut config = CoreConfig::new(
//!     PathBuf::from("/usr/bin/yt-dlp"),
//!     PathBuf::from("/home/me/Downloads"),
//! );
//! config.transcoder = Some(PathBuf::from("/usr/bin/ffmpeg"));
//! config.validate().unwrap();
//!
//! let events = EventDispatcher::new();
//! let probe = EncoderProbe::new();
//! let controller = CancellationController::new();
//!
//! let orchestrator = DownloadOrchestrator::new(&config, &probe, &events, &controller);
//! let report = orchestrator
//!     .run(&DownloadJob {
//!         url: "https://example.com/watch?v=abc".to_string(),
//!         debug: false,
//!     })
//!     .unwrap();
//! println!("{} file(s)", report.files.len());
//! ```

pub mod cancel;
pub mod config;
pub mod download;
pub mod encoder;
pub mod error;
pub mod events;
pub mod lines;
pub mod platform;
pub mod process;
pub mod resolve;
pub mod transcode;

// Re-exports for public API
pub use cancel::{CancelToken, CancellationController};
pub use config::{CoreConfig, DEFAULT_FORMAT_SELECTOR, HWACCEL_ENV_VAR};
pub use download::{DownloadJob, DownloadOrchestrator, JobReport, MEDIA_EXTENSIONS};
pub use encoder::{EncoderChoice, EncoderProbe, GpuVendor, ProbeOutcome, SOFTWARE_ENCODER};
pub use error::{CoreError, CoreResult};
pub use events::{Event, EventDispatcher, EventHandler, JobState};
pub use lines::{classify, indicates_success, LineEvent};
pub use resolve::{ResolvedTarget, UrlResolver};
pub use transcode::{Transcoder, AUDIO_PASSTHROUGH_EXTENSIONS, TARGET_CONTAINER_EXTENSION};
