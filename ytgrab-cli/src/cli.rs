// ytgrab-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "ytgrab: media download and transcode orchestrator",
    long_about = "Drives a yt-dlp-compatible downloader and an ffmpeg-compatible \
                  transcoder: resolves URLs, downloads, and normalizes results to mp4."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Downloads a URL and converts the result to mp4
    Download(DownloadArgs),
    /// Resolves a URL and prints the direct media link when one exists
    Resolve(ResolveArgs),
}

#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// URL to download (video page, playlist or direct media link)
    #[arg(required = true, value_name = "URL")]
    pub url: String,

    /// Directory downloads are written into (defaults to ~/Downloads)
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Path to the downloader binary (defaults to yt-dlp on PATH)
    #[arg(long, value_name = "PATH")]
    pub downloader: Option<PathBuf>,

    /// Path to the transcoder binary (defaults to ffmpeg on PATH)
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Stream every downloader/transcoder output line to the console
    #[arg(long)]
    pub debug: bool,

    /// Force software encoding even when hardware encoders are available
    #[arg(long)]
    pub no_hwaccel: bool,
}

#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// URL to resolve
    #[arg(required = true, value_name = "URL")]
    pub url: String,

    /// Path to the downloader binary (defaults to yt-dlp on PATH)
    #[arg(long, value_name = "PATH")]
    pub downloader: Option<PathBuf>,
}
