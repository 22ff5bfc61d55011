//! End-to-end download job orchestration.
//!
//! One job runs at a time: resolve the URL, run the downloader while
//! classifying its output, reconcile the exit code against success markers,
//! discover the downloaded files and normalize each one to mp4. Every
//! blocking stretch observes the job's cancel token.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;

use crate::cancel::CancellationController;
use crate::config::CoreConfig;
use crate::encoder::{EncoderProbe, GpuVendor};
use crate::error::{CoreError, CoreResult};
use crate::events::{Event, EventDispatcher, JobState};
use crate::lines::{self, LineEvent};
use crate::resolve::{ResolvedTarget, UrlResolver};
use crate::transcode::{extension_lowercase, Transcoder, TARGET_CONTAINER_EXTENSION};

/// Extensions considered downloaded media during directory discovery.
pub const MEDIA_EXTENSIONS: [&str; 8] =
    ["mp4", "webm", "mkv", "flv", "avi", "mp3", "wav", "m4a"];

/// One download request.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub url: String,
    /// Stream every downloader/transcoder output line into the log events.
    pub debug: bool,
}

/// Final report of a finished (or cancelled) job.
#[derive(Debug)]
pub struct JobReport {
    pub state: JobState,
    /// Files produced by the job, post-conversion.
    pub files: Vec<PathBuf>,
    pub resolved: ResolvedTarget,
}

pub struct DownloadOrchestrator<'a> {
    config: &'a CoreConfig,
    probe: &'a EncoderProbe,
    events: &'a EventDispatcher,
    controller: &'a CancellationController,
}

impl<'a> DownloadOrchestrator<'a> {
    pub fn new(
        config: &'a CoreConfig,
        probe: &'a EncoderProbe,
        events: &'a EventDispatcher,
        controller: &'a CancellationController,
    ) -> Self {
        Self {
            config,
            probe,
            events,
            controller,
        }
    }

    /// Runs one job to completion. The caller serializes jobs; the
    /// controller's pid registration assumes at most one is active.
    pub fn run(&self, job: &DownloadJob) -> CoreResult<JobReport> {
        self.config.validate()?;
        let token = self.controller.token();

        self.events.state(JobState::Resolving);
        if token.is_cancelled() {
            return Ok(self.cancelled(ResolvedTarget::opaque(&job.url)));
        }
        let resolver = UrlResolver::new(self.config, self.events);
        let mut resolved = resolver.resolve(&job.url);

        if token.is_cancelled() {
            return Ok(self.cancelled(resolved));
        }

        self.preflight_diagnostics();

        self.events.state(JobState::Downloading);
        let args = self.downloader_args(job);
        self.events.log(format!("starting download: {}", job.url));
        self.events.log(format!(
            "download command: {} {}",
            self.config.downloader.display(),
            render_args(&args)
        ));

        let mut proc = match crate::process::spawn_streaming(&self.config.downloader, &args) {
            Ok(proc) => proc,
            Err(e) => {
                self.events.state(JobState::Failed);
                return Err(e);
            }
        };
        self.controller.set_download_pid(Some(proc.pid()));

        let mut output: Vec<String> = Vec::new();
        let mut reported_paths: Vec<PathBuf> = Vec::new();
        let mut direct_known = resolved.is_direct;
        while let Some(line) = proc.next_line_cancellable(&token) {
            if job.debug {
                self.events.log(line.clone());
            }
            for event in lines::classify(&line) {
                match event {
                    LineEvent::AlreadyDownloaded(path) | LineEvent::Destination(path) => {
                        if !reported_paths.contains(&path) {
                            reported_paths.push(path);
                        }
                    }
                    LineEvent::DirectUrl(url) => {
                        // Upgrade the resolved URL once; later fragments of
                        // the same download repeat the message.
                        if !direct_known {
                            direct_known = true;
                            self.events
                                .log(format!("extracted real download URL: {url}"));
                            resolved.resolved_url = url.clone();
                            resolved.is_direct = true;
                            self.events.emit(Event::UrlResolved {
                                url,
                                is_direct: true,
                            });
                        }
                    }
                }
            }
            output.push(line);
        }

        if token.is_cancelled() {
            proc.kill_tree();
            let _ = proc.wait();
            self.controller.set_download_pid(None);
            return Ok(self.cancelled(resolved));
        }

        let wait_result = proc.wait();
        self.controller.set_download_pid(None);
        let code = match wait_result {
            Ok(code) => code,
            Err(e) => {
                self.events.state(JobState::Failed);
                return Err(e);
            }
        };

        if code != Some(0) {
            let joined = output.join("\n");
            if lines::indicates_success(&joined) {
                self.events
                    .log("download succeeded, ignoring non-zero exit code");
            } else {
                self.events.state(JobState::Failed);
                return Err(CoreError::DownloadFailed {
                    code: code.unwrap_or(-1),
                    tail: lines::output_tail(&joined).to_string(),
                });
            }
        }

        let downloaded = self.discover_files(&reported_paths);
        debug!("discovered {} downloaded file(s)", downloaded.len());

        self.events.state(JobState::Transcoding);
        let transcoder = Transcoder::new(
            self.config,
            self.probe,
            self.events,
            self.controller,
            job.debug,
        );
        let mut completed: Vec<PathBuf> = Vec::new();
        for file in &downloaded {
            if token.is_cancelled() {
                break;
            }
            let produced = if extension_lowercase(file) == TARGET_CONTAINER_EXTENSION {
                file.clone()
            } else {
                match transcoder.transcode(file) {
                    Ok(path) => path,
                    Err(e) => {
                        // The input file is preserved; report it as-is.
                        self.events.log(format!("conversion failed: {e}"));
                        file.clone()
                    }
                }
            };
            if token.is_cancelled() {
                break;
            }
            if !completed.contains(&produced) {
                self.events.emit(Event::FileReady {
                    path: produced.clone(),
                });
                completed.push(produced);
            }
        }

        if token.is_cancelled() {
            let mut report = self.cancelled(resolved);
            report.files = completed;
            return Ok(report);
        }

        if completed.is_empty() {
            self.events.log(
                "job finished: no new files found (they may already exist with an old timestamp)",
            );
        } else {
            self.events
                .log(format!("successfully processed {} file(s)", completed.len()));
        }
        self.events.state(JobState::Completed);
        Ok(JobReport {
            state: JobState::Completed,
            files: completed,
            resolved,
        })
    }

    fn cancelled(&self, resolved: ResolvedTarget) -> JobReport {
        self.events.log("job cancelled");
        self.events.state(JobState::Cancelled);
        JobReport {
            state: JobState::Cancelled,
            files: Vec::new(),
            resolved,
        }
    }

    /// Warnings surfaced before the download so the user can interpret a
    /// bad outcome: missing transcoder, and the hardware-encoding plan.
    fn preflight_diagnostics(&self) {
        match self.config.transcoder.as_deref() {
            None => self.events.log(
                "warning: transcoder not found; downloads may not be merged or converted",
            ),
            Some(path) if !path.is_file() => self.events.log(format!(
                "warning: transcoder missing at {}; downloads may not be merged or converted",
                path.display()
            )),
            Some(_) => {}
        }

        if self.config.hwaccel {
            match self.probe.detect_vendor() {
                GpuVendor::Unknown => self
                    .events
                    .log("GPU vendor not identified (will auto-probe hardware encoders)"),
                vendor => self.events.log(format!(
                    "detected GPU vendor: {vendor} (will attempt hardware-accelerated transcoding)"
                )),
            }
        }
    }

    fn downloader_args(&self, job: &DownloadJob) -> Vec<OsString> {
        let mut template = self.config.download_dir.clone().into_os_string();
        template.push(std::path::MAIN_SEPARATOR.to_string());
        template.push("%(title)s.%(ext)s");

        let mut args: Vec<OsString> = vec!["-o".into(), template];
        args.push("-f".into());
        args.push(self.config.format_selector.clone().into());
        args.extend(["--ignore-errors", "--no-warnings", "--newline"].map(OsString::from));
        args.push("--concurrent-fragments".into());
        args.push(self.config.concurrent_fragments.to_string().into());
        args.push("--fragment-retries".into());
        args.push(self.config.fragment_retries.to_string().into());
        args.push("--retries".into());
        args.push(self.config.retries.to_string().into());
        args.push("--buffer-size".into());
        args.push(self.config.buffer_size.clone().into());

        if let Some(transcoder) = &self.config.transcoder {
            args.push("--ffmpeg-location".into());
            args.push(transcoder.clone().into());
        }
        if job.debug {
            args.push("-v".into());
        }
        args.push(job.url.clone().into());
        args
    }

    /// Union of the recency scan of the download directory and the absolute
    /// paths reported in downloader output, deduplicated in first-seen
    /// order. Deliberately permissive: a false positive re-converts a
    /// file, a false negative loses one.
    fn discover_files(&self, reported: &[PathBuf]) -> Vec<PathBuf> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut found: Vec<PathBuf> = Vec::new();

        let mut scanned: Vec<PathBuf> = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.config.download_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_file()
                    && is_media_file(&path)
                    && self.created_recently(&path)
                {
                    scanned.push(path);
                }
            }
        }
        // Directory iteration order is platform-dependent.
        scanned.sort();
        for path in scanned {
            if seen.insert(path.clone()) {
                found.push(path);
            }
        }

        for path in reported {
            if path.is_absolute() && path.is_file() && seen.insert(path.clone()) {
                found.push(path.clone());
            }
        }
        found
    }

    fn created_recently(&self, path: &Path) -> bool {
        let Ok(metadata) = path.metadata() else {
            return false;
        };
        // Creation time where the filesystem has it, mtime otherwise.
        let stamp = metadata.created().or_else(|_| metadata.modified());
        match stamp {
            Ok(stamp) => match SystemTime::now().duration_since(stamp) {
                Ok(age) => age <= self.config.recency_window,
                // A timestamp in the future still counts as fresh.
                Err(_) => true,
            },
            Err(_) => false,
        }
    }
}

fn is_media_file(path: &Path) -> bool {
    MEDIA_EXTENSIONS.contains(&extension_lowercase(path).as_str())
}

fn render_args(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
