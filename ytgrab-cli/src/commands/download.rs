// ytgrab-cli/src/commands/download.rs
//
// The `download` command: configures the core from CLI arguments, wires
// Ctrl-C to the cancellation controller and runs one job to completion.

use std::fs;
use std::sync::Arc;

use log::{debug, warn};
use ytgrab_core::{
    CancellationController, CoreConfig, CoreError, CoreResult, DownloadJob, DownloadOrchestrator,
    EncoderProbe, EventDispatcher, JobReport,
};

use crate::cli::DownloadArgs;
use crate::commands::{default_download_dir, locate_tool};
use crate::output::ConsoleHandler;

pub fn run_download(args: DownloadArgs) -> CoreResult<JobReport> {
    let downloader = locate_tool(args.downloader, "yt-dlp")?;
    let transcoder = match args.ffmpeg {
        Some(path) => Some(path),
        None => which::which("ffmpeg").ok(),
    };
    let download_dir = match args.directory {
        Some(dir) => dir,
        None => default_download_dir().ok_or_else(|| {
            CoreError::Config("cannot determine home directory; pass --directory".to_string())
        })?,
    };
    fs::create_dir_all(&download_dir)?;

    let mut config = CoreConfig::new(downloader, download_dir);
    config.transcoder = transcoder;
    if args.no_hwaccel {
        config.hwaccel = false;
    }
    config.validate()?;

    let (console, printer) = ConsoleHandler::spawn();
    let mut events = EventDispatcher::new();
    events.add_handler(console);

    let controller = Arc::new(CancellationController::new());
    let signal_controller = Arc::clone(&controller);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("stop requested, terminating child processes...");
        signal_controller.request_stop();
    }) {
        // Still usable; Ctrl-C just won't tear down children cleanly.
        warn!("could not install Ctrl-C handler: {e}");
    }

    let probe = EncoderProbe::new();
    let result = {
        let orchestrator = DownloadOrchestrator::new(&config, &probe, &events, &controller);
        orchestrator.run(&DownloadJob {
            url: args.url,
            debug: args.debug,
        })
    };

    // Last sender drops with the dispatcher; joining flushes the console.
    drop(events);
    if printer.join().is_err() {
        debug!("console printer thread panicked");
    }
    result
}
