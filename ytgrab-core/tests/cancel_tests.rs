// ytgrab-core/tests/cancel_tests.rs
//
// Cooperative cancellation: a stop request must terminate a running job
// promptly and end it in the Cancelled state.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::tempdir;
use ytgrab_core::{
    CancellationController, CoreConfig, DownloadJob, DownloadOrchestrator, EncoderProbe,
    EventDispatcher, JobState,
};

fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("stat").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

#[test]
fn stop_request_cancels_a_running_download() {
    let tools = tempdir().unwrap();
    let downloads = tempdir().unwrap();
    // Inspection calls fail fast; the download invocation hangs.
    let downloader = fake_tool(
        tools.path(),
        "yt-dlp",
        r#"case "$*" in
  *--flat-playlist*) exit 1 ;;
  *--no-playlist*) exit 1 ;;
  *--dump-json*) exit 1 ;;
esac
echo "[download] starting"
sleep 60
exit 0"#,
    );

    let config = CoreConfig::new(downloader, downloads.path().to_path_buf());
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = Arc::new(CancellationController::new());

    let stopper = Arc::clone(&controller);
    let stop_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        stopper.request_stop();
    });

    let started = Instant::now();
    let orchestrator = DownloadOrchestrator::new(&config, &probe, &events, &controller);
    let report = orchestrator
        .run(&DownloadJob {
            url: "https://example.com/v".to_string(),
            debug: false,
        })
        .unwrap();
    stop_thread.join().unwrap();

    assert_eq!(report.state, JobState::Cancelled);
    assert!(report.files.is_empty());
    // Far below the 60s the child would have taken.
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn cancel_before_start_skips_the_download() {
    let tools = tempdir().unwrap();
    let downloads = tempdir().unwrap();
    let marker = downloads.path().join("invoked");
    let downloader = fake_tool(
        tools.path(),
        "yt-dlp",
        &format!(
            r#": > "{marker}"
exit 0"#,
            marker = marker.display()
        ),
    );

    let config = CoreConfig::new(downloader, downloads.path().to_path_buf());
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    controller.request_stop();

    let orchestrator = DownloadOrchestrator::new(&config, &probe, &events, &controller);
    let report = orchestrator
        .run(&DownloadJob {
            url: "https://example.com/v".to_string(),
            debug: false,
        })
        .unwrap();

    assert_eq!(report.state, JobState::Cancelled);
    assert!(!marker.exists());
}
