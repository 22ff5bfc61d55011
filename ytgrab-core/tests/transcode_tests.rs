// ytgrab-core/tests/transcode_tests.rs
//
// Conversion behavior against fake transcoder scripts.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::tempdir;
use ytgrab_core::{
    CancellationController, CoreConfig, CoreError, EncoderProbe, EventDispatcher, Transcoder,
};

fn fake_tool(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("stat").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod");
    path
}

fn config_with(transcoder: Option<PathBuf>, dir: &Path) -> CoreConfig {
    let mut config = CoreConfig::new(PathBuf::from("yt-dlp"), dir.to_path_buf());
    config.transcoder = transcoder;
    config
}

/// Transcoder that touches its output file (the last argument) and exits 0.
const CREATE_OUTPUT: &str = r#"for a; do last="$a"; done
: > "$last"
exit 0"#;

#[test]
fn converts_to_mp4_and_removes_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.webm");
    fs::write(&input, b"media").unwrap();
    let ffmpeg = fake_tool(dir.path(), "ffmpeg", CREATE_OUTPUT);

    let mut config = config_with(Some(ffmpeg), dir.path());
    config.hwaccel = false;
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let produced = transcoder.transcode(&input).unwrap();

    assert_eq!(produced, dir.path().join("clip.mp4"));
    assert!(produced.is_file());
    assert!(!input.exists());
}

#[test]
fn audio_files_pass_through_untouched() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("song.mp3");
    fs::write(&input, b"audio").unwrap();
    // Exiting 1 proves the transcoder is never invoked.
    let ffmpeg = fake_tool(dir.path(), "ffmpeg", "exit 1");

    let config = config_with(Some(ffmpeg), dir.path());
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let produced = transcoder.transcode(&input).unwrap();

    assert_eq!(produced, input);
    assert!(input.exists());
}

#[test]
fn mp4_input_is_a_noop() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.mp4");
    fs::write(&input, b"media").unwrap();
    // Touches a marker so an invocation is detectable, then fails.
    let marker = dir.path().join("invoked");
    let ffmpeg = fake_tool(
        dir.path(),
        "ffmpeg",
        &format!(
            r#": > "{marker}"
exit 1"#,
            marker = marker.display()
        ),
    );

    let config = config_with(Some(ffmpeg), dir.path());
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let produced = transcoder.transcode(&input).unwrap();

    assert_eq!(produced, input);
    assert!(input.exists());
    assert!(!marker.exists(), "transcoder must not be invoked for mp4 input");
}

#[test]
fn missing_transcoder_keeps_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.webm");
    fs::write(&input, b"media").unwrap();

    let config = config_with(None, dir.path());
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let produced = transcoder.transcode(&input).unwrap();

    assert_eq!(produced, input);
    assert!(input.exists());
}

#[test]
fn vanished_transcoder_path_keeps_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.webm");
    fs::write(&input, b"media").unwrap();

    // Configured path that no longer exists on disk.
    let config = config_with(Some(dir.path().join("gone-ffmpeg")), dir.path());
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let produced = transcoder.transcode(&input).unwrap();

    assert_eq!(produced, input);
    assert!(input.exists());
}

#[test]
fn failed_transcode_preserves_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.mkv");
    fs::write(&input, b"media").unwrap();
    let ffmpeg = fake_tool(dir.path(), "ffmpeg", "exit 1");

    let mut config = config_with(Some(ffmpeg), dir.path());
    config.hwaccel = false;
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let err = transcoder.transcode(&input).unwrap_err();

    assert!(matches!(err, CoreError::TranscodeFailed { .. }));
    assert!(input.exists());
}

#[test]
fn hardware_failure_retries_with_software() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.webm");
    fs::write(&input, b"media").unwrap();
    // Lists h264_nvenc, passes its synthetic probe, then fails the real
    // hardware encode; only the libx264 retry produces output.
    let ffmpeg = fake_tool(
        dir.path(),
        "ffmpeg",
        r#"enc=
prev=
last=
for a; do
  if [ "$prev" = "-c:v" ]; then enc="$a"; fi
  prev="$a"
  last="$a"
done
case "$*" in
  *-encoders*) echo " V..... h264_nvenc  NVIDIA NVENC H.264 encoder"; exit 0 ;;
  *lavfi*) exit 0 ;;
esac
if [ "$enc" = "libx264" ]; then : > "$last"; exit 0; fi
exit 1"#,
    );

    let mut config = config_with(Some(ffmpeg), dir.path());
    config.hwaccel = true;
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let produced = transcoder.transcode(&input).unwrap();

    assert_eq!(produced, dir.path().join("clip.mp4"));
    assert!(produced.is_file());
    assert!(!input.exists());
}

#[test]
fn reported_success_without_output_keeps_input() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("clip.avi");
    fs::write(&input, b"media").unwrap();
    // Exits 0 without writing anything.
    let ffmpeg = fake_tool(dir.path(), "ffmpeg", "exit 0");

    let mut config = config_with(Some(ffmpeg), dir.path());
    config.hwaccel = false;
    let probe = EncoderProbe::new();
    let events = EventDispatcher::new();
    let controller = CancellationController::new();
    let transcoder = Transcoder::new(&config, &probe, &events, &controller, false);

    let produced = transcoder.transcode(&input).unwrap();

    assert_eq!(produced, input);
    assert!(input.exists());
}
