//! Post-download normalization of media files into mp4.
//!
//! Hardware encoding is opportunistic: a probed encoder can still fail on
//! real input (unsupported profile, driver limits), so any non-zero exit
//! from a hardware encode triggers one software retry before the file is
//! declared failed. The input file is only deleted after the output is
//! confirmed on disk.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cancel::CancellationController;
use crate::config::CoreConfig;
use crate::encoder::{EncoderChoice, EncoderProbe, SOFTWARE_ENCODER};
use crate::error::{CoreError, CoreResult};
use crate::events::EventDispatcher;
use crate::process;

/// Container every video download is normalized into.
pub const TARGET_CONTAINER_EXTENSION: &str = "mp4";

/// Extensions passed through untouched; remuxing audio into mp4 would be
/// lossy or pointless.
pub const AUDIO_PASSTHROUGH_EXTENSIONS: [&str; 3] = ["mp3", "wav", "m4a"];

/// Lowercased extension of a path, empty when there is none.
pub(crate) fn extension_lowercase(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

enum EncodeRun {
    Exited(Option<i32>),
    Cancelled,
}

pub struct Transcoder<'a> {
    config: &'a CoreConfig,
    probe: &'a EncoderProbe,
    events: &'a EventDispatcher,
    controller: &'a CancellationController,
    debug: bool,
}

impl<'a> Transcoder<'a> {
    pub fn new(
        config: &'a CoreConfig,
        probe: &'a EncoderProbe,
        events: &'a EventDispatcher,
        controller: &'a CancellationController,
        debug: bool,
    ) -> Self {
        Self {
            config,
            probe,
            events,
            controller,
            debug,
        }
    }

    /// Converts `input` to mp4, returning the path of the resulting file.
    /// Audio files, missing-transcoder situations and cancellation all
    /// return the input path unchanged.
    pub fn transcode(&self, input: &Path) -> CoreResult<PathBuf> {
        self.events.log(format!("converting file: {}", input.display()));

        let ext = extension_lowercase(input);
        if ext == TARGET_CONTAINER_EXTENSION {
            // Already in the target container; invoking the transcoder
            // would encode the file onto itself.
            return Ok(input.to_path_buf());
        }
        if AUDIO_PASSTHROUGH_EXTENSIONS.contains(&ext.as_str()) {
            self.events
                .log(format!("skipping conversion (audio file): {}", input.display()));
            return Ok(input.to_path_buf());
        }

        let transcoder = match self.config.transcoder.as_deref() {
            Some(path) if path.is_file() => path,
            _ => {
                self.events.log(
                    "transcoder not found, skipping conversion; install ffmpeg or configure its path",
                );
                return Ok(input.to_path_buf());
            }
        };

        let output = input.with_extension(TARGET_CONTAINER_EXTENSION);
        let choice = self.probe.pick_encoder(transcoder, self.config.hwaccel);
        self.log_encoder_choice(&choice);

        let mut run = self.run_encode(transcoder, &choice.encoder, input, &output)?;
        if let EncodeRun::Exited(code) = run {
            if code != Some(0) && choice.is_hardware() {
                self.events
                    .log("hardware transcode failed, retrying with software (libx264)...");
                run = self.run_encode(transcoder, SOFTWARE_ENCODER, input, &output)?;
            }
        }

        let code = match run {
            EncodeRun::Cancelled => return Ok(input.to_path_buf()),
            EncodeRun::Exited(code) => code,
        };
        if code != Some(0) {
            return Err(CoreError::TranscodeFailed {
                input: input.to_path_buf(),
                reason: match code {
                    Some(code) => format!("transcoder exited with code {code}"),
                    None => "transcoder killed by signal".to_string(),
                },
            });
        }

        if output.is_file() {
            fs::remove_file(input)?;
            Ok(output)
        } else {
            // Zero exit but no output; keep the original rather than lose it.
            Ok(input.to_path_buf())
        }
    }

    fn log_encoder_choice(&self, choice: &EncoderChoice) {
        if !self.config.hwaccel {
            self.events
                .log("hardware encoding disabled, using software (libx264)");
        } else if choice.is_hardware() {
            self.events.log(format!(
                "using hardware encoder {} (will fall back to software on failure)",
                choice.encoder
            ));
        } else if let Some(note) = &choice.note {
            self.events.log(format!(
                "hardware encoding unavailable ({note}), using software (libx264)"
            ));
        } else {
            self.events
                .log("no usable hardware encoder detected, using software (libx264)");
        }
    }

    fn run_encode(
        &self,
        transcoder: &Path,
        encoder: &str,
        input: &Path,
        output: &Path,
    ) -> CoreResult<EncodeRun> {
        let token = self.controller.token();
        if token.is_cancelled() {
            return Ok(EncodeRun::Cancelled);
        }

        let args = build_transcode_args(encoder, input, output);
        let mut proc = process::spawn_streaming(transcoder, &args)?;
        self.controller.set_transcode_pid(Some(proc.pid()));

        while let Some(line) = proc.next_line_cancellable(&token) {
            if self.debug {
                self.events.log(line);
            }
        }

        if token.is_cancelled() {
            proc.kill_tree();
            let _ = proc.wait();
            self.controller.set_transcode_pid(None);
            return Ok(EncodeRun::Cancelled);
        }

        let result = proc.wait();
        self.controller.set_transcode_pid(None);
        Ok(EncodeRun::Exited(result?))
    }
}

/// Argument list for one encode attempt. Software gets the fixed quality
/// settings; hardware encoders run with their defaults.
fn build_transcode_args(encoder: &str, input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-i".into(),
        input.into(),
    ];

    if encoder == SOFTWARE_ENCODER {
        args.extend(
            ["-c:v", SOFTWARE_ENCODER, "-preset", "medium", "-crf", "23", "-pix_fmt", "yuv420p"]
                .map(OsString::from),
        );
    } else {
        args.push("-c:v".into());
        args.push(encoder.into());
    }

    args.extend(["-c:a", "aac", "-b:a", "192k"].map(OsString::from));
    args.extend(["-movflags", "+faststart", "-threads", "0", "-y"].map(OsString::from));
    args.push(output.into());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(args: &[OsString]) -> Vec<String> {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn software_args_carry_quality_settings() {
        let args = rendered(&build_transcode_args(
            SOFTWARE_ENCODER,
            Path::new("in.webm"),
            Path::new("in.mp4"),
        ));
        assert_eq!(
            args,
            [
                "-hide_banner",
                "-nostdin",
                "-i",
                "in.webm",
                "-c:v",
                "libx264",
                "-preset",
                "medium",
                "-crf",
                "23",
                "-pix_fmt",
                "yuv420p",
                "-c:a",
                "aac",
                "-b:a",
                "192k",
                "-movflags",
                "+faststart",
                "-threads",
                "0",
                "-y",
                "in.mp4",
            ]
        );
    }

    #[test]
    fn hardware_args_use_encoder_defaults() {
        let args = rendered(&build_transcode_args(
            "h264_nvenc",
            Path::new("in.mkv"),
            Path::new("in.mp4"),
        ));
        assert!(args.contains(&"h264_nvenc".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
        assert!(!args.contains(&"-preset".to_string()));
    }

    #[test]
    fn extension_lowercasing() {
        assert_eq!(extension_lowercase(Path::new("a/b/Clip.WebM")), "webm");
        assert_eq!(extension_lowercase(Path::new("noext")), "");
        assert_eq!(extension_lowercase(Path::new("song.M4A")), "m4a");
    }
}
