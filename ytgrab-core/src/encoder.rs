//! Hardware encoder detection, probing and selection.
//!
//! A listed encoder is not a working encoder: driver or firmware problems
//! only surface when an actual encode is attempted, so every candidate is
//! exercised against a tiny synthetic input before it is trusted. Probe
//! results are cached per transcoder binary for the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use log::debug;

use crate::platform;
use crate::process;

/// Software fallback encoder, assumed always present.
pub const SOFTWARE_ENCODER: &str = "libx264";

/// lavfi source used for functional probes: a fifth of a second of black
/// video, cheap on any machine.
const PROBE_INPUT: &str = "color=c=black:s=128x128:r=30:d=0.2";

const PROBE_TIMEOUT: Duration = Duration::from_secs(8);
const LISTING_TIMEOUT: Duration = Duration::from_secs(8);
#[cfg(windows)]
const VENDOR_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// GPU vendor, used only to order encoder candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Unknown,
}

impl GpuVendor {
    /// Hardware H.264 encoder candidates, most plausible first. An unknown
    /// vendor gets the NVIDIA ordering; the probe weeds out wrong guesses.
    pub fn encoder_candidates(self) -> &'static [&'static str] {
        match self {
            GpuVendor::Nvidia | GpuVendor::Unknown => &["h264_nvenc", "h264_qsv", "h264_amf"],
            GpuVendor::Intel => &["h264_qsv", "h264_nvenc", "h264_amf"],
            GpuVendor::Amd => &["h264_amf", "h264_nvenc", "h264_qsv"],
        }
    }
}

impl fmt::Display for GpuVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GpuVendor::Nvidia => "NVIDIA",
            GpuVendor::Amd => "AMD",
            GpuVendor::Intel => "Intel",
            GpuVendor::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Result of a functional probe of one encoder.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub usable: bool,
    /// Short failure hint (last diagnostic line), empty when usable.
    pub diagnostic: String,
}

/// The encoder chosen for a transcode.
#[derive(Debug, Clone)]
pub struct EncoderChoice {
    pub encoder: String,
    /// Why hardware encoding was not used, when it was not.
    pub note: Option<String>,
}

impl EncoderChoice {
    pub fn is_hardware(&self) -> bool {
        self.encoder != SOFTWARE_ENCODER
    }

    fn software(note: Option<String>) -> Self {
        Self {
            encoder: SOFTWARE_ENCODER.to_string(),
            note,
        }
    }
}

/// Probes and caches encoder capabilities of a transcoder binary.
///
/// All caches key on the transcoder path, so swapping binaries mid-session
/// cannot serve stale answers.
#[derive(Default)]
pub struct EncoderProbe {
    vendor: Mutex<Option<GpuVendor>>,
    listings: Mutex<HashMap<PathBuf, String>>,
    probes: Mutex<HashMap<(PathBuf, String), ProbeOutcome>>,
}

impl EncoderProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detects the GPU vendor, once per process. Detection is only
    /// implemented on Windows; elsewhere the answer is always `Unknown`
    /// and candidate ordering falls back to the default.
    pub fn detect_vendor(&self) -> GpuVendor {
        let mut cached = self.vendor.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(vendor) = *cached {
            return vendor;
        }
        let vendor = query_gpu_vendor();
        debug!("GPU vendor: {vendor}");
        *cached = Some(vendor);
        vendor
    }

    /// Whether the transcoder lists `name` among its encoders. The listing
    /// is fetched once per transcoder binary.
    pub fn supports_encoder(&self, transcoder: &Path, name: &str) -> bool {
        let mut listings = self.listings.lock().unwrap_or_else(|e| e.into_inner());
        let listing = listings
            .entry(transcoder.to_path_buf())
            .or_insert_with(|| {
                match process::run_captured(transcoder, ["-hide_banner", "-encoders"], LISTING_TIMEOUT)
                {
                    Ok(out) => out.combined(),
                    Err(e) => {
                        debug!("encoder listing failed: {e}");
                        String::new()
                    }
                }
            });
        listing.contains(name)
    }

    /// Functionally probes one encoder by encoding a synthetic clip to the
    /// null device. Cached per (transcoder, encoder).
    pub fn probe_encoder(&self, transcoder: &Path, name: &str) -> ProbeOutcome {
        let key = (transcoder.to_path_buf(), name.to_string());
        if let Some(hit) = self
            .probes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return hit.clone();
        }

        let outcome = if self.supports_encoder(transcoder, name) {
            run_probe(transcoder, name)
        } else {
            ProbeOutcome {
                usable: false,
                diagnostic: "not present".to_string(),
            }
        };
        debug!(
            "probe {name}: usable={}{}",
            outcome.usable,
            if outcome.diagnostic.is_empty() {
                String::new()
            } else {
                format!(" ({})", outcome.diagnostic)
            }
        );

        self.probes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, outcome.clone());
        outcome
    }

    /// Picks the video encoder for a transcode: the first usable hardware
    /// candidate in vendor-preferred order, else software with a note
    /// carrying the last probe failure. Disabled hardware acceleration or
    /// a missing transcoder binary short-circuits straight to software.
    pub fn pick_encoder(&self, transcoder: &Path, hwaccel: bool) -> EncoderChoice {
        if !hwaccel || !transcoder.is_file() {
            return EncoderChoice::software(None);
        }

        let vendor = self.detect_vendor();
        let mut last_failure = None;
        for name in vendor.encoder_candidates() {
            let outcome = self.probe_encoder(transcoder, name);
            if outcome.usable {
                return EncoderChoice {
                    encoder: name.to_string(),
                    note: None,
                };
            }
            if !outcome.diagnostic.is_empty() {
                last_failure = Some(format!("{name}: {}", outcome.diagnostic));
            }
        }
        EncoderChoice::software(last_failure)
    }
}

fn run_probe(transcoder: &Path, name: &str) -> ProbeOutcome {
    let args = [
        "-hide_banner",
        "-nostdin",
        "-f",
        "lavfi",
        "-i",
        PROBE_INPUT,
        "-pix_fmt",
        "yuv420p",
        "-c:v",
        name,
        "-t",
        "0.2",
        "-f",
        "null",
        platform::null_device(),
    ];
    match process::run_captured(transcoder, args, PROBE_TIMEOUT) {
        Ok(out) if out.success() => ProbeOutcome {
            usable: true,
            diagnostic: String::new(),
        },
        Ok(out) => {
            let combined = out.combined();
            let hint = combined
                .lines()
                .map(str::trim)
                .rev()
                .find(|line| !line.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| match out.code {
                    Some(code) => format!("exit {code}"),
                    None => "killed by signal".to_string(),
                });
            ProbeOutcome {
                usable: false,
                diagnostic: hint,
            }
        }
        Err(e) => ProbeOutcome {
            usable: false,
            diagnostic: e.to_string(),
        },
    }
}

#[cfg(windows)]
fn query_gpu_vendor() -> GpuVendor {
    let args = [
        "-NoProfile",
        "-Command",
        "Get-CimInstance Win32_VideoController | Select-Object -ExpandProperty Name",
    ];
    match process::run_captured(Path::new("powershell"), args, VENDOR_QUERY_TIMEOUT) {
        Ok(out) => vendor_from_controller_names(&out.stdout),
        Err(_) => GpuVendor::Unknown,
    }
}

#[cfg(not(windows))]
fn query_gpu_vendor() -> GpuVendor {
    GpuVendor::Unknown
}

fn vendor_from_controller_names(names: &str) -> GpuVendor {
    let upper = names.to_uppercase();
    if upper.contains("NVIDIA") {
        GpuVendor::Nvidia
    } else if upper.contains("AMD") || upper.contains("RADEON") {
        GpuVendor::Amd
    } else if upper.contains("INTEL") {
        GpuVendor::Intel
    } else {
        GpuVendor::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_name_matching() {
        assert_eq!(
            vendor_from_controller_names("NVIDIA GeForce RTX 4070"),
            GpuVendor::Nvidia
        );
        assert_eq!(
            vendor_from_controller_names("AMD Radeon RX 7800 XT"),
            GpuVendor::Amd
        );
        assert_eq!(
            vendor_from_controller_names("Intel(R) UHD Graphics 770"),
            GpuVendor::Intel
        );
        assert_eq!(
            vendor_from_controller_names("Microsoft Basic Display Adapter"),
            GpuVendor::Unknown
        );
    }

    #[test]
    fn nvidia_takes_priority_in_hybrid_systems() {
        let names = "Intel(R) UHD Graphics 770\nNVIDIA GeForce RTX 4070";
        assert_eq!(vendor_from_controller_names(names), GpuVendor::Nvidia);
    }

    #[test]
    fn candidate_order_per_vendor() {
        assert_eq!(
            GpuVendor::Nvidia.encoder_candidates(),
            ["h264_nvenc", "h264_qsv", "h264_amf"]
        );
        assert_eq!(
            GpuVendor::Intel.encoder_candidates(),
            ["h264_qsv", "h264_nvenc", "h264_amf"]
        );
        assert_eq!(
            GpuVendor::Amd.encoder_candidates(),
            ["h264_amf", "h264_nvenc", "h264_qsv"]
        );
        assert_eq!(
            GpuVendor::Unknown.encoder_candidates(),
            GpuVendor::Nvidia.encoder_candidates()
        );
    }

    #[test]
    fn disabled_hwaccel_short_circuits_to_software() {
        let probe = EncoderProbe::new();
        let choice = probe.pick_encoder(Path::new("/nonexistent/ffmpeg"), false);
        assert_eq!(choice.encoder, SOFTWARE_ENCODER);
        assert!(!choice.is_hardware());
        assert!(choice.note.is_none());
    }

    #[test]
    fn missing_transcoder_short_circuits_to_software() {
        let probe = EncoderProbe::new();
        let choice = probe.pick_encoder(Path::new("/nonexistent/ffmpeg"), true);
        assert_eq!(choice.encoder, SOFTWARE_ENCODER);
        // No probes ran, so there is no failure diagnostic to report.
        assert!(choice.note.is_none());
    }
}
