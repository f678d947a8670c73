use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::error::{RenderError, Result};

/// Reports the playable duration of a media file.
pub trait Prober: Send + Sync {
    /// Duration in seconds; unknown or empty results come back as `0.0`.
    fn probe_duration(&self, path: &Path) -> Result<f64>;
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FfprobeProber;

impl Prober for FfprobeProber {
    fn probe_duration(&self, path: &Path) -> Result<f64> {
        let output = Command::new("ffprobe")
            .args(["-v", "error", "-print_format", "json", "-show_format"])
            .arg(path)
            .output()
            .map_err(|e| RenderError::ProbeFailure {
                path: path.to_path_buf(),
                stderr: format!("failed to execute ffprobe: {e}"),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::ProbeFailure {
                path: path.to_path_buf(),
                stderr: stderr.trim().to_string(),
            });
        }

        let duration = parse_duration(&output.stdout);
        if duration <= 0.0 {
            warn!(path = %path.display(), "ffprobe reported no usable duration");
        } else {
            debug!(path = %path.display(), duration, "probed");
        }
        Ok(duration)
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Pull `format.duration` out of ffprobe's JSON. Anything unreadable is `0.0`.
fn parse_duration(stdout: &[u8]) -> f64 {
    serde_json::from_slice::<FfprobeOutput>(stdout)
        .ok()
        .and_then(|probe| probe.format)
        .and_then(|format| format.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite())
        .map(|d| d.max(0.0))
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
