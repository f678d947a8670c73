use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Resolution, frame rate and encoding shared by every rendered segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub pixel_format: String,
    pub audio_codec: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        preset_shorts()
    }
}

/// How the voice and optional music are combined in the final mux.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MixSettings {
    pub music_volume: f64,
    pub fade_in_seconds: f64,
    pub fade_out_seconds: f64,
    /// How long the last video frame is cloned before the hard trim.
    pub video_pad_seconds: f64,
    pub dropout_transition_seconds: f64,
}

impl Default for MixSettings {
    fn default() -> Self {
        Self {
            music_volume: 0.25,
            fade_in_seconds: 1.0,
            fade_out_seconds: 2.0,
            video_pad_seconds: 10.0,
            dropout_transition_seconds: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReelSettings {
    pub output: OutputSettings,
    pub mix: MixSettings,
}

impl ReelSettings {
    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let settings: ReelSettings = serde_json::from_str(&data)?;
        Ok(settings)
    }
}

/// 1080x1920 30fps (vertical/shorts) preset.
pub fn preset_shorts() -> OutputSettings {
    OutputSettings {
        width: 1080,
        height: 1920,
        fps: 30,
        video_codec: "libx264".to_string(),
        pixel_format: "yuv420p".to_string(),
        audio_codec: "aac".to_string(),
    }
}
