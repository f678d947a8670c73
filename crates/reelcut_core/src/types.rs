use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Tolerance used when comparing accumulated durations against the target.
pub const DURATION_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// How an asset is turned into screen time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Static image held for an assigned duration.
    Still,
    /// Animated image that plays through its own loop.
    Loop,
    /// Generic video, played from its start.
    Clip,
}

impl MediaKind {
    /// Stills have no intrinsic duration; everything else is probed.
    pub fn is_fixed(self) -> bool {
        !matches!(self, MediaKind::Still)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Still => "still",
            MediaKind::Loop => "loop",
            MediaKind::Clip => "clip",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MediaItem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    pub name: String,
    pub kind: MediaKind,
    /// Zero-based position in the manifest.
    pub position: usize,
    pub probed_duration: Option<f64>,
    pub allocated_duration: Option<f64>,
}

impl MediaItem {
    pub fn new(name: impl Into<String>, kind: MediaKind, position: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            position,
            probed_duration: None,
            allocated_duration: None,
        }
    }

    pub fn with_probe(mut self, seconds: f64) -> Self {
        self.probed_duration = Some(seconds);
        self
    }

    /// Allocated duration, or zero while still undetermined.
    pub fn duration(&self) -> f64 {
        self.allocated_duration.unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// Ordered, duration-annotated subsequence of the manifest that gets rendered.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Timeline {
    pub target: f64,
    pub items: Vec<MediaItem>,
}

impl Timeline {
    pub fn total_duration(&self) -> f64 {
        self.items.iter().map(MediaItem::duration).sum()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }

    /// Write the timeline as pretty JSON, e.g. next to the rendered clips.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> crate::error::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Render artifacts
// ---------------------------------------------------------------------------

/// One rendered, audio-less segment for a timeline entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClipArtifact {
    pub item: MediaItem,
    pub path: PathBuf,
    pub duration: f64,
}

/// All segments concatenated into one silent video.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedTrack {
    pub path: PathBuf,
    pub duration: f64,
}

impl MergedTrack {
    pub fn from_clips(path: PathBuf, clips: &[ClipArtifact]) -> Self {
        Self {
            path,
            duration: clips.iter().map(|c| c.duration).sum(),
        }
    }
}

/// The deliverable: video plus voice (and music), exactly `duration` long.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalReel {
    pub path: PathBuf,
    pub duration: f64,
}

// ---------------------------------------------------------------------------
// MusicTrack
// ---------------------------------------------------------------------------

/// Outcome of the optional background-music step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum MusicTrack {
    /// No music was requested.
    Absent,
    /// Music was requested but could not be produced.
    Failed { reason: String },
    Ready(PathBuf),
}

impl MusicTrack {
    pub fn path(&self) -> Option<&Path> {
        match self {
            MusicTrack::Ready(path) => Some(path),
            MusicTrack::Absent | MusicTrack::Failed { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(JobId)
            .map_err(|_| CoreError::InvalidJobId(s.to_string()))
    }
}
