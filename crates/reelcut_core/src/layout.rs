use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{JobId, MusicTrack};

const MANIFEST_FILE: &str = "input.txt";
const VOICE_FILE: &str = "audio.mp3";
const MUSIC_FILE: &str = "music.mp3";
const MUSIC_PROMPT_FILE: &str = "music.txt";
const CLIPS_DIR: &str = "_clips";

/// Every path a job reads or writes, derived from its id.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPaths {
    pub id: JobId,
    pub job_dir: PathBuf,
    pub output: PathBuf,
}

impl JobPaths {
    pub fn new(uploads_root: impl AsRef<Path>, reels_root: impl AsRef<Path>, id: JobId) -> Self {
        let job_dir = uploads_root.as_ref().join(id.to_string());
        let output = reels_root.as_ref().join(format!("{id}.mp4"));
        Self { id, job_dir, output }
    }

    pub fn manifest(&self) -> PathBuf {
        self.job_dir.join(MANIFEST_FILE)
    }

    pub fn voice(&self) -> PathBuf {
        self.job_dir.join(VOICE_FILE)
    }

    pub fn music(&self) -> PathBuf {
        self.job_dir.join(MUSIC_FILE)
    }

    pub fn music_prompt(&self) -> PathBuf {
        self.job_dir.join(MUSIC_PROMPT_FILE)
    }

    /// Resolve an asset name from the manifest against the job directory.
    pub fn asset(&self, name: &str) -> PathBuf {
        self.job_dir.join(name)
    }

    pub fn clips_dir(&self) -> PathBuf {
        self.job_dir.join(CLIPS_DIR)
    }

    /// Path of the `index`-th rendered segment (1-based).
    pub fn segment(&self, index: usize) -> PathBuf {
        self.clips_dir().join(format!("clip_{index:03}.mp4"))
    }

    pub fn concat_list(&self) -> PathBuf {
        self.clips_dir().join("clips.txt")
    }

    pub fn merged(&self) -> PathBuf {
        self.clips_dir().join("merged.mp4")
    }

    pub fn timeline_dump(&self) -> PathBuf {
        self.clips_dir().join("timeline.json")
    }

    /// Work out what happened to the optional music step.
    ///
    /// A rendered track wins. Otherwise a non-empty prompt means music was
    /// asked for and the generator did not deliver; no prompt means none was
    /// wanted.
    pub fn music_track(&self) -> MusicTrack {
        let music = self.music();
        if music.is_file() {
            return MusicTrack::Ready(music);
        }

        let prompt = std::fs::read_to_string(self.music_prompt()).unwrap_or_default();
        if prompt.trim().is_empty() {
            MusicTrack::Absent
        } else {
            MusicTrack::Failed {
                reason: format!("music prompt present but {} is missing", music.display()),
            }
        }
    }
}

/// List job ids for every directory under `uploads_root` whose name is a job id.
/// Results are sorted so discovery order is stable.
pub fn discover_jobs(uploads_root: impl AsRef<Path>) -> Result<Vec<JobId>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(uploads_root.as_ref())? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<JobId>().ok()) {
            ids.push(id);
        }
    }
    ids.sort();
    Ok(ids)
}
