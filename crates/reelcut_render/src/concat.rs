use reelcut_core::manifest::manifest_line;
use reelcut_core::settings::OutputSettings;
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::error::{RenderError, Result};
use crate::ffmpeg::{ensure_parent_dir, path_arg, run_ffmpeg};

#[derive(Debug, Clone, PartialEq)]
pub struct ConcatRequest {
    /// Segments in timeline order.
    pub segments: Vec<PathBuf>,
    /// Where the concat list is written.
    pub list_path: PathBuf,
    pub output: PathBuf,
}

/// Joins rendered segments, in order, into one silent track.
pub trait Concatenator: Send + Sync {
    fn concat(&self, request: &ConcatRequest, cancel: &CancelToken) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegConcatenator {
    pub settings: OutputSettings,
}

impl FfmpegConcatenator {
    pub fn new(settings: OutputSettings) -> Self {
        Self { settings }
    }
}

impl Concatenator for FfmpegConcatenator {
    fn concat(&self, request: &ConcatRequest, cancel: &CancelToken) -> Result<PathBuf> {
        if request.segments.is_empty() {
            return Err(RenderError::NothingToConcat);
        }

        write_concat_list(&request.list_path, &request.segments)?;
        ensure_parent_dir(&request.output)?;
        run_ffmpeg("concat", &build_concat_args(request, &self.settings), cancel)?;
        Ok(request.output.clone())
    }
}

/// Write a concat-demuxer list referencing every segment by absolute path.
pub fn write_concat_list(list_path: &Path, segments: &[PathBuf]) -> Result<()> {
    ensure_parent_dir(list_path)?;
    let mut body = String::new();
    for segment in segments {
        let absolute = std::path::absolute(segment)?;
        body.push_str(&manifest_line(&absolute.to_string_lossy().replace('\\', "/")));
    }
    std::fs::write(list_path, body)?;
    Ok(())
}

pub fn build_concat_args(request: &ConcatRequest, settings: &OutputSettings) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        path_arg(&request.list_path),
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
        "-r".to_string(),
        settings.fps.to_string(),
        path_arg(&request.output),
    ]
}
