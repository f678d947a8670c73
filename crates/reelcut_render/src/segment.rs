use reelcut_core::settings::OutputSettings;
use reelcut_core::types::MediaKind;
use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::ffmpeg::{ensure_parent_dir, path_arg, run_ffmpeg, secs};

/// One asset to normalize into a silent segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    pub source: PathBuf,
    pub kind: MediaKind,
    pub duration: f64,
    pub output: PathBuf,
}

/// Renders one timeline entry into a uniform, audio-less segment.
pub trait Transcoder: Send + Sync {
    fn render(&self, request: &SegmentRequest, cancel: &CancelToken) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegTranscoder {
    pub settings: OutputSettings,
}

impl FfmpegTranscoder {
    pub fn new(settings: OutputSettings) -> Self {
        Self { settings }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn render(&self, request: &SegmentRequest, cancel: &CancelToken) -> Result<()> {
        ensure_parent_dir(&request.output)?;
        run_ffmpeg("render", &build_segment_args(request, &self.settings), cancel)
    }
}

/// Input options per media kind: stills are held, loops play their own loop,
/// clips play from the start.
fn input_options(kind: MediaKind) -> &'static [&'static str] {
    match kind {
        MediaKind::Still => &["-loop", "1"],
        MediaKind::Loop => &["-ignore_loop", "0"],
        MediaKind::Clip => &[],
    }
}

/// Fit inside the frame, letterbox the rest, and resample to a fixed rate.
pub fn normalize_filter(settings: &OutputSettings) -> String {
    let OutputSettings {
        width: w,
        height: h,
        fps,
        ..
    } = settings;
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,fps={fps}"
    )
}

pub fn build_segment_args(request: &SegmentRequest, settings: &OutputSettings) -> Vec<String> {
    let mut args = vec!["-y".to_string()];
    args.extend(input_options(request.kind).iter().map(|s| s.to_string()));
    args.extend([
        "-i".to_string(),
        path_arg(&request.source),
        "-t".to_string(),
        secs(request.duration),
        "-vf".to_string(),
        normalize_filter(settings),
        "-an".to_string(),
        "-c:v".to_string(),
        settings.video_codec.clone(),
        "-pix_fmt".to_string(),
        settings.pixel_format.clone(),
        path_arg(&request.output),
    ]);
    args
}
