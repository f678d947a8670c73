use reelcut_core::settings::{MixSettings, OutputSettings};
use std::path::PathBuf;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::ffmpeg::{ensure_parent_dir, path_arg, run_ffmpeg, secs};

#[derive(Debug, Clone, PartialEq)]
pub struct MuxRequest {
    pub video: PathBuf,
    pub voice: PathBuf,
    pub music: Option<PathBuf>,
    /// Exact length of the deliverable, taken from the voice track.
    pub target: f64,
    /// Length of the merged video, which may fall short of `target`.
    pub video_duration: f64,
    pub output: PathBuf,
}

/// Combines the merged video with voice and optional music.
pub trait Muxer: Send + Sync {
    fn mux(&self, request: &MuxRequest, cancel: &CancelToken) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Default)]
pub struct FfmpegMuxer {
    pub output: OutputSettings,
    pub mix: MixSettings,
}

impl FfmpegMuxer {
    pub fn new(output: OutputSettings, mix: MixSettings) -> Self {
        Self { output, mix }
    }
}

impl Muxer for FfmpegMuxer {
    fn mux(&self, request: &MuxRequest, cancel: &CancelToken) -> Result<PathBuf> {
        ensure_parent_dir(&request.output)?;
        run_ffmpeg("mux", &build_mux_args(request, &self.output, &self.mix), cancel)?;
        Ok(request.output.clone())
    }
}

/// Build the filter graph that forces video and audio to exactly `target`.
///
/// The video's last frame is cloned before the hard trim: for the configured
/// margin, plus whatever the merged track is short of `target`.
pub fn build_mux_filter(
    target: f64,
    video_duration: f64,
    with_music: bool,
    mix: &MixSettings,
) -> String {
    let a = secs(target);
    let pad = secs(video_pad(target, video_duration, mix));
    let mut filters = vec![format!(
        "[0:v]tpad=stop_mode=clone:stop_duration={pad},trim=duration={a},setpts=PTS-STARTPTS[v]"
    )];

    if !with_music {
        filters.push(format!("[1:a]atrim=duration={a},asetpts=PTS-STARTPTS[a]"));
        return filters.join(";");
    }

    let fade_in = secs(mix.fade_in_seconds);
    let fade_out = secs(mix.fade_out_seconds);
    let fade_out_start = secs((target - mix.fade_out_seconds).max(0.0));
    let volume = secs(mix.music_volume);
    let dropout = secs(mix.dropout_transition_seconds);

    filters.push(format!("[1:a]atrim=duration={a},asetpts=PTS-STARTPTS[voice]"));
    filters.push(format!(
        "[2:a]aloop=loop=-1:size=2e+09,atrim=duration={a},asetpts=PTS-STARTPTS,afade=t=in:d={fade_in},afade=t=out:st={fade_out_start}:d={fade_out},volume={volume}[music]"
    ));
    // duration=first: the voice decides the length; normalize=0 keeps it on top.
    filters.push(format!(
        "[voice][music]amix=inputs=2:duration=first:dropout_transition={dropout}:normalize=0[a]"
    ));
    filters.join(";")
}

/// Seconds of frame cloning needed so the video reaches `target`.
pub fn video_pad(target: f64, video_duration: f64, mix: &MixSettings) -> f64 {
    let shortfall = (target - video_duration).max(0.0);
    shortfall + mix.video_pad_seconds
}

pub fn build_mux_args(request: &MuxRequest, output: &OutputSettings, mix: &MixSettings) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        path_arg(&request.video),
        "-i".to_string(),
        path_arg(&request.voice),
    ];
    if let Some(music) = &request.music {
        args.push("-i".to_string());
        args.push(path_arg(music));
    }

    args.extend([
        "-filter_complex".to_string(),
        build_mux_filter(
            request.target,
            request.video_duration,
            request.music.is_some(),
            mix,
        ),
        "-map".to_string(),
        "[v]".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-c:v".to_string(),
        output.video_codec.clone(),
        "-pix_fmt".to_string(),
        output.pixel_format.clone(),
        "-c:a".to_string(),
        output.audio_codec.clone(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        path_arg(&request.output),
    ]);
    args
}
