use reelcut_core::error::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("ffprobe failed for {path}: {stderr}")]
    ProbeFailure { path: PathBuf, stderr: String },

    #[error("ffmpeg {step} failed: {stderr}")]
    TranscodeFailure { step: &'static str, stderr: String },

    #[error("no segments to concatenate")]
    NothingToConcat,

    #[error("build cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Stable name for the failure, recorded with the failed job.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::ProbeFailure { .. } => "ProbeFailure",
            RenderError::TranscodeFailure { .. } | RenderError::NothingToConcat => {
                "TranscodeFailure"
            }
            RenderError::Cancelled => "Cancelled",
            RenderError::Core(CoreError::EmptyInput) => "EmptyInputError",
            RenderError::Core(CoreError::ZeroAudioDuration(_)) => "ZeroAudioDurationError",
            RenderError::Core(CoreError::NoClipsProduced) => "NoClipsProducedError",
            RenderError::Core(_) | RenderError::Io(_) => "IoError",
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;
