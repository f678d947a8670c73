use thiserror::Error;

use crate::store::JobState;
use crate::types::JobId;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no assets listed in manifest")]
    EmptyInput,

    #[error("voice track duration is {0}s, expected a positive duration")]
    ZeroAudioDuration(f64),

    #[error("allocation produced an empty timeline")]
    NoClipsProduced,

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("job {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: JobId,
        from: JobState,
        to: &'static str,
    },

    #[error("invalid job id: {0}")]
    InvalidJobId(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
