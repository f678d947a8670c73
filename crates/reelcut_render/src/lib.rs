pub mod cancel;
pub mod concat;
pub mod error;
pub mod ffmpeg;
pub mod mux;
pub mod pipeline;
pub mod probe;
pub mod segment;

pub use cancel::CancelToken;
pub use pipeline::{Collaborators, ReelPipeline};
