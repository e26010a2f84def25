use std::path::PathBuf;

use thiserror::Error;

/// Conditions a counting run reports to the user instead of crashing on.
#[derive(Debug, Error)]
pub enum CountError {
    #[error("No data was captured during detection.")]
    NoFrames,

    #[error("Unsupported input {path:?}: expected one of mp4, mov, avi")]
    UnsupportedInput { path: PathBuf },

    #[error("Invalid frame rate: {0}")]
    InvalidFps(f64),
}
