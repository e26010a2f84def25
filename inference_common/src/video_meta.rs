use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Properties of the video being counted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VideoMeta {
    /// Path to original input video file.
    pub input_file: PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// As announced by the container; decoding may yield a different number.
    pub total_frames: Option<u64>,
}

impl VideoMeta {
    pub fn new(
        input_file: PathBuf,
        width: u32,
        height: u32,
        fps: f64,
        total_frames: Option<u64>,
    ) -> Self {
        Self {
            input_file,
            width,
            height,
            fps,
            total_frames,
        }
    }

    pub fn filename(&self) -> String {
        self.input_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_file.to_string_lossy().into_owned())
    }

    /// Duration implied by the announced frame count.
    pub fn duration_sec(&self) -> Option<f64> {
        self.total_frames
            .filter(|_| self.fps > 0.0)
            .map(|n| n as f64 / self.fps)
    }
}
