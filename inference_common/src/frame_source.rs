use std::collections::VecDeque;

use image::RgbImage;

/// Sequential, finite, non-restartable source of decoded RGB frames.
pub trait FrameSource: Iterator<Item = anyhow::Result<RgbImage>> {
    /// Frames per second used to derive timestamps.
    fn fps(&self) -> f64;
    /// Frame count announced by the container, if it knows one.
    fn total_frames(&self) -> Option<u64>;
}

/// Frames held in memory, for synthetic input.
pub struct MemorySource {
    frames: VecDeque<RgbImage>,
    fps: f64,
    total: u64,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        Self {
            total: frames.len() as u64,
            frames: frames.into(),
            fps,
        }
    }

    /// `count` blank frames of the given size.
    pub fn blank(count: usize, width: u32, height: u32, fps: f64) -> Self {
        Self::new(vec![RgbImage::new(width, height); count], fps)
    }
}

impl Iterator for MemorySource {
    type Item = anyhow::Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        self.frames.pop_front().map(Ok)
    }
}

impl FrameSource for MemorySource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> Option<u64> {
        Some(self.total)
    }
}
