use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::bbox::Bbox;

/// One object found in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Index into [`crate::coco_classes::NAMES`].
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: Bbox,
}

/// A pretrained detector: one frame in, a set of detections out.
///
/// Failures are fatal to a counting run; implementations should not retry.
pub trait Detector {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>>;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        (**self).detect(frame)
    }
}
