//! Yolov8 object detection on an ort session.
//!
//! The model takes a `[1, 3, 640, 640]` rgb tensor in `[0, 1]` and emits
//! `[1, 4 + classes, proposals]`: box center/size in input pixels followed by
//! one score per class.

use std::time::Instant;

use anyhow::{bail, Context};
use fast_image_resize as fr;
use image::RgbImage;
use inference_common::bbox::Bbox;
use inference_common::{Detection, Detector};
use ndarray::{Array4, CowArray};
use ort::session::Session;
use ort::value::TensorRef;

/// Side of the square model input.
pub const INPUT_SIZE: u32 = 640;

/// Post-processing thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    /// Minimum best-class score for a proposal to be kept.
    pub conf_threshold: f32,
    /// Same-class boxes overlapping more than this are suppressed.
    pub iou_threshold: f32,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            conf_threshold: 0.25,
            iou_threshold: 0.7,
        }
    }
}

pub struct YoloV8Detector {
    session: Session,
    params: DecodeParams,
}

impl YoloV8Detector {
    pub fn new(session: Session, params: DecodeParams) -> Self {
        Self { session, params }
    }
}

impl Detector for YoloV8Detector {
    fn detect(&mut self, frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let start = Instant::now();
        let input = CowArray::from(to_input_tensor(frame)?).into_dyn();
        let preprocess = start.elapsed();

        let start = Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(&input)?])
            .context("Yolov8 inference failed")?;
        let forward_pass = start.elapsed();

        let start = Instant::now();
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract yolov8 output tensor")?;
        let detections = decode_predictions(data, shape, frame.dimensions(), &self.params)?;
        let postprocess = start.elapsed();

        log::trace!(
            "preprocess {preprocess:?}, forward pass {forward_pass:?}, postprocess {postprocess:?}"
        );
        Ok(detections)
    }
}

/// Resizes the frame to the model input and lays it out as NCHW floats.
pub fn to_input_tensor(frame: &RgbImage) -> anyhow::Result<Array4<f32>> {
    let (width, height) = frame.dimensions();
    let src = fr::images::ImageRef::new(width, height, frame.as_raw(), fr::PixelType::U8x3)
        .context("Frame buffer doesn't match its dimensions")?;
    let mut dst = fr::images::Image::new(INPUT_SIZE, INPUT_SIZE, fr::PixelType::U8x3);

    let options =
        fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear));
    fr::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("Failed to resize frame to model input")?;

    let side = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
    for (idx, px) in dst.buffer().chunks_exact(3).enumerate() {
        let (y, x) = (idx / side, idx % side);
        tensor[[0, 0, y, x]] = px[0] as f32 / 255.0;
        tensor[[0, 1, y, x]] = px[1] as f32 / 255.0;
        tensor[[0, 2, y, x]] = px[2] as f32 / 255.0;
    }
    Ok(tensor)
}

/// Turns raw model output into detections in source frame pixels.
///
/// Accepts both `[1, attrs, proposals]` and the transposed
/// `[1, proposals, attrs]` layout some exporters produce.
pub fn decode_predictions(
    data: &[f32],
    shape: &[i64],
    frame_size: (u32, u32),
    params: &DecodeParams,
) -> anyhow::Result<Vec<Detection>> {
    let &[batch, d1, d2] = shape else {
        bail!("Unexpected yolov8 output shape {shape:?}");
    };
    if batch != 1 || d1 <= 0 || d2 <= 0 {
        bail!("Unexpected yolov8 output shape {shape:?}");
    }
    let (d1, d2) = (d1 as usize, d2 as usize);
    if data.len() != d1 * d2 {
        bail!(
            "Output holds {} values, shape {shape:?} needs {}",
            data.len(),
            d1 * d2
        );
    }

    // yolov8 always has far more proposals than attributes
    let channels_first = d1 <= d2;
    let (num_attrs, num_proposals) = if channels_first { (d1, d2) } else { (d2, d1) };
    if num_attrs < 5 {
        bail!("Output has {num_attrs} attributes, need box + at least one class");
    }
    let at = |attr: usize, proposal: usize| {
        if channels_first {
            data[attr * num_proposals + proposal]
        } else {
            data[proposal * num_attrs + attr]
        }
    };

    let (frame_w, frame_h) = (frame_size.0 as f32, frame_size.1 as f32);
    let sx = frame_w / INPUT_SIZE as f32;
    let sy = frame_h / INPUT_SIZE as f32;

    let mut candidates = Vec::new();
    for i in 0..num_proposals {
        let (class_id, confidence) = (4..num_attrs)
            .map(|attr| (attr - 4, at(attr, i)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if confidence < params.conf_threshold {
            continue;
        }
        let bbox = Bbox::from_center(at(0, i), at(1, i), at(2, i), at(3, i))
            .scale(sx, sy)
            .clamp(frame_w, frame_h);
        candidates.push(Detection {
            class_id,
            confidence,
            bbox,
        });
    }

    Ok(non_max_suppression(candidates, params.iou_threshold))
}

/// Greedy per-class nms, highest confidence first.
pub fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for det in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == det.class_id && k.bbox.iou(&det.bbox) > iou_threshold);
        if !overlaps {
            kept.push(det);
        }
    }
    kept
}
