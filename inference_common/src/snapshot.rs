//! Representative frames kept for display after a run.
//!
//! Frames whose count reaches a threshold are candidates; only the
//! best few by count survive. Candidates are offered in frame order and
//! the buffer keeps them ordered by count descending, earlier frames first
//! among equal counts.

use std::io::Cursor;

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;

use crate::detection::Detection;

const JPEG_QUALITY: u8 = 90;

/// A saved, jpeg-encoded frame.
#[derive(Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp_sec: f64,
    #[serde(skip)]
    pub image: Vec<u8>,
    pub count: u32,
}

impl Snapshot {
    pub fn caption(&self) -> String {
        format!("{} bikes @ {:.2}s", self.count, self.timestamp_sec)
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("timestamp_sec", &self.timestamp_sec)
            .field("count", &self.count)
            .field("image_bytes", &self.image.len())
            .finish()
    }
}

/// Bounded top-k of snapshots by count.
#[derive(Debug, Default)]
pub struct SnapshotBuffer {
    capacity: usize,
    items: Vec<Snapshot>,
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Vec::with_capacity(capacity),
        }
    }

    /// Whether a frame with `count` would be kept if offered now.
    ///
    /// Lets callers skip encoding frames that cannot make the cut.
    pub fn would_accept(&self, count: u32) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.items.len() < self.capacity || self.items.last().is_some_and(|s| count > s.count)
    }

    pub fn offer(&mut self, snapshot: Snapshot) {
        if !self.would_accept(snapshot.count) {
            return;
        }
        let pos = self
            .items
            .iter()
            .position(|s| s.count < snapshot.count)
            .unwrap_or(self.items.len());
        self.items.insert(pos, snapshot);
        self.items.truncate(self.capacity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Snapshot> {
        self.items
    }
}

/// Colour used for a class when outlining its boxes.
fn class_color(class_id: usize) -> Rgb<u8> {
    const PALETTE: [[u8; 3]; 6] = [
        [255, 56, 56],
        [255, 157, 151],
        [255, 112, 31],
        [72, 249, 10],
        [0, 194, 255],
        [203, 56, 255],
    ];
    Rgb(PALETTE[class_id % PALETTE.len()])
}

/// Draws the outline of every detection onto a copy of the frame.
pub fn annotate(frame: &RgbImage, detections: &[Detection]) -> RgbImage {
    let mut out = frame.clone();
    let (w, h) = out.dimensions();
    for det in detections {
        let b = det.bbox.clamp(w as f32, h as f32);
        let width = b.width().round().max(1.0) as u32;
        let height = b.height().round().max(1.0) as u32;
        let rect = Rect::at(b.xmin as i32, b.ymin as i32).of_size(width, height);
        // 2px outline
        draw_hollow_rect_mut(&mut out, rect, class_color(det.class_id));
        if width > 2 && height > 2 {
            let inner = Rect::at(b.xmin as i32 + 1, b.ymin as i32 + 1).of_size(width - 2, height - 2);
            draw_hollow_rect_mut(&mut out, inner, class_color(det.class_id));
        }
    }
    out
}

pub fn encode_jpeg(frame: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(frame)
        .context("Failed to encode snapshot as jpeg")?;
    Ok(buf.into_inner())
}
