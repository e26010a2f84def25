use anyhow::Context;
use image::RgbImage;
use inference_common::frame_times::FrameTimes;
use inference_common::snapshot::Snapshot;
use inference_common::video_meta::VideoMeta;
use inference_common::{CountSummary, Progress};

use crate::report::Artifacts;

/// Dashboard state, fed by the counting run.
pub struct App {
    pub video: Option<VideoMeta>,

    // Current state
    pub frames_done: u64,
    pub total_frames: Option<u64>,
    pub latest_count: u32,
    pub max_count: u32,
    pub total_detections: u64,
    pub last_times: FrameTimes,

    /// `(timestamp_sec, bike_count)` for the chart.
    pub series: Vec<(f64, f64)>,

    // Results
    pub summary: Option<CountSummary>,
    pub artifacts: Option<Artifacts>,
    pub error: Option<String>,

    // UI state
    pub selected_snapshot: usize,
    thumbnail: Option<(usize, RgbImage)>,
    should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            video: None,
            frames_done: 0,
            total_frames: None,
            latest_count: 0,
            max_count: 0,
            total_detections: 0,
            last_times: FrameTimes::default(),
            series: Vec::new(),
            summary: None,
            artifacts: None,
            error: None,
            selected_snapshot: 0,
            thumbnail: None,
            should_quit: false,
        }
    }

    pub fn start(&mut self, video: &VideoMeta) {
        self.total_frames = video.total_frames;
        self.video = Some(video.clone());
    }

    pub fn update(&mut self, progress: &Progress) {
        let record = progress.latest;
        self.frames_done = progress.frames_done;
        self.total_frames = progress.total_frames;
        self.latest_count = record.bike_count;
        self.max_count = self.max_count.max(record.bike_count);
        self.total_detections += u64::from(record.bike_count);
        self.last_times = progress.times;
        self.series
            .push((record.timestamp_sec, f64::from(record.bike_count)));
    }

    pub fn finish(&mut self, summary: &CountSummary, artifacts: &Artifacts) {
        // the summary is authoritative over what progress accumulated
        self.series = summary
            .records
            .iter()
            .map(|r| (r.timestamp_sec, f64::from(r.bike_count)))
            .collect();
        self.frames_done = summary.records.len() as u64;
        self.max_count = summary.peak.record.bike_count;
        self.total_detections = summary.total_detections();
        self.summary = Some(summary.clone());
        self.artifacts = Some(artifacts.clone());
        self.selected_snapshot = 0;
        self.thumbnail = None;
    }

    pub fn fail(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }

    pub fn is_finished(&self) -> bool {
        self.summary.is_some() || self.error.is_some()
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        self.summary
            .as_ref()
            .map(|s| s.snapshots.as_slice())
            .unwrap_or(&[])
    }

    pub fn next_snapshot(&mut self) {
        let n = self.snapshots().len();
        if n > 0 {
            self.selected_snapshot = (self.selected_snapshot + 1) % n;
        }
    }

    pub fn prev_snapshot(&mut self) {
        let n = self.snapshots().len();
        if n > 0 {
            self.selected_snapshot = (self.selected_snapshot + n - 1) % n;
        }
    }

    pub fn selected(&self) -> Option<&Snapshot> {
        self.snapshots().get(self.selected_snapshot)
    }

    /// Decoded image of the selected snapshot, decoded once per selection.
    pub fn thumbnail(&mut self) -> anyhow::Result<Option<&RgbImage>> {
        let index = self.selected_snapshot;
        let cached = matches!(&self.thumbnail, Some((i, _)) if *i == index);
        if !cached {
            let Some(snapshot) = self.selected() else {
                return Ok(None);
            };
            let image = image::load_from_memory(&snapshot.image)
                .context("Failed to decode snapshot")?
                .to_rgb8();
            self.thumbnail = Some((index, image));
        }
        Ok(self.thumbnail.as_ref().map(|(_, image)| image))
    }

    pub fn progress_percentage(&self) -> f64 {
        match self.total_frames {
            Some(total) if total > 0 => (self.frames_done as f64 / total as f64 * 100.0).min(100.0),
            _ => 0.0,
        }
    }

    /// Upper x bound of the chart.
    pub fn time_span(&self) -> f64 {
        let known = self
            .video
            .as_ref()
            .and_then(|v| if self.is_finished() { None } else { v.duration_sec() });
        let seen = self.series.last().map(|(t, _)| *t).unwrap_or(0.0);
        known.unwrap_or(seen).max(seen).max(1.0)
    }
}
