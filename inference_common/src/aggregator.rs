//! Per-frame counting and the end-of-run summary.

use std::collections::BTreeSet;
use std::time::Instant;

use image::RgbImage;
use serde::Serialize;

use crate::detection::{Detection, Detector};
use crate::error::CountError;
use crate::frame_record::FrameRecord;
use crate::frame_source::FrameSource;
use crate::frame_times::{AggregatedTimes, FrameTimes};
use crate::snapshot::{self, Snapshot, SnapshotBuffer};
use crate::tally::ClassTally;

/// Knobs of a counting run.
#[derive(Debug, Clone, PartialEq)]
pub struct CountConfig {
    /// A frame becomes a snapshot candidate at this count or above.
    pub snapshot_threshold: u32,
    /// Number of snapshots retained.
    pub top_snapshots: usize,
    /// Count only these class ids; `None` counts every detection.
    pub class_filter: Option<BTreeSet<usize>>,
    /// Outline detections on snapshot images; off keeps the frame as decoded.
    pub draw_boxes: bool,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            snapshot_threshold: 3,
            top_snapshots: 3,
            class_filter: None,
            draw_boxes: false,
        }
    }
}

impl CountConfig {
    fn counts(&self, det: &Detection) -> bool {
        self.class_filter
            .as_ref()
            .map_or(true, |classes| classes.contains(&det.class_id))
    }
}

/// A frame picked out by its count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extremum {
    pub frame_index: usize,
    #[serde(flatten)]
    pub record: FrameRecord,
}

/// Everything known once every frame has been counted.
#[derive(Debug, Clone)]
pub struct CountSummary {
    pub fps: f64,
    pub records: Vec<FrameRecord>,
    pub tally: ClassTally,
    /// Ordered by count descending.
    pub snapshots: Vec<Snapshot>,
    /// Highest count, first occurrence.
    pub peak: Extremum,
    /// Lowest count, first occurrence.
    pub trough: Extremum,
    pub times: AggregatedTimes,
}

impl CountSummary {
    pub fn total_detections(&self) -> u64 {
        self.tally.total()
    }

    pub fn duration_sec(&self) -> f64 {
        self.records.len() as f64 / self.fps
    }

    pub fn mean_count(&self) -> f64 {
        let sum: u64 = self.records.iter().map(|r| u64::from(r.bike_count)).sum();
        sum as f64 / self.records.len() as f64
    }
}

/// Accumulates frame records, the class tally and snapshot candidates.
pub struct FrameCounter {
    config: CountConfig,
    fps: f64,
    records: Vec<FrameRecord>,
    tally: ClassTally,
    snapshots: SnapshotBuffer,
    times: AggregatedTimes,
}

impl FrameCounter {
    pub fn new(fps: f64, config: CountConfig) -> Result<Self, CountError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(CountError::InvalidFps(fps));
        }
        Ok(Self {
            snapshots: SnapshotBuffer::new(config.top_snapshots),
            config,
            fps,
            records: Vec::new(),
            tally: ClassTally::new(),
            times: AggregatedTimes::default(),
        })
    }

    /// Counts the next frame in sequence.
    pub fn push(&mut self, frame: &RgbImage, detections: &[Detection]) -> anyhow::Result<FrameRecord> {
        let counted: Vec<Detection> = detections
            .iter()
            .filter(|det| self.config.counts(det))
            .copied()
            .collect();
        let count = counted.len() as u32;
        let record = FrameRecord::new(self.records.len() as u64, self.fps, count);

        for det in &counted {
            self.tally.add(det.class_id);
        }
        self.records.push(record);

        if count >= self.config.snapshot_threshold && self.snapshots.would_accept(count) {
            let image = if self.config.draw_boxes {
                snapshot::encode_jpeg(&snapshot::annotate(frame, &counted))?
            } else {
                snapshot::encode_jpeg(frame)?
            };
            log::debug!(
                "Snapshot candidate at {:.2}s with {count} objects",
                record.timestamp_sec
            );
            self.snapshots.offer(Snapshot {
                timestamp_sec: record.timestamp_sec,
                image,
                count,
            });
        }

        Ok(record)
    }

    pub fn record_times(&mut self, times: FrameTimes) {
        self.times.push(times);
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn tally(&self) -> &ClassTally {
        &self.tally
    }

    pub fn finish(self) -> Result<CountSummary, CountError> {
        let (peak, trough) = extrema(&self.records).ok_or(CountError::NoFrames)?;
        Ok(CountSummary {
            fps: self.fps,
            records: self.records,
            tally: self.tally,
            snapshots: self.snapshots.into_vec(),
            peak,
            trough,
            times: self.times,
        })
    }
}

/// Max and min count, keeping the earliest frame on ties.
pub fn extrema(records: &[FrameRecord]) -> Option<(Extremum, Extremum)> {
    let (first, rest) = records.split_first()?;
    let mut peak = Extremum {
        frame_index: 0,
        record: *first,
    };
    let mut trough = peak;
    for (i, record) in rest.iter().enumerate() {
        let frame_index = i + 1;
        if record.bike_count > peak.record.bike_count {
            peak = Extremum {
                frame_index,
                record: *record,
            };
        }
        if record.bike_count < trough.record.bike_count {
            trough = Extremum {
                frame_index,
                record: *record,
            };
        }
    }
    Some((peak, trough))
}

/// Where a run is after each frame.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub frames_done: u64,
    pub total_frames: Option<u64>,
    pub latest: FrameRecord,
    pub times: FrameTimes,
}

impl Progress {
    /// Fraction done in `[0, 1]`, when the total is known.
    pub fn ratio(&self) -> Option<f64> {
        match self.total_frames {
            Some(total) if total > 0 => Some((self.frames_done as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

/// Decodes, detects and counts every frame of `source`.
///
/// A decoder or detector failure aborts the run. A source that yields no
/// frames ends in [`CountError::NoFrames`], whatever frame rate it reports;
/// the frame rate is only checked once a first frame arrives.
pub fn count_frames<S, D, F>(
    mut source: S,
    detector: &mut D,
    config: CountConfig,
    mut on_progress: F,
) -> anyhow::Result<CountSummary>
where
    S: FrameSource,
    D: Detector + ?Sized,
    F: FnMut(&Progress) -> anyhow::Result<()>,
{
    let total_frames = source.total_frames();
    let mut counter: Option<FrameCounter> = None;
    log::info!(
        "Counting frames at {:.3} fps, {} frames announced",
        source.fps(),
        total_frames.map_or_else(|| "unknown".to_string(), |n| n.to_string())
    );

    loop {
        let mut times = FrameTimes::default();

        let start = Instant::now();
        let Some(frame) = source.next() else {
            break;
        };
        let frame = frame?;
        times.decode = start.elapsed();

        let counter = match counter {
            Some(ref mut counter) => counter,
            None => counter.insert(FrameCounter::new(source.fps(), config.clone())?),
        };

        let start = Instant::now();
        let detections = detector.detect(&frame)?;
        times.inference = start.elapsed();

        let start = Instant::now();
        let latest = counter.push(&frame, &detections)?;
        times.aggregation = start.elapsed();

        log::trace!("{times:?}");
        counter.record_times(times);
        on_progress(&Progress {
            frames_done: counter.records().len() as u64,
            total_frames,
            latest,
            times,
        })?;
    }

    let summary = counter.ok_or(CountError::NoFrames)?.finish()?;
    log::info!(
        "Counted {} frames, {} detections",
        summary.records.len(),
        summary.total_detections()
    );
    Ok(summary)
}
