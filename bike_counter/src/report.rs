//! Output artifacts of a run: the downloadable tables, snapshots and a summary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use inference_common::export;
use inference_common::tally::TallyEntry;
use inference_common::video_meta::VideoMeta;
use inference_common::{CountSummary, Extremum};
use serde::Serialize;

pub const JSON_FILE: &str = "bike_counts.json";
pub const CSV_FILE: &str = "bike_counts.csv";
pub const SUMMARY_FILE: &str = "summary.json";

/// Paths of everything [`write_artifacts`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    pub dir: PathBuf,
    pub json: PathBuf,
    pub csv: PathBuf,
    pub summary: PathBuf,
    /// Same order as `CountSummary::snapshots`.
    pub snapshots: Vec<PathBuf>,
}

#[derive(Serialize)]
struct SnapshotEntry<'a> {
    rank: usize,
    timestamp_sec: f64,
    count: u32,
    caption: String,
    file: &'a Path,
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    video: &'a VideoMeta,
    frames: usize,
    duration_sec: f64,
    total_detections: u64,
    mean_count: f64,
    peak: &'a Extremum,
    trough: &'a Extremum,
    class_tally: Vec<TallyEntry>,
    snapshots: Vec<SnapshotEntry<'a>>,
}

fn snapshot_file_name(rank: usize, timestamp_sec: f64) -> String {
    format!("snapshot_{rank}_{timestamp_sec:.2}s.jpg")
}

/// Writes the json/csv tables, the snapshot jpegs and `summary.json` into `dir`.
pub fn write_artifacts(
    dir: &Path,
    video: &VideoMeta,
    summary: &CountSummary,
) -> anyhow::Result<Artifacts> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;

    let json = dir.join(JSON_FILE);
    fs::write(&json, export::to_json(&summary.records)?)
        .with_context(|| format!("Failed to write {json:?}"))?;

    let csv = dir.join(CSV_FILE);
    fs::write(&csv, export::to_csv(&summary.records))
        .with_context(|| format!("Failed to write {csv:?}"))?;

    let mut snapshots = Vec::with_capacity(summary.snapshots.len());
    for (i, snap) in summary.snapshots.iter().enumerate() {
        let path = dir.join(snapshot_file_name(i + 1, snap.timestamp_sec));
        fs::write(&path, &snap.image).with_context(|| format!("Failed to write {path:?}"))?;
        snapshots.push(path);
    }

    let summary_path = dir.join(SUMMARY_FILE);
    let summary_file = SummaryFile {
        video,
        frames: summary.records.len(),
        duration_sec: summary.duration_sec(),
        total_detections: summary.total_detections(),
        mean_count: summary.mean_count(),
        peak: &summary.peak,
        trough: &summary.trough,
        class_tally: summary.tally.ranked(),
        snapshots: summary
            .snapshots
            .iter()
            .zip(&snapshots)
            .enumerate()
            .map(|(i, (snap, path))| SnapshotEntry {
                rank: i + 1,
                timestamp_sec: snap.timestamp_sec,
                count: snap.count,
                caption: snap.caption(),
                file: path.as_path(),
            })
            .collect(),
    };
    fs::write(&summary_path, serde_json::to_string_pretty(&summary_file)?)
        .with_context(|| format!("Failed to write {summary_path:?}"))?;

    log::info!(
        "Wrote {} frame records and {} snapshots to {dir:?}",
        summary.records.len(),
        snapshots.len()
    );

    Ok(Artifacts {
        dir: dir.to_path_buf(),
        json,
        csv,
        summary: summary_path,
        snapshots,
    })
}
