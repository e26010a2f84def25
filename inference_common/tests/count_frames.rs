//! Drives whole counting runs over synthetic frames and a scripted detector.

use std::collections::VecDeque;

use anyhow::bail;
use image::RgbImage;
use inference_common::bbox::Bbox;
use inference_common::frame_source::MemorySource;
use inference_common::{count_frames, export, CountConfig, CountError, Detection, Detector};

/// Replays a fixed list of per-frame class ids.
struct ScriptedDetector {
    frames: VecDeque<Vec<usize>>,
}

impl ScriptedDetector {
    fn new(script: &[&[usize]]) -> Self {
        Self {
            frames: script.iter().map(|classes| classes.to_vec()).collect(),
        }
    }

    fn counts(counts: &[usize]) -> Self {
        Self {
            frames: counts.iter().map(|&n| vec![1; n]).collect(),
        }
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        let Some(classes) = self.frames.pop_front() else {
            bail!("detector called more often than scripted");
        };
        Ok(classes
            .into_iter()
            .enumerate()
            .map(|(i, class_id)| Detection {
                class_id,
                confidence: 0.9,
                bbox: Bbox::new(i as f32, 0.0, i as f32 + 2.0, 2.0),
            })
            .collect())
    }
}

struct FailingDetector;

impl Detector for FailingDetector {
    fn detect(&mut self, _frame: &RgbImage) -> anyhow::Result<Vec<Detection>> {
        bail!("model exploded")
    }
}

fn no_progress(_: &inference_common::Progress) -> anyhow::Result<()> {
    Ok(())
}

#[test]
fn one_record_per_frame_with_index_over_fps_timestamps() {
    let counts = [0, 1, 2, 3, 4, 5, 6];
    let fps = 29.97;
    let source = MemorySource::blank(counts.len(), 8, 8, fps);
    let mut detector = ScriptedDetector::counts(&counts);

    let summary = count_frames(source, &mut detector, CountConfig::default(), no_progress).unwrap();

    assert_eq!(summary.records.len(), counts.len());
    for (i, record) in summary.records.iter().enumerate() {
        assert!((record.timestamp_sec - i as f64 / fps).abs() < 1e-12);
        assert_eq!(record.bike_count as usize, counts[i]);
    }
}

#[test]
fn peak_and_trough_bound_every_record() {
    let counts = [3, 1, 4, 1, 5, 9, 2, 6, 9, 1];
    let source = MemorySource::blank(counts.len(), 8, 8, 10.0);
    let mut detector = ScriptedDetector::counts(&counts);

    let summary = count_frames(source, &mut detector, CountConfig::default(), no_progress).unwrap();

    for record in &summary.records {
        assert!(summary.peak.record.bike_count >= record.bike_count);
        assert!(summary.trough.record.bike_count <= record.bike_count);
    }
    assert_eq!(summary.peak.frame_index, 5);
    assert!((summary.peak.record.timestamp_sec - 0.5).abs() < 1e-9);
    assert_eq!(summary.trough.frame_index, 1);
}

#[test]
fn snapshots_are_top_three_above_threshold() {
    let counts = [2, 3, 5, 0, 5, 4, 2, 7];
    let source = MemorySource::blank(counts.len(), 16, 16, 1.0);
    let mut detector = ScriptedDetector::counts(&counts);

    let summary = count_frames(source, &mut detector, CountConfig::default(), no_progress).unwrap();

    let snaps: Vec<(u32, f64)> = summary
        .snapshots
        .iter()
        .map(|s| (s.count, s.timestamp_sec))
        .collect();
    assert_eq!(snaps, vec![(7, 7.0), (5, 2.0), (5, 4.0)]);
    assert!(summary.snapshots.iter().all(|s| s.count >= 3));
}

#[test]
fn no_snapshots_below_threshold() {
    let counts = [0, 1, 2, 2, 1];
    let source = MemorySource::blank(counts.len(), 8, 8, 1.0);
    let mut detector = ScriptedDetector::counts(&counts);

    let summary = count_frames(source, &mut detector, CountConfig::default(), no_progress).unwrap();
    assert!(summary.snapshots.is_empty());
}

#[test]
fn tally_sum_matches_record_sum() {
    let script: &[&[usize]] = &[&[1, 1, 2], &[], &[3], &[1, 0, 0, 7], &[2, 2]];
    let source = MemorySource::blank(script.len(), 8, 8, 24.0);
    let mut detector = ScriptedDetector::new(script);

    let summary = count_frames(source, &mut detector, CountConfig::default(), no_progress).unwrap();

    let record_sum: u64 = summary.records.iter().map(|r| u64::from(r.bike_count)).sum();
    assert_eq!(summary.tally.total(), record_sum);
    assert_eq!(summary.tally.get(1), 3);
    assert_eq!(summary.tally.get(0), 2);
}

#[test]
fn tally_sum_matches_record_sum_with_class_filter() {
    let script: &[&[usize]] = &[&[1, 1, 2], &[0, 3], &[3, 3, 1, 5]];
    let source = MemorySource::blank(script.len(), 8, 8, 24.0);
    let mut detector = ScriptedDetector::new(script);
    let config = CountConfig {
        class_filter: Some([1, 3].into_iter().collect()),
        ..CountConfig::default()
    };

    let summary = count_frames(source, &mut detector, config, no_progress).unwrap();

    let counts: Vec<u32> = summary.records.iter().map(|r| r.bike_count).collect();
    assert_eq!(counts, vec![2, 1, 3]);
    assert_eq!(summary.tally.total(), 6);
    assert_eq!(summary.tally.get(2), 0);
}

#[test]
fn empty_video_is_no_frames_and_never_reports_progress() {
    let source = MemorySource::blank(0, 8, 8, 30.0);
    let mut detector = ScriptedDetector::counts(&[]);
    let mut calls = 0;

    let err = count_frames(source, &mut detector, CountConfig::default(), |_| {
        calls += 1;
        Ok(())
    })
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CountError>(),
        Some(CountError::NoFrames)
    ));
    assert_eq!(err.to_string(), "No data was captured during detection.");
    assert_eq!(calls, 0);
}

#[test]
fn empty_video_without_frame_rate_is_no_frames() {
    let source = MemorySource::blank(0, 8, 8, 0.0);
    let mut detector = ScriptedDetector::counts(&[]);

    let err = count_frames(source, &mut detector, CountConfig::default(), no_progress)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CountError>(),
        Some(CountError::NoFrames)
    ));
}

#[test]
fn frames_without_frame_rate_are_rejected() {
    let source = MemorySource::blank(2, 8, 8, 0.0);
    let mut detector = ScriptedDetector::counts(&[1, 1]);

    let err = count_frames(source, &mut detector, CountConfig::default(), no_progress)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<CountError>(),
        Some(CountError::InvalidFps(_))
    ));
}

#[test]
fn detector_failure_aborts_the_run() {
    let source = MemorySource::blank(3, 8, 8, 30.0);
    let err = count_frames(source, &mut FailingDetector, CountConfig::default(), no_progress)
        .unwrap_err();
    assert!(err.to_string().contains("model exploded"));
}

#[test]
fn progress_is_reported_per_frame() {
    let counts = [1, 2, 3, 4];
    let source = MemorySource::blank(counts.len(), 8, 8, 2.0);
    let mut detector = ScriptedDetector::counts(&counts);
    let mut seen = Vec::new();

    count_frames(source, &mut detector, CountConfig::default(), |p| {
        seen.push((p.frames_done, p.total_frames, p.latest.bike_count));
        Ok(())
    })
    .unwrap();

    assert_eq!(
        seen,
        vec![
            (1, Some(4), 1),
            (2, Some(4), 2),
            (3, Some(4), 3),
            (4, Some(4), 4)
        ]
    );
}

#[test]
fn exports_written_to_disk_parse_back() {
    let counts = [0, 3, 1, 8, 2];
    let source = MemorySource::blank(counts.len(), 8, 8, 30.0);
    let mut detector = ScriptedDetector::counts(&counts);
    let summary = count_frames(source, &mut detector, CountConfig::default(), no_progress).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("bike_counts.csv");
    let json_path = dir.path().join("bike_counts.json");
    std::fs::write(&csv_path, export::to_csv(&summary.records)).unwrap();
    std::fs::write(&json_path, export::to_json(&summary.records).unwrap()).unwrap();

    let from_csv = export::parse_csv(&std::fs::read_to_string(&csv_path).unwrap()).unwrap();
    let from_json = export::from_json(&std::fs::read_to_string(&json_path).unwrap()).unwrap();

    for parsed in [from_csv, from_json] {
        assert_eq!(parsed.len(), summary.records.len());
        for (a, b) in summary.records.iter().zip(&parsed) {
            assert!((a.timestamp_sec - b.timestamp_sec).abs() < 1e-6);
            assert_eq!(a.bike_count, b.bike_count);
        }
    }
}
