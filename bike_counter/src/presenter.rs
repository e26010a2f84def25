use std::io::{self, Write};

use inference_common::frame_record::FrameRecord;
use inference_common::video_meta::VideoMeta;
use inference_common::{CountSummary, Progress};

use crate::report::Artifacts;

/// Surface that shows a run to the user.
pub trait Presenter {
    /// Called once the video is open, before any frame is counted.
    fn start(&mut self, video: &VideoMeta) -> anyhow::Result<()>;
    fn progress(&mut self, progress: &Progress) -> anyhow::Result<()>;
    /// Shows the finished results. May block until the user dismisses them.
    fn render(&mut self, summary: &CountSummary, artifacts: &Artifacts) -> anyhow::Result<()>;
    /// Reports a run that produced nothing to show.
    fn error(&mut self, message: &str) -> anyhow::Result<()>;
}

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Compresses counts over time into `width` block characters, one bucket
/// per column showing the bucket's maximum.
pub fn sparkline(records: &[FrameRecord], width: usize) -> String {
    if records.is_empty() || width == 0 {
        return String::new();
    }
    let buckets = width.min(records.len());
    let max = records.iter().map(|r| r.bike_count).max().unwrap_or(0).max(1);
    (0..buckets)
        .map(|b| {
            let start = b * records.len() / buckets;
            let end = ((b + 1) * records.len() / buckets).max(start + 1);
            let peak = records[start..end].iter().map(|r| r.bike_count).max().unwrap_or(0);
            let level = (peak as usize * (SPARK_LEVELS.len() - 1)) / max as usize;
            SPARK_LEVELS[level]
        })
        .collect()
}

/// Plain stdout output for `--headless` runs.
pub struct TextPresenter<W: Write> {
    out: W,
    last_logged_pct: Option<u64>,
}

impl TextPresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_logged_pct: None,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for TextPresenter<W> {
    fn start(&mut self, video: &VideoMeta) -> anyhow::Result<()> {
        writeln!(
            self.out,
            "Detecting bikes in {} ({}x{}, {:.2} fps)... This may take a moment.",
            video.filename(),
            video.width,
            video.height,
            video.fps
        )?;
        Ok(())
    }

    fn progress(&mut self, progress: &Progress) -> anyhow::Result<()> {
        match progress.ratio() {
            Some(ratio) => {
                let pct = (ratio * 100.0) as u64 / 10 * 10;
                if self.last_logged_pct != Some(pct) {
                    self.last_logged_pct = Some(pct);
                    log::info!(
                        "Processed {}/{} frames ({pct}%)",
                        progress.frames_done,
                        progress.total_frames.unwrap_or_default()
                    );
                }
            }
            None if progress.frames_done % 500 == 0 => {
                log::info!("Processed {} frames", progress.frames_done);
            }
            None => {}
        }
        Ok(())
    }

    fn render(&mut self, summary: &CountSummary, artifacts: &Artifacts) -> anyhow::Result<()> {
        let out = &mut self.out;
        writeln!(out, "Analysis complete")?;
        writeln!(out)?;
        writeln!(
            out,
            "Bike count over time ({} frames, {:.2}s):",
            summary.records.len(),
            summary.duration_sec()
        )?;
        writeln!(out, "  {}", sparkline(&summary.records, 60))?;
        writeln!(out)?;

        writeln!(out, "Detected class summary:")?;
        writeln!(out, "  {}", summary.tally)?;
        for entry in summary.tally.ranked() {
            writeln!(out, "  {:<14} {}", entry.class_name, entry.count)?;
        }
        writeln!(out)?;

        writeln!(out, "Detection highlights:")?;
        writeln!(
            out,
            "  Peak count:   {} bikes at {:.2} sec",
            summary.peak.record.bike_count, summary.peak.record.timestamp_sec
        )?;
        writeln!(
            out,
            "  Lowest count: {} bikes at {:.2} sec",
            summary.trough.record.bike_count, summary.trough.record.timestamp_sec
        )?;

        if !summary.snapshots.is_empty() {
            writeln!(out)?;
            writeln!(out, "Snapshot frames with high bike count:")?;
            for (snap, path) in summary.snapshots.iter().zip(&artifacts.snapshots) {
                writeln!(out, "  {:<20} {}", snap.caption(), path.display())?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Downloads:")?;
        writeln!(out, "  JSON: {}", artifacts.json.display())?;
        writeln!(out, "  CSV:  {}", artifacts.csv.display())?;
        writeln!(out, "  Summary: {}", artifacts.summary.display())?;
        out.flush()?;
        Ok(())
    }

    fn error(&mut self, message: &str) -> anyhow::Result<()> {
        log::error!("{message}");
        writeln!(self.out, "Error: {message}")?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use image::RgbImage;
    use inference_common::bbox::Bbox;
    use inference_common::{CountConfig, Detection, FrameCounter};

    fn records(counts: &[u32]) -> Vec<FrameRecord> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &c)| FrameRecord::new(i as u64, 1.0, c))
            .collect()
    }

    #[test]
    fn sparkline_scales_to_max() {
        let records = records(&[0, 7, 3, 7]);
        assert_eq!(sparkline(&records, 10), "▁█▄█");
        assert_eq!(sparkline(&records, 2), "██");
        assert_eq!(sparkline(&[], 10), "");
    }

    #[test]
    fn text_render_lists_highlights_and_downloads() {
        let mut counter = FrameCounter::new(10.0, CountConfig::default()).unwrap();
        let frame = RgbImage::new(8, 8);
        for n in [2usize, 4, 1] {
            let dets: Vec<Detection> = (0..n)
                .map(|_| Detection {
                    class_id: 1,
                    confidence: 0.5,
                    bbox: Bbox::new(0.0, 0.0, 2.0, 2.0),
                })
                .collect();
            counter.push(&frame, &dets).unwrap();
        }
        let summary = counter.finish().unwrap();
        let artifacts = Artifacts {
            dir: PathBuf::from("out"),
            json: PathBuf::from("out/bike_counts.json"),
            csv: PathBuf::from("out/bike_counts.csv"),
            summary: PathBuf::from("out/summary.json"),
            snapshots: vec![PathBuf::from("out/snapshot_1_0.10s.jpg")],
        };

        let mut presenter = TextPresenter::new(Vec::new());
        presenter.render(&summary, &artifacts).unwrap();
        let text = String::from_utf8(presenter.into_inner()).unwrap();

        assert!(text.contains("Peak count:   4 bikes at 0.10 sec"));
        assert!(text.contains("Lowest count: 1 bikes at 0.20 sec"));
        assert!(text.contains("{1: 7}"));
        assert!(text.contains("4 bikes @ 0.10s"));
        assert!(text.contains("out/bike_counts.csv"));
    }

    #[test]
    fn error_is_shown() {
        let mut presenter = TextPresenter::new(Vec::new());
        presenter
            .error("No data was captured during detection.")
            .unwrap();
        let text = String::from_utf8(presenter.into_inner()).unwrap();
        assert_eq!(text, "Error: No data was captured during detection.\n");
    }
}
