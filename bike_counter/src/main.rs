extern crate ffmpeg_next as ffmpeg;

mod decode;
mod presenter;
mod process_video;
mod report;
mod tui;

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use inference_common::{CountConfig, CountError};
use ort_common::DecodeParams;
use tracing_subscriber::prelude::*;

use crate::presenter::{Presenter, TextPresenter};
use crate::process_video::{default_out_dir, RunOptions};
use crate::tui::TuiPresenter;

const DEFAULT_LOG_FILTER: &str = "warn,bike_counter=info,inference_common=info,ort_common=info";
const LOG_EXTENSION: &str = "bike_counter.log";

#[derive(Debug, Parser)]
pub struct Args {
    /// Path to input video file (.mp4/.mov/.avi).
    input: PathBuf,
    /// Yolov8 onnx model file to use.
    #[arg(long, short, default_value = "_models/yolov8n.onnx")]
    model: PathBuf,
    /// Whether to attempt to use `cuda` hw acceleration.
    /// This may silently fail and fallback to cpu acceleration presently.
    #[arg(long, action, default_value = "false")]
    cuda: bool,
    /// Minimum detection confidence.
    #[arg(long, default_value_t = 0.25)]
    conf: f32,
    /// IoU above which same-class boxes are suppressed.
    #[arg(long, default_value_t = 0.7)]
    iou: f32,
    /// Comma separated class ids to count, e.g. "1,3". Counts everything when omitted.
    #[arg(long, value_parser = parse_classes)]
    classes: Option<BTreeSet<usize>>,
    /// A frame with at least this many detections may become a snapshot.
    #[arg(long, default_value_t = 3)]
    snapshot_threshold: u32,
    /// Number of snapshot frames to keep.
    #[arg(long, default_value_t = 3)]
    top_snapshots: usize,
    /// Outline detections on the saved snapshot frames.
    #[arg(long, action, default_value = "false")]
    boxes: bool,
    /// Output directory, `<stem>_counts/` next to the input by default.
    #[arg(long, short)]
    out_dir: Option<PathBuf>,
    /// Print plain text instead of the terminal dashboard.
    #[arg(long, action, default_value = "false")]
    headless: bool,
}

fn parse_classes(s: &str) -> Result<BTreeSet<usize>, String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .map_err(|e| format!("invalid class id {part:?}: {e}"))
        })
        .collect::<Result<BTreeSet<_>, _>>()
        .and_then(|classes| {
            if classes.is_empty() {
                Err("expected at least one class id".to_string())
            } else {
                Ok(classes)
            }
        })
}

fn check_input(path: &Path) -> Result<(), CountError> {
    let ext = path
        .extension()
        .and_then(|os_str| os_str.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("mp4" | "mov" | "avi") => Ok(()),
        _ => Err(CountError::UnsupportedInput {
            path: path.to_path_buf(),
        }),
    }
}

impl Args {
    fn run_options(&self) -> RunOptions {
        RunOptions {
            input: self.input.clone(),
            model: self.model.clone(),
            cuda: self.cuda,
            decode: DecodeParams {
                conf_threshold: self.conf,
                iou_threshold: self.iou,
            },
            count: CountConfig {
                snapshot_threshold: self.snapshot_threshold,
                top_snapshots: self.top_snapshots,
                class_filter: self.classes.clone(),
                draw_boxes: self.boxes,
            },
            out_dir: self
                .out_dir
                .clone()
                .unwrap_or_else(|| default_out_dir(&self.input)),
        }
    }
}

/// `<stem>.bike_counter.log` next to the input, so a run that captures
/// nothing leaves the output directory uncreated.
fn log_file_path(input: &Path) -> PathBuf {
    input.with_extension(LOG_EXTENSION)
}

/// The dashboard owns the terminal, so logs go to a file while it runs.
fn init_logging(headless: bool, input: &Path) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    if headless {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        let log_path = log_file_path(input);
        let file =
            File::create(&log_path).with_context(|| format!("Failed to create {log_path:?}"))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    check_input(&args.input)?;
    let opts = args.run_options();

    // Initialize logging.
    init_logging(args.headless, &opts.input)?;
    log::info!("{opts:?}");

    let mut presenter: Box<dyn Presenter> = if args.headless {
        Box::new(TextPresenter::stdout())
    } else {
        Box::new(TuiPresenter::new()?)
    };

    let outcome = process_video::process_video(&opts, presenter.as_mut());
    // restores the terminal before any error is printed
    drop(presenter);

    match outcome? {
        Some(artifacts) => {
            log::info!("Done, results in {:?}", artifacts.dir);
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::FAILURE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_video_extensions_in_any_case() {
        for name in ["a.mp4", "b.MOV", "c.Avi", "dir/d.mp4"] {
            assert!(check_input(Path::new(name)).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_other_inputs() {
        for name in ["a.mkv", "b.jpg", "noext"] {
            let err = check_input(Path::new(name)).unwrap_err();
            assert!(matches!(err, CountError::UnsupportedInput { .. }), "{name}");
        }
    }

    #[test]
    fn log_file_stays_out_of_the_artifact_directory() {
        let input = Path::new("rides/clip.mp4");
        let log = log_file_path(input);
        assert_eq!(log, PathBuf::from("rides/clip.bike_counter.log"));
        assert!(!log.starts_with(default_out_dir(input)));
    }

    #[test]
    fn class_list_parsing() {
        assert_eq!(parse_classes("1, 3,1").unwrap(), BTreeSet::from([1, 3]));
        assert!(parse_classes("bicycle").is_err());
        assert!(parse_classes(",").is_err());
    }

    #[test]
    fn args_map_to_run_options() {
        let args = Args::parse_from([
            "bike_counter",
            "rides/clip.mp4",
            "--classes",
            "1",
            "--snapshot-threshold",
            "2",
        ]);
        let opts = args.run_options();
        assert_eq!(opts.out_dir, PathBuf::from("rides/clip_counts"));
        assert_eq!(opts.count.snapshot_threshold, 2);
        assert_eq!(opts.count.top_snapshots, 3);
        assert_eq!(opts.count.class_filter, Some(BTreeSet::from([1])));
        assert!(!opts.count.draw_boxes);
        assert!(
            Args::parse_from(["bike_counter", "clip.mp4", "--boxes"])
                .run_options()
                .count
                .draw_boxes
        );
        assert_eq!(opts.decode, DecodeParams::default());
        assert_eq!(opts.model, PathBuf::from("_models/yolov8n.onnx"));
    }
}
