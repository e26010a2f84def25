use std::path::{Path, PathBuf};

use inference_common::video_meta::VideoMeta;
use inference_common::{count_frames, CountConfig, CountError, Detector, FrameSource};
use ort_common::{load_session, DecodeParams, YoloV8Detector};

use crate::decode::FfmpegSource;
use crate::presenter::Presenter;
use crate::report::{self, Artifacts};

/// Everything a counting run needs, resolved from the command line.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub model: PathBuf,
    pub cuda: bool,
    pub decode: DecodeParams,
    pub count: CountConfig,
    pub out_dir: PathBuf,
}

/// Counts bikes in `opts.input` and shows the results on `presenter`.
///
/// Returns `None` when the video yielded no frames; the presenter has
/// already shown the error in that case.
pub fn process_video(
    opts: &RunOptions,
    presenter: &mut dyn Presenter,
) -> anyhow::Result<Option<Artifacts>> {
    let source = FfmpegSource::open(&opts.input)?;
    let video = VideoMeta::new(
        opts.input.clone(),
        source.width(),
        source.height(),
        source.fps(),
        source.total_frames(),
    );
    log::info!("{video:?}");
    presenter.start(&video)?;

    let session = load_session(&opts.model, opts.cuda)?;
    let mut detector = YoloV8Detector::new(session, opts.decode);

    count_and_report(
        source,
        &mut detector,
        &video,
        opts.count.clone(),
        &opts.out_dir,
        presenter,
    )
}

/// Runs the count over any source/detector pair, then writes the artifacts
/// into `out_dir` and renders them.
///
/// A run without frames is shown through [`Presenter::error`] and leaves
/// nothing on disk.
pub fn count_and_report<S, D>(
    source: S,
    detector: &mut D,
    video: &VideoMeta,
    config: CountConfig,
    out_dir: &Path,
    presenter: &mut dyn Presenter,
) -> anyhow::Result<Option<Artifacts>>
where
    S: FrameSource,
    D: Detector + ?Sized,
{
    let span = tracing::info_span!("count", video = %video.filename());
    let result = span.in_scope(|| {
        count_frames(source, detector, config, |progress| presenter.progress(progress))
    });

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => match e.downcast_ref::<CountError>() {
            Some(CountError::NoFrames) => {
                presenter.error(&CountError::NoFrames.to_string())?;
                return Ok(None);
            }
            _ => return Err(e),
        },
    };

    let artifacts = report::write_artifacts(out_dir, video, &summary)?;

    log::info!(
        "Peak: {} bikes at {:.2}s, lowest: {} bikes at {:.2}s",
        summary.peak.record.bike_count,
        summary.peak.record.timestamp_sec,
        summary.trough.record.bike_count,
        summary.trough.record.timestamp_sec
    );
    let avg = summary.times.avg(true);
    log::info!("Average frame times: {avg:?}");

    let min = summary.times.min(true);
    log::info!("Min frame times: {min:?}");

    let max = summary.times.max(true);
    log::info!("Max frame times: {max:?}");

    presenter.render(&summary, &artifacts)?;
    Ok(Some(artifacts))
}

/// `<stem>_counts/` next to the input video.
pub fn default_out_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{stem}_counts"))
}
