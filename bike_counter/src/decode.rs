//! Sequential frame decoding with ffmpeg.

use std::path::Path;

use anyhow::Context as _;
use ffmpeg::format::{context::Input, input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context, flag::Flags};
use ffmpeg::util::frame::video::Video;
use image::RgbImage;
use inference_common::FrameSource;

/// `AVFormatContext::duration` is in microseconds.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Decodes the best video stream of a file into rgb frames, one at a time.
pub struct FfmpegSource {
    ictx: Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Context,
    stream_index: usize,
    fps: f64,
    total_frames: Option<u64>,
    eof_sent: bool,
    done: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        ffmpeg::init().context("Failed to initialize ffmpeg")?;

        let ictx = input(&path).with_context(|| format!("Failed to open video {path:?}"))?;
        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or(ffmpeg::Error::StreamNotFound)
            .with_context(|| format!("No video stream in {path:?}"))?;
        let stream_index = stream.index();

        let fps = [stream.avg_frame_rate(), stream.rate()]
            .into_iter()
            .map(f64::from)
            .find(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(0.0);

        let total_frames = match stream.frames() {
            n if n > 0 => Some(n as u64),
            _ => {
                let duration_sec = if stream.duration() > 0 {
                    stream.duration() as f64 * f64::from(stream.time_base())
                } else {
                    ictx.duration() as f64 / AV_TIME_BASE
                };
                (duration_sec > 0.0 && fps > 0.0).then(|| (duration_sec * fps).round() as u64)
            }
        };

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context_decoder.decoder().video()?;

        let scaler = Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )?;

        log::info!(
            "Opened {path:?}: {}x{} @ {fps:.3} fps, {total_frames:?} frames",
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            stream_index,
            fps,
            total_frames,
            eof_sent: false,
            done: false,
        })
    }

    pub fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub fn height(&self) -> u32 {
        self.decoder.height()
    }

    fn next_frame(&mut self) -> anyhow::Result<Option<RgbImage>> {
        let mut decoded = Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                return self.convert_frame(&decoded).map(Some);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let packet = self
                .ictx
                .packets()
                .next()
                .map(|(stream, packet)| (stream.index(), packet));
            match packet {
                Some((index, packet)) if index == self.stream_index => {
                    self.decoder.send_packet(&packet)?;
                }
                Some(_) => {}
                None => {
                    // flush the frames still buffered in the decoder
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn convert_frame(&mut self, decoded: &Video) -> anyhow::Result<RgbImage> {
        let mut rgb_frame = Video::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;

        let (width, height) = (rgb_frame.width(), rgb_frame.height());
        let row_len = width as usize * 3;
        let stride = rgb_frame.stride(0);
        let mut buf = Vec::with_capacity(row_len * height as usize);
        for row in rgb_frame.data(0).chunks(stride).take(height as usize) {
            buf.extend_from_slice(&row[..row_len]);
        }
        RgbImage::from_raw(width, height, buf).context("Decoded frame has unexpected size")
    }
}

impl Iterator for FfmpegSource {
    type Item = anyhow::Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }
}
