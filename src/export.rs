//! Turning captured frames into files: a single PNG, or a fixed-cadence
//! recording encoded as an animated GIF.

use std::time::{Duration, SystemTime};

use anyhow::{bail, Context};
use image::{
    codecs::{
        gif::{GifEncoder, Repeat},
        png::PngEncoder,
    },
    ColorType, Delay, Frame, ImageEncoder, RgbaImage,
};
use log::{debug, info};

use crate::{
    capture::RasterImage,
    error::{Error, Result},
};

/// Share of the overall progress spent capturing; encoding takes the rest.
const CAPTURE_PROGRESS_SHARE: f32 = 0.5;

/// Anything that can step its animation and hand back the current frame.
pub trait FrameSource {
    fn advance(&mut self, delta: Duration);
    fn capture_frame(&mut self) -> Result<RasterImage>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    pub image: RasterImage,
    pub delay_ms: u32,
}

/// Collects frames every `1000 / fps` ms of animation time until the
/// requested duration is covered.
#[derive(Debug)]
pub struct Recorder {
    frame_delay: Duration,
    total_frames: usize,
    since_capture: Duration,
    frames: Vec<CapturedFrame>,
}

impl Recorder {
    pub fn new(duration: Duration, fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(Error::InvalidInput("recording fps must be > 0".to_string()));
        }
        let total_frames = (duration.as_secs_f64() * f64::from(fps)).round() as usize;
        if total_frames == 0 {
            return Err(Error::InvalidInput(format!(
                "recording of {:?} at {} fps holds no frames",
                duration, fps
            )));
        }

        Ok(Self {
            frame_delay: Duration::from_secs(1) / fps,
            total_frames,
            since_capture: Duration::ZERO,
            frames: Vec::with_capacity(total_frames),
        })
    }

    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn is_complete(&self) -> bool {
        self.frames.len() >= self.total_frames
    }

    /// Capture progress in `[0, 0.5]`.
    pub fn progress(&self) -> f32 {
        self.frames.len() as f32 / self.total_frames as f32 * CAPTURE_PROGRESS_SHARE
    }

    /// Called from a running loop after the source has already advanced by
    /// `delta`. Captures at most one frame per call.
    pub fn on_tick(&mut self, delta: Duration, source: &mut impl FrameSource) -> Result<f32> {
        if self.is_complete() {
            return Ok(self.progress());
        }

        self.since_capture += delta;
        if self.since_capture >= self.frame_delay {
            let image = source.capture_frame()?;
            self.frames.push(CapturedFrame {
                image,
                delay_ms: self.frame_delay.as_millis() as u32,
            });
            // Carry the overshoot so the average spacing matches `delay_ms`.
            self.since_capture -= self.frame_delay;
            debug!("Captured frame {}/{}", self.frames.len(), self.total_frames);
        }

        Ok(self.progress())
    }

    /// Drives `source` itself, one frame delay per capture.
    pub fn record(
        mut self,
        source: &mut impl FrameSource,
        mut on_progress: impl FnMut(f32),
    ) -> Result<Vec<CapturedFrame>> {
        while !self.is_complete() {
            source.advance(self.frame_delay);
            let progress = self.on_tick(self.frame_delay, source)?;
            on_progress(progress);
        }
        Ok(self.into_frames())
    }

    pub fn into_frames(self) -> Vec<CapturedFrame> {
        self.frames
    }
}

/// Packs a frame sequence into one encoded blob.
pub trait FrameSequenceEncoder {
    /// `on_progress` receives values in `(0.5, 1]`, following the capture
    /// share.
    fn encode(
        &mut self,
        frames: &[CapturedFrame],
        on_progress: &mut dyn FnMut(f32),
    ) -> anyhow::Result<Vec<u8>>;
}

/// Looping animated GIF.
#[derive(Debug, Clone, Copy)]
pub struct GifSequenceEncoder {
    /// 1 is slowest and best, 30 fastest.
    pub speed: i32,
}

impl Default for GifSequenceEncoder {
    fn default() -> Self {
        Self { speed: 10 }
    }
}

impl FrameSequenceEncoder for GifSequenceEncoder {
    fn encode(
        &mut self,
        frames: &[CapturedFrame],
        on_progress: &mut dyn FnMut(f32),
    ) -> anyhow::Result<Vec<u8>> {
        if frames.is_empty() {
            bail!("no frames to encode");
        }

        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, self.speed);
            encoder
                .set_repeat(Repeat::Infinite)
                .context("failed to set GIF repeat")?;

            for (i, captured) in frames.iter().enumerate() {
                let buffer = rgba_image(&captured.image)?;
                let delay = Delay::from_numer_denom_ms(captured.delay_ms, 1);
                encoder
                    .encode_frame(Frame::from_parts(buffer, 0, 0, delay))
                    .with_context(|| format!("failed to encode GIF frame {}", i))?;

                let encoded = (i + 1) as f32 / frames.len() as f32;
                on_progress(CAPTURE_PROGRESS_SHARE + encoded * (1. - CAPTURE_PROGRESS_SHARE));
            }
        }

        info!("Encoded {} frames into {} GIF bytes", frames.len(), bytes.len());
        Ok(bytes)
    }
}

pub fn encode_png(image: &RasterImage) -> anyhow::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(&image.pixels, image.width, image.height, ColorType::Rgba8)
        .context("failed to encode PNG")?;
    Ok(bytes)
}

/// `stardust-<unix-millis>.<extension>`
pub fn timestamped_file_name(extension: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("stardust-{}.{}", millis, extension)
}

fn rgba_image(image: &RasterImage) -> anyhow::Result<RgbaImage> {
    RgbaImage::from_raw(image.width, image.height, image.pixels.clone()).with_context(|| {
        format!(
            "{} bytes do not form a {}x{} RGBA frame",
            image.pixels.len(),
            image.width,
            image.height
        )
    })
}

#[cfg(test)]
mod tests {
    use image::{codecs::gif::GifDecoder, AnimationDecoder};

    use super::*;

    /// Fills every pixel with the number of advances seen so far.
    #[derive(Default)]
    struct CountingSource {
        advances: u32,
        elapsed: Duration,
        captures: u32,
    }

    impl FrameSource for CountingSource {
        fn advance(&mut self, delta: Duration) {
            self.advances += 1;
            self.elapsed += delta;
        }

        fn capture_frame(&mut self) -> Result<RasterImage> {
            self.captures += 1;
            let value = self.advances as u8;
            Ok(RasterImage {
                pixels: vec![value, value, value, 255].repeat(4),
                width: 2,
                height: 2,
            })
        }
    }

    struct FailingSource;

    impl FrameSource for FailingSource {
        fn advance(&mut self, _delta: Duration) {}

        fn capture_frame(&mut self) -> Result<RasterImage> {
            Err(Error::Capture("surface gone".to_string()))
        }
    }

    #[test]
    fn default_recording_has_sixty_frames_at_fifty_ms() {
        let recorder = Recorder::new(Duration::from_millis(3000), 20).unwrap();
        assert_eq!(recorder.total_frames(), 60);
        assert_eq!(recorder.frame_delay(), Duration::from_millis(50));
    }

    #[test]
    fn rejects_empty_recordings() {
        assert!(matches!(
            Recorder::new(Duration::from_secs(1), 0),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            Recorder::new(Duration::ZERO, 20),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn record_covers_the_duration_and_reports_capture_progress() {
        let mut source = CountingSource::default();
        let mut reported = Vec::new();

        let frames = Recorder::new(Duration::from_millis(500), 20)
            .unwrap()
            .record(&mut source, |p| reported.push(p))
            .unwrap();

        assert_eq!(frames.len(), 10);
        assert!(frames.iter().all(|f| f.delay_ms == 50));
        assert_eq!(source.elapsed, Duration::from_millis(500));
        assert!(reported.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(reported.last().copied(), Some(0.5));
        // Each frame sees a later animation time than the previous one.
        assert_eq!(frames[0].image.pixels[0], 1);
        assert_eq!(frames[9].image.pixels[0], 10);
    }

    #[test]
    fn on_tick_follows_the_frame_cadence() {
        let mut source = CountingSource::default();
        let mut recorder = Recorder::new(Duration::from_millis(200), 20).unwrap();

        // 16 ms ticks first reach the 50 ms delay on the fourth tick.
        for _ in 0..3 {
            recorder.on_tick(Duration::from_millis(16), &mut source).unwrap();
        }
        assert_eq!(source.captures, 0);
        recorder.on_tick(Duration::from_millis(16), &mut source).unwrap();
        assert_eq!(source.captures, 1);

        // 14 ms carried over, so three more ticks reach the next frame.
        for _ in 0..2 {
            recorder.on_tick(Duration::from_millis(16), &mut source).unwrap();
        }
        assert_eq!(source.captures, 1);
        recorder.on_tick(Duration::from_millis(16), &mut source).unwrap();
        assert_eq!(source.captures, 2);

        while !recorder.is_complete() {
            recorder.on_tick(Duration::from_millis(16), &mut source).unwrap();
        }
        assert_eq!(source.captures, 4);

        recorder.on_tick(Duration::from_millis(100), &mut source).unwrap();
        assert_eq!(source.captures, 4);
    }

    #[test]
    fn capture_errors_reach_the_caller() {
        let mut recorder = Recorder::new(Duration::from_millis(100), 20).unwrap();
        let result = recorder.on_tick(Duration::from_millis(50), &mut FailingSource);
        assert!(matches!(result, Err(Error::Capture(_))));
        assert!(!recorder.is_complete());
    }

    #[test]
    fn gif_encoder_writes_every_frame() {
        let mut source = CountingSource::default();
        let frames = Recorder::new(Duration::from_millis(150), 20)
            .unwrap()
            .record(&mut source, |_| {})
            .unwrap();

        let mut reported = Vec::new();
        let bytes = GifSequenceEncoder::default()
            .encode(&frames, &mut |p| reported.push(p))
            .unwrap();

        assert!(bytes.starts_with(b"GIF89a"));
        assert!(reported.iter().all(|&p| p > 0.5 && p <= 1.0));
        assert_eq!(reported.last().copied(), Some(1.0));

        let decoded = GifDecoder::new(bytes.as_slice())
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].delay().numer_denom_ms(), (50, 1));
    }

    #[test]
    fn gif_encoder_rejects_an_empty_sequence() {
        assert!(GifSequenceEncoder::default().encode(&[], &mut |_| {}).is_err());
    }

    #[test]
    fn gif_encoder_rejects_mismatched_pixels() {
        let frame = CapturedFrame {
            image: RasterImage {
                pixels: vec![0; 3],
                width: 2,
                height: 2,
            },
            delay_ms: 50,
        };
        assert!(GifSequenceEncoder::default()
            .encode(&[frame], &mut |_| {})
            .is_err());
    }

    #[test]
    fn png_round_trips_dimensions() {
        let image = RasterImage {
            pixels: vec![255, 0, 0, 255].repeat(6),
            width: 3,
            height: 2,
        };
        let bytes = encode_png(&image).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.into_raw(), image.pixels);
    }

    #[test]
    fn file_names_carry_the_extension() {
        let name = timestamped_file_name("png");
        assert!(name.starts_with("stardust-"));
        assert!(name.ends_with(".png"));
    }
}
