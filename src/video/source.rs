//! Headless frame sources standing in for the capture device.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use image::{Rgb, RgbImage};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::{
    error::{CameraError, CaptureError, Result},
    pipeline::processor::CaptureInput,
    video::types::FrameSize,
};

/// A raw, sensor-oriented frame as delivered by a capture device
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub image: RgbImage,
    pub pts: Duration,
    pub duration: Duration,
}

/// Produces timestamped raw frames
pub trait FrameSource: Send {
    /// The next frame, an error for a frame that could not be produced, or
    /// `None` when the source is exhausted
    fn next_frame(&mut self) -> Option<Result<RawFrame>>;

    fn frame_duration(&self) -> Duration;
}

/// Synthetic camera: a slowly cycling hue with a moving bar
pub struct TestPatternSource {
    size: FrameSize,
    frame_duration: Duration,
    limit: Option<u64>,
    index: u64,
    rng: Option<(SmallRng, u8)>,
}

impl TestPatternSource {
    pub fn new(size: FrameSize, frame_duration: Duration) -> Self {
        Self {
            size,
            frame_duration,
            limit: None,
            index: 0,
            rng: None,
        }
    }

    /// Stop after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Add per-pixel sensor noise of up to `amount` levels
    pub fn with_noise(mut self, seed: u64, amount: u8) -> Self {
        self.rng = Some((SmallRng::seed_from_u64(seed), amount));
        self
    }

    fn render(&mut self, index: u64) -> RgbImage {
        let FrameSize { width, height } = self.size;
        let hue = (index as f32 * 3.0) % 360.0;
        let background = hsv_to_rgb(hue, 0.7, 0.9);

        let bar_width = (width / 16).max(1);
        let bar_x = ((index as u32).wrapping_mul(bar_width / 2 + 1)) % width.max(1);

        let mut image = RgbImage::from_pixel(width, height, Rgb(background));
        for y in 0..height {
            for x in bar_x..(bar_x + bar_width).min(width) {
                image.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }

        if let Some((rng, amount)) = self.rng.as_mut() {
            let amount = *amount as i16;
            if amount > 0 {
                for value in image.iter_mut() {
                    let noise = rng.gen_range(-amount..=amount);
                    *value = (*value as i16 + noise).clamp(0, 255) as u8;
                }
            }
        }

        image
    }
}

impl FrameSource for TestPatternSource {
    fn next_frame(&mut self) -> Option<Result<RawFrame>> {
        if self.limit.is_some_and(|limit| self.index >= limit) {
            return None;
        }

        let index = self.index;
        self.index += 1;

        Some(Ok(RawFrame {
            image: self.render(index),
            pts: self.frame_duration * index as u32,
            duration: self.frame_duration,
        }))
    }

    fn frame_duration(&self) -> Duration {
        self.frame_duration
    }
}

/// Replays a directory of still images as camera frames, in file name order
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    frame_duration: Duration,
    looped: bool,
    index: u64,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(directory: P, frame_duration: Duration) -> Result<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(CaptureError::OpenFailed {
                path: directory.display().to_string(),
            }
            .into());
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && !is_hidden_file(&path) && is_image_file(&path) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(CaptureError::NoFrames {
                path: directory.display().to_string(),
            }
            .into());
        }

        paths.sort();
        info!("Loaded {} frames from {}", paths.len(), directory.display());

        Ok(Self {
            paths,
            frame_duration,
            looped: false,
            index: 0,
        })
    }

    /// Start over from the first image when the directory runs out
    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Option<Result<RawFrame>> {
        let count = self.paths.len() as u64;
        if !self.looped && self.index >= count {
            return None;
        }

        let index = self.index;
        self.index += 1;
        let path = &self.paths[(index % count) as usize];

        let result = image::open(path)
            .map(|image| RawFrame {
                image: image.to_rgb8(),
                pts: self.frame_duration * index as u32,
                duration: self.frame_duration,
            })
            .map_err(|e| {
                CameraError::from(CaptureError::DecodeFailed {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            });

        Some(result)
    }

    fn frame_duration(&self) -> Duration {
        self.frame_duration
    }
}

/// Feed a source into the pipeline until it runs out, `max_frames` is reached
/// or `stop` is set
///
/// With `paced` set, frames are handed over no faster than their presentation
/// times, like a live camera. Frames the source fails to produce are reported
/// as dropped. Returns the number of frames handed over.
pub fn drive_source(
    source: &mut dyn FrameSource,
    input: &CaptureInput,
    max_frames: Option<u64>,
    paced: bool,
    stop: &AtomicBool,
) -> Result<u64> {
    let started = Instant::now();
    let mut delivered = 0u64;
    let mut first_pts = None;

    while max_frames.map_or(true, |max| delivered < max) && !stop.load(Ordering::Relaxed) {
        let raw = match source.next_frame() {
            None => break,
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                warn!("Source failed to produce a frame: {}", e);
                let pts = source.frame_duration() * delivered as u32;
                input.on_frame_dropped(pts)?;
                delivered += 1;
                continue;
            }
        };

        if paced {
            let origin = *first_pts.get_or_insert(raw.pts);
            let due = started + raw.pts.saturating_sub(origin);
            if let Some(wait) = due.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }

        input.on_frame(raw.image, raw.pts, raw.duration)?;
        delivered += 1;
    }

    debug!("Source finished after {} frames", delivered);
    Ok(delivered)
}

fn is_image_file(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png"),
        None => false,
    }
}

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    [
        ((r + m) * 255.0) as u8,
        ((g + m) * 255.0) as u8,
        ((b + m) * 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const FRAME: Duration = Duration::from_millis(40);

    #[test]
    fn test_pattern_timestamps_and_limit() {
        let mut source = TestPatternSource::new(FrameSize::new(32, 16), FRAME).with_limit(3);

        let pts: Vec<_> = std::iter::from_fn(|| source.next_frame())
            .map(|frame| frame.unwrap().pts)
            .collect();
        assert_eq!(pts, vec![Duration::ZERO, FRAME, FRAME * 2]);
    }

    #[test]
    fn test_pattern_noise_is_seeded() {
        let size = FrameSize::new(8, 8);
        let mut a = TestPatternSource::new(size, FRAME).with_noise(7, 20);
        let mut b = TestPatternSource::new(size, FRAME).with_noise(7, 20);

        let frame_a = a.next_frame().unwrap().unwrap();
        let frame_b = b.next_frame().unwrap().unwrap();
        assert_eq!(frame_a.image, frame_b.image);
        assert_eq!(frame_a.image.dimensions(), (8, 8));
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), [255, 0, 0]);
        assert_eq!(hsv_to_rgb(120.0, 1.0, 1.0), [0, 255, 0]);
        assert_eq!(hsv_to_rgb(240.0, 1.0, 1.0), [0, 0, 255]);
    }

    #[test]
    fn test_image_sequence_sorted_by_name() {
        let dir = tempdir().unwrap();
        for (name, shade) in [("b.png", 20u8), ("a.png", 10), ("c.jpg", 30)] {
            RgbImage::from_pixel(4, 4, Rgb([shade, shade, shade]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();
        std::fs::write(dir.path().join(".hidden.png"), b"skip me").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), FRAME).unwrap();
        assert_eq!(source.len(), 3);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.image.get_pixel(0, 0).0, [10, 10, 10]);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.pts, FRAME);
        assert!(source.next_frame().unwrap().is_ok());
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_image_sequence_loops() {
        let dir = tempdir().unwrap();
        RgbImage::new(2, 2).save(dir.path().join("only.png")).unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), FRAME).unwrap().looped();
        for _ in 0..5 {
            assert!(source.next_frame().unwrap().is_ok());
        }
    }

    #[test]
    fn test_image_sequence_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), FRAME),
            Err(CameraError::Capture(CaptureError::NoFrames { .. }))
        ));
        assert!(matches!(
            ImageSequenceSource::open(dir.path().join("missing"), FRAME),
            Err(CameraError::Capture(CaptureError::OpenFailed { .. }))
        ));

        std::fs::write(dir.path().join("broken.png"), b"not an image").unwrap();
        let mut source = ImageSequenceSource::open(dir.path(), FRAME).unwrap();
        assert!(matches!(
            source.next_frame(),
            Some(Err(CameraError::Capture(CaptureError::DecodeFailed { .. })))
        ));
    }
}
