use image::{ImageBuffer, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A single timestamped video frame
///
/// The pixel buffer is immutable once a frame exists. Cloning a frame is cheap:
/// copies handed to the preview and recording paths share the same buffer, and
/// a transform that changes pixels produces a new frame via [`Frame::with_image`].
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: Arc<RgbImage>,
    pts: Duration,
    duration: Duration,
}

impl Frame {
    /// Create a frame from an RGB image buffer and its timing
    pub fn new(buffer: RgbImage, pts: Duration, duration: Duration) -> Self {
        Self {
            buffer: Arc::new(buffer),
            pts,
            duration,
        }
    }

    /// Create a frame with the given dimensions filled with the specified color
    pub fn new_filled(size: FrameSize, color: [u8; 3], pts: Duration, duration: Duration) -> Self {
        let buffer = ImageBuffer::from_pixel(size.width, size.height, Rgb(color));
        Self::new(buffer, pts, duration)
    }

    /// Create a frame from packed RGB24 bytes
    pub fn from_rgb_bytes(
        size: FrameSize,
        data: Vec<u8>,
        pts: Duration,
        duration: Duration,
    ) -> Option<Self> {
        ImageBuffer::from_raw(size.width, size.height, data)
            .map(|buffer| Self::new(buffer, pts, duration))
    }

    /// Replace the pixels, keeping this frame's timing
    pub fn with_image(&self, buffer: RgbImage) -> Self {
        Self::new(buffer, self.pts, self.duration)
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width(), self.height())
    }

    /// A frame with no pixels cannot be filtered or encoded
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Presentation timestamp
    pub fn pts(&self) -> Duration {
        self.pts
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Packed RGB24 bytes, row-major
    pub fn as_rgb_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Save the frame as a PNG file
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), image::ImageError> {
        self.buffer.save(path)
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Size after a quarter-turn rotation
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Number of bytes in a packed RGB24 frame of this size
    pub fn rgb_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Target rectangle on the preview surface, in surface pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PreviewRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }
}

/// Rotation applied to sensor-oriented frames before filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Rotate180,
    CounterClockwise90,
}

impl Rotation {
    /// Output size for an input of the given size
    pub fn apply_to_size(&self, size: FrameSize) -> FrameSize {
        match self {
            Rotation::None | Rotation::Rotate180 => size,
            Rotation::Clockwise90 | Rotation::CounterClockwise90 => size.transposed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_pixels() {
        let frame = Frame::new_filled(
            FrameSize::new(4, 2),
            [10, 20, 30],
            Duration::from_millis(40),
            Duration::from_millis(33),
        );
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.as_image(), copy.as_image()));
        assert_eq!(copy.pts(), Duration::from_millis(40));
        assert_eq!(copy.get_pixel(3, 1), [10, 20, 30]);
    }

    #[test]
    fn test_from_rgb_bytes_rejects_short_buffer() {
        let size = FrameSize::new(2, 2);
        assert!(Frame::from_rgb_bytes(size, vec![0; 5], Duration::ZERO, Duration::ZERO).is_none());
        assert!(Frame::from_rgb_bytes(size, vec![0; size.rgb_len()], Duration::ZERO, Duration::ZERO).is_some());
    }

    #[test]
    fn test_rotation_sizes() {
        let size = FrameSize::new(1920, 1080);
        assert_eq!(Rotation::Clockwise90.apply_to_size(size), FrameSize::new(1080, 1920));
        assert_eq!(Rotation::Rotate180.apply_to_size(size), size);
        assert_eq!(size.to_string(), "1920x1080");
    }
}
