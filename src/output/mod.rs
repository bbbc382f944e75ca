//! Encoders and media library used by the recording controller.

pub mod ffmpeg;
pub mod image_sequence;
pub mod library;
mod writer;

use std::sync::Arc;

pub use ffmpeg::{FfmpegEncoder, FfmpegEncoderFactory};
pub use image_sequence::{ImageSequenceEncoder, ImageSequenceEncoderFactory};
pub use library::DirectoryLibrary;

use crate::config::{EncoderKind, RecordingConfig};
use crate::pipeline::sinks::EncoderFactory;

/// Encoder factory for the configured backend
pub fn encoder_factory(config: &RecordingConfig) -> Arc<dyn EncoderFactory> {
    match config.encoder {
        EncoderKind::Ffmpeg => Arc::new(FfmpegEncoderFactory::from_config(config)),
        EncoderKind::ImageSequence => Arc::new(ImageSequenceEncoderFactory::from_config(config)),
    }
}
