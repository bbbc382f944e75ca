//! # Effects Camera
//!
//! A real-time camera effects pipeline: raw frames from a capture source are
//! run through a photographic filter, shown on a best-effort preview and, while
//! recording, encoded to a video file that is handed to a media library.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//! use effects_camera::{
//!     config::Config,
//!     filters::{FilterChain, FilterRegistry},
//!     output::{encoder_factory, DirectoryLibrary},
//!     pipeline::{FramePipeline, PreviewMailbox, RecorderSettings, RecordingController},
//!     video::{drive_source, TestPatternSource},
//! };
//!
//! # fn main() -> effects_camera::Result<()> {
//! let config = Config::default();
//! let chain = FilterChain::from_config(&FilterRegistry::new(), &config)?;
//!
//! let recorder = RecordingController::new(
//!     RecorderSettings::from_config(&config.recording, config.pipeline.output_size),
//!     encoder_factory(&config.recording),
//!     Some(Arc::new(DirectoryLibrary::new("recordings"))),
//! );
//! let preview = Arc::new(PreviewMailbox::new());
//! let (pipeline, input) =
//!     FramePipeline::spawn(Arc::new(chain), preview, recorder.clone(), config.capture.queue_depth)?;
//!
//! recorder.start_recording()?;
//! let mut source = TestPatternSource::new(config.capture.size, config.capture.frame_duration())
//!     .with_limit(90);
//! drive_source(&mut source, &input, None, true, &AtomicBool::new(false))?;
//! if let Some(handle) = recorder.stop_recording() {
//!     println!("{:?}", handle.wait().status);
//! }
//!
//! drop(input);
//! pipeline.join();
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frame types and headless frame sources
//! - [`filters`] - Photographic filters and the per-frame transform chain
//! - [`pipeline`] - The frame timeline, preview path and recording state machine
//! - [`output`] - Encoders and the media library
//! - [`config`] - Configuration management
//!
//! ## Creating Custom Filters
//!
//! Implement [`Filter`](filters::Filter) and register it by name:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use effects_camera::filters::{Filter, FilterConfig, FilterRegistry};
//! use effects_camera::video::types::Frame;
//!
//! struct Darken;
//!
//! impl Filter for Darken {
//!     fn name(&self) -> &str {
//!         "darken"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Halves brightness at full intensity"
//!     }
//!
//!     fn apply(&self, frame: &Frame, config: &FilterConfig) -> effects_camera::Result<Option<Frame>> {
//!         let mut image = frame.as_image().clone();
//!         let keep = 1.0 - 0.5 * config.intensity;
//!         image.iter_mut().for_each(|v| *v = (*v as f32 * keep) as u8);
//!         Ok(Some(frame.with_image(image)))
//!     }
//! }
//!
//! let mut registry = FilterRegistry::new();
//! registry.register("darken", || Arc::new(Darken) as Arc<dyn Filter>);
//! ```

pub mod config;
pub mod error;
pub mod filters;
pub mod output;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{CameraError, Result},
    filters::{Filter, FilterChain, FilterRegistry, FrameTransform},
    pipeline::{FramePipeline, PreviewMailbox, RecordingController, RecordingPhase},
    video::types::{Frame, FrameSize},
};
