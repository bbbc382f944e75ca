//! # Video Module
//!
//! Frame types shared by every stage and the headless frame sources.

pub mod source;
pub mod types;

pub use source::{drive_source, FrameSource, ImageSequenceSource, RawFrame, TestPatternSource};
pub use types::{Frame, FrameSize, PreviewRect, Rotation};
