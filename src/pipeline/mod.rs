//! # Frame Pipeline
//!
//! Source frames go through the transform on a dedicated serial thread and are
//! forked to a best-effort preview and, while a recording session is live, to
//! the encoder.
//!
//! ```text
//! source -> CaptureInput -> [frame timeline: transform -> FrameRouter] -> PreviewSink
//!                                                                 \-> RecordingController -> EncoderSink -> MediaLibrary
//! ```
//!
//! Start and stop requests come from a separate control timeline and meet the
//! frame timeline only at the [`RecordingController`]'s lock.

pub mod preview;
pub mod processor;
pub mod recording;
pub mod router;
pub mod sinks;

pub use preview::{PreviewMailbox, PreviewRenderer};
pub use processor::{CaptureInput, FrameEvent, FramePipeline, PipelineStats, StatsSnapshot};
pub use recording::{
    Delivery, FinalizeHandle, RecorderSettings, RecordingController, RecordingPhase,
    SessionOutcome, SessionStats, StartOutcome,
};
pub use router::{FrameRouter, RouteReport};
pub use sinks::{
    EncoderFactory, EncoderSink, FinalizeCallback, FinalizeStatus, MediaLibrary, PreviewSink,
    RecordedOutput,
};
