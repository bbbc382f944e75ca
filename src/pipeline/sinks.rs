//! Collaborator interfaces at the edges of the pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    error::{RecordingError, Result},
    video::types::{Frame, FrameSize},
};

/// Consumer of the most recent transformed frame
pub trait PreviewSink: Send + Sync {
    /// Hand a frame to the preview surface
    ///
    /// Never blocks. Returns `false` when the sink was busy and the frame was
    /// discarded; the frame is never queued for later.
    fn present(&self, frame: Frame) -> bool;
}

/// A finished recording on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutput {
    /// File (or directory, for image sequences) holding the recording
    pub path: PathBuf,

    /// Frames written
    pub frames: u64,

    /// Presentation time covered, from the session origin to the end of the last frame
    pub duration: Duration,
}

/// How an encoder finalize ended; every variant is terminal
#[derive(Debug)]
pub enum FinalizeStatus {
    Completed(RecordedOutput),
    Cancelled,
    Failed(RecordingError),
}

impl FinalizeStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, FinalizeStatus::Completed(_))
    }

    pub fn output(&self) -> Option<&RecordedOutput> {
        match self {
            FinalizeStatus::Completed(output) => Some(output),
            _ => None,
        }
    }
}

/// Invoked exactly once with the finalize outcome, from any thread
pub type FinalizeCallback = Box<dyn FnOnce(FinalizeStatus) + Send + 'static>;

/// Persists frames of one recording session
///
/// Frames arrive in strictly increasing presentation-time order. All methods
/// except `finalize` are called from the frame timeline.
pub trait EncoderSink: Send {
    /// Whether `append` would accept another frame right now
    fn is_ready_for_more_data(&self) -> bool;

    /// Time origin of the session; called once, before the first append
    fn begin_session(&mut self, at: Duration);

    fn append(&mut self, frame: Frame) -> Result<()>;

    /// Flush and close the output
    ///
    /// May return before the work is done; `on_complete` reports the outcome.
    fn finalize(self: Box<Self>, on_complete: FinalizeCallback);
}

/// Creates an encoder bound to a fresh output destination
pub trait EncoderFactory: Send + Sync {
    /// File extension for destinations this factory writes
    fn extension(&self) -> &str;

    fn create(&self, destination: &Path, size: FrameSize) -> Result<Box<dyn EncoderSink>>;
}

/// Long-term home for completed recordings (the device photo library)
pub trait MediaLibrary: Send + Sync {
    /// Take ownership of a completed recording, returning where it now lives
    fn save(&self, output: &RecordedOutput) -> Result<PathBuf>;
}
