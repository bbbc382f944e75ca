use std::sync::Arc;

use tracing::trace;

use crate::{
    pipeline::recording::{Delivery, RecordingController},
    pipeline::sinks::PreviewSink,
    video::types::Frame,
};

/// Where one transformed frame went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteReport {
    pub previewed: bool,
    pub recording: Delivery,
}

/// Forks transformed frames to the preview and the recording controller
///
/// The two paths do not wait on each other: the preview sink never blocks, and
/// the controller only holds its lock for one append.
pub struct FrameRouter {
    preview: Arc<dyn PreviewSink>,
    recorder: RecordingController,
}

impl FrameRouter {
    pub fn new(preview: Arc<dyn PreviewSink>, recorder: RecordingController) -> Self {
        Self { preview, recorder }
    }

    pub fn route(&self, frame: Frame) -> RouteReport {
        let recording = self.recorder.deliver(&frame);
        let pts = frame.pts();
        let previewed = self.preview.present(frame);

        if !previewed {
            trace!("Preview busy, skipped frame at {:?}", pts);
        }

        RouteReport { previewed, recording }
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }
}
