// src/pipeline/processor.rs - the serial frame timeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbImage;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::{
    error::{CaptureError, Result},
    filters::FrameTransform,
    pipeline::recording::{Delivery, RecordingController},
    pipeline::router::FrameRouter,
    pipeline::sinks::PreviewSink,
    video::types::Frame,
};

/// Event from the frame source
#[derive(Debug)]
pub enum FrameEvent {
    Frame(Frame),
    /// The source lost a frame before handing it over
    Dropped { pts: Duration },
}

/// Pipeline counters, updated from the capture side and the frame timeline
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    dropped_at_source: AtomicU64,
    dropped_queue_full: AtomicU64,
    no_output: AtomicU64,
    previewed: AtomicU64,
    preview_skipped: AtomicU64,
    recorded: AtomicU64,
    record_dropped: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub received: u64,
    pub dropped_at_source: u64,
    pub dropped_queue_full: u64,
    pub no_output: u64,
    pub previewed: u64,
    pub preview_skipped: u64,
    pub recorded: u64,
    pub record_dropped: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped_at_source: self.dropped_at_source.load(Ordering::Relaxed),
            dropped_queue_full: self.dropped_queue_full.load(Ordering::Relaxed),
            no_output: self.no_output.load(Ordering::Relaxed),
            previewed: self.previewed.load(Ordering::Relaxed),
            preview_skipped: self.preview_skipped.load(Ordering::Relaxed),
            recorded: self.recorded.load(Ordering::Relaxed),
            record_dropped: self.record_dropped.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Capture-side entry points into the pipeline
///
/// Handed to the frame source. Never blocks: when the frame timeline is behind,
/// the frame is dropped and counted.
#[derive(Clone)]
pub struct CaptureInput {
    tx: mpsc::Sender<FrameEvent>,
    stats: Arc<PipelineStats>,
}

impl CaptureInput {
    /// A new raw frame from the capture device
    pub fn on_frame(&self, buffer: RgbImage, pts: Duration, duration: Duration) -> Result<()> {
        self.submit(Frame::new(buffer, pts, duration))
    }

    /// The capture device dropped a frame
    pub fn on_frame_dropped(&self, pts: Duration) -> Result<()> {
        match self.tx.try_send(FrameEvent::Dropped { pts }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                PipelineStats::bump(&self.stats.dropped_at_source);
                debug!("Dropped frame: {:.3}s", pts.as_secs_f64());
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(CaptureError::PipelineClosed.into()),
        }
    }

    pub fn submit(&self, frame: Frame) -> Result<()> {
        match self.tx.try_send(FrameEvent::Frame(frame)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                PipelineStats::bump(&self.stats.dropped_queue_full);
                if let FrameEvent::Frame(frame) = event {
                    debug!("Frame timeline busy, dropped frame at {:.3}s", frame.pts().as_secs_f64());
                }
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(CaptureError::PipelineClosed.into()),
        }
    }
}

/// The serial frame timeline
///
/// One thread receives frame events in order and runs transform and routing
/// for each before taking the next, so frames never overlap or reorder.
pub struct FramePipeline {
    worker: JoinHandle<()>,
    recorder: RecordingController,
    stats: Arc<PipelineStats>,
}

impl FramePipeline {
    /// Start the frame timeline
    ///
    /// Returns the pipeline and the capture input for the frame source. The
    /// timeline runs until every clone of the capture input is dropped.
    pub fn spawn(
        transform: Arc<dyn FrameTransform>,
        preview: Arc<dyn PreviewSink>,
        recorder: RecordingController,
        queue_depth: usize,
    ) -> Result<(Self, CaptureInput)> {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let stats = Arc::new(PipelineStats::default());
        let router = FrameRouter::new(preview, recorder.clone());

        let worker_stats = Arc::clone(&stats);
        let worker = std::thread::Builder::new()
            .name("frame-timeline".to_string())
            .spawn(move || run_timeline(rx, transform, router, worker_stats))?;

        info!("Frame timeline started (queue depth {})", queue_depth.max(1));

        let capture = CaptureInput {
            tx,
            stats: Arc::clone(&stats),
        };
        Ok((Self { worker, recorder, stats }, capture))
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Wait for the timeline to drain and exit
    ///
    /// Blocks; call after dropping every [`CaptureInput`]. A panic on the
    /// timeline (a frame-size precondition violation) is re-raised here.
    pub fn join(self) -> StatsSnapshot {
        if let Err(panic) = self.worker.join() {
            std::panic::resume_unwind(panic);
        }
        self.stats.snapshot()
    }
}

fn run_timeline(
    mut rx: mpsc::Receiver<FrameEvent>,
    transform: Arc<dyn FrameTransform>,
    router: FrameRouter,
    stats: Arc<PipelineStats>,
) {
    while let Some(event) = rx.blocking_recv() {
        match event {
            FrameEvent::Dropped { pts } => {
                PipelineStats::bump(&stats.dropped_at_source);
                debug!("Dropped frame: {:.3}s", pts.as_secs_f64());
            }
            FrameEvent::Frame(frame) => {
                PipelineStats::bump(&stats.received);

                let Some(output) = transform.transform(frame) else {
                    PipelineStats::bump(&stats.no_output);
                    continue;
                };

                let report = router.route(output);
                if report.previewed {
                    PipelineStats::bump(&stats.previewed);
                } else {
                    PipelineStats::bump(&stats.preview_skipped);
                }
                match report.recording {
                    Delivery::NotRecording => {}
                    Delivery::Appended => PipelineStats::bump(&stats.recorded),
                    Delivery::NotReady | Delivery::OutOfOrder | Delivery::AppendFailed => {
                        PipelineStats::bump(&stats.record_dropped)
                    }
                }
            }
        }
    }

    if router.recorder().is_routing() {
        warn!("Frame source closed while recording; stopping session");
        // The outcome is still logged by the controller
        let _ = router.recorder().stop_recording();
    }

    info!("Frame timeline finished: {:?}", stats.snapshot());
}
