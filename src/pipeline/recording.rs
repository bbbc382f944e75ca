//! Recording session state machine.
//!
//! The controller is shared between the frame timeline, which calls
//! [`RecordingController::deliver`] for every transformed frame, and the control
//! timeline, which calls `start_recording` / `stop_recording`. The recording
//! state lives behind one mutex; every transition and every encoder append
//! happens while holding it, so when `stop_recording` has taken the session out
//! of the state no frame can reach that session again.
//!
//! Creating an encoder can take a while (a directory, a child process), so
//! `start_recording` reserves the session under the lock, opens the encoder
//! with the lock released, then installs it. The frame timeline keeps running
//! while the encoder opens.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::{
    config::RecordingConfig,
    error::{RecordingError, Result},
    pipeline::sinks::{
        EncoderFactory, EncoderSink, FinalizeCallback, FinalizeStatus, MediaLibrary,
    },
    video::types::{Frame, FrameSize},
};

/// Externally visible controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingPhase {
    Idle,
    /// Session created, waiting for its first frame
    Starting,
    Active,
    /// Detached from routing, encoder finalizing
    Stopping,
}

impl fmt::Display for RecordingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordingPhase::Idle => "idle",
            RecordingPhase::Starting => "starting",
            RecordingPhase::Active => "active",
            RecordingPhase::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

enum RecordingState {
    Idle,
    /// Session reserved, encoder being opened outside the lock. Holds the
    /// reply for a stop that arrived before the encoder was ready.
    Opening {
        session_id: u64,
        stop_requested: Option<oneshot::Sender<SessionOutcome>>,
    },
    Starting(RecordingSession),
    Active(RecordingSession),
    Stopping { session_id: u64 },
}

impl RecordingState {
    fn phase(&self) -> RecordingPhase {
        match self {
            RecordingState::Idle => RecordingPhase::Idle,
            RecordingState::Opening { stop_requested: None, .. } => RecordingPhase::Starting,
            RecordingState::Opening { stop_requested: Some(_), .. } => RecordingPhase::Stopping,
            RecordingState::Starting(_) => RecordingPhase::Starting,
            RecordingState::Active(_) => RecordingPhase::Active,
            RecordingState::Stopping { .. } => RecordingPhase::Stopping,
        }
    }
}

/// Per-session counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Timestamp of the first frame; the encoder's time origin
    pub origin: Option<Duration>,
    pub appended: u64,
    /// Dropped because the encoder was not ready
    pub not_ready: u64,
    /// Dropped because they were not later than the previous appended frame
    pub out_of_order: u64,
    pub failed_appends: u64,
}

/// One contiguous recording attempt
struct RecordingSession {
    id: u64,
    destination: PathBuf,
    frame_size: FrameSize,
    sink: Box<dyn EncoderSink>,
    last_pts: Option<Duration>,
    stats: SessionStats,
}

impl RecordingSession {
    fn begin(&mut self, at: Duration) {
        debug!("Recording session {} begins at {:?}", self.id, at);
        self.stats.origin = Some(at);
        self.sink.begin_session(at);
    }

    fn offer(&mut self, frame: &Frame) -> Delivery {
        assert_eq!(
            frame.size(),
            self.frame_size,
            "frame at {:?} does not match the configured output size",
            frame.pts()
        );

        let pts = frame.pts();
        let before_origin = self.stats.origin.is_some_and(|origin| pts < origin);
        let not_after_last = self.last_pts.is_some_and(|last| pts <= last);
        if before_origin || not_after_last {
            self.stats.out_of_order += 1;
            debug!("Session {}: dropping out-of-order frame at {:?}", self.id, pts);
            return Delivery::OutOfOrder;
        }

        if !self.sink.is_ready_for_more_data() {
            self.stats.not_ready += 1;
            debug!("Session {}: encoder not ready, dropping frame at {:?}", self.id, pts);
            return Delivery::NotReady;
        }

        match self.sink.append(frame.clone()) {
            Ok(()) => {
                self.stats.appended += 1;
                self.last_pts = Some(pts);
                Delivery::Appended
            }
            Err(e) => {
                self.stats.failed_appends += 1;
                warn!("Session {}: append failed for frame at {:?}: {}", self.id, pts, e);
                Delivery::AppendFailed
            }
        }
    }
}

/// What happened to a frame offered to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// No session is accepting frames
    NotRecording,
    Appended,
    NotReady,
    OutOfOrder,
    AppendFailed,
}

/// Result of a start request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started { session_id: u64, destination: PathBuf },
    /// A session already exists in the given phase; nothing changed
    AlreadyRecording(RecordingPhase),
}

/// Final report for one session
#[derive(Debug)]
pub struct SessionOutcome {
    pub session_id: u64,
    pub status: FinalizeStatus,
    pub stats: SessionStats,
    /// Where the media library put the recording, if it was saved
    pub saved_to: Option<PathBuf>,
}

/// Settings the controller needs from [`RecordingConfig`]
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    pub output_dir: PathBuf,
    pub file_prefix: String,
    pub frame_size: FrameSize,
}

impl RecorderSettings {
    pub fn from_config(config: &RecordingConfig, frame_size: FrameSize) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            file_prefix: config.file_prefix.clone(),
            frame_size,
        }
    }
}

struct ControllerInner {
    state: Mutex<RecordingState>,
    next_session_id: AtomicU64,
    settings: RecorderSettings,
    factory: Arc<dyn EncoderFactory>,
    library: Option<Arc<dyn MediaLibrary>>,
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        // A poisoned lock means the frame timeline hit a fatal assertion;
        // the state itself is still consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn destination_for(&self, session_id: u64) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        self.settings.output_dir.join(format!(
            "{}_{}_{:03}.{}",
            self.settings.file_prefix,
            stamp,
            session_id,
            self.factory.extension()
        ))
    }

    fn open_sink(&self, destination: &Path) -> Result<Box<dyn EncoderSink>> {
        std::fs::create_dir_all(&self.settings.output_dir).map_err(|e| RecordingError::SinkCreation {
            destination: destination.display().to_string(),
            reason: format!("cannot create {}: {}", self.settings.output_dir.display(), e),
        })?;
        self.factory.create(destination, self.settings.frame_size)
    }

    /// Stopping -> Idle, then hand a completed file to the library
    fn finish(&self, session_id: u64, status: FinalizeStatus, stats: SessionStats) -> SessionOutcome {
        {
            let mut state = self.lock();
            if matches!(*state, RecordingState::Stopping { session_id: id } if id == session_id) {
                *state = RecordingState::Idle;
            }
        }

        let mut saved_to = None;
        match &status {
            FinalizeStatus::Completed(output) => {
                info!(
                    "Recording session {} complete: {} frames, {:.2}s -> {}",
                    session_id,
                    output.frames,
                    output.duration.as_secs_f64(),
                    output.path.display()
                );
                if let Some(library) = &self.library {
                    match library.save(output) {
                        Ok(path) => {
                            info!("Saved recording {} to {}", session_id, path.display());
                            saved_to = Some(path);
                        }
                        Err(e) => error!("Failed to save recording {}: {}", session_id, e),
                    }
                }
            }
            FinalizeStatus::Cancelled => info!("Recording session {} cancelled", session_id),
            FinalizeStatus::Failed(e) => error!("Recording session {} failed: {}", session_id, e),
        }

        SessionOutcome {
            session_id,
            status,
            stats,
            saved_to,
        }
    }
}

/// Reports a session's outcome exactly once, even if the encoder drops the callback
struct Completion {
    inner: Arc<ControllerInner>,
    session_id: u64,
    stats: SessionStats,
    reply: Option<oneshot::Sender<SessionOutcome>>,
}

impl Completion {
    fn complete(mut self, status: FinalizeStatus) {
        self.deliver(status);
    }

    fn deliver(&mut self, status: FinalizeStatus) {
        if let Some(reply) = self.reply.take() {
            let outcome = self.inner.finish(self.session_id, status, std::mem::take(&mut self.stats));
            // The caller may have dropped the handle
            let _ = reply.send(outcome);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.reply.is_some() {
            warn!("Encoder for session {} dropped its finalize callback", self.session_id);
            self.deliver(FinalizeStatus::Failed(RecordingError::FinalizeLost));
        }
    }
}

/// Pending finalize of a stopped session
#[derive(Debug)]
pub struct FinalizeHandle {
    session_id: u64,
    rx: oneshot::Receiver<SessionOutcome>,
}

impl FinalizeHandle {
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Wait for the outcome without blocking the runtime
    pub async fn outcome(self) -> SessionOutcome {
        let session_id = self.session_id;
        self.rx.await.unwrap_or_else(|_| Self::lost(session_id))
    }

    /// Block the calling thread until the outcome arrives
    ///
    /// Must not be called from inside an async runtime; use [`Self::outcome`] there.
    pub fn wait(self) -> SessionOutcome {
        let session_id = self.session_id;
        self.rx.blocking_recv().unwrap_or_else(|_| Self::lost(session_id))
    }

    fn lost(session_id: u64) -> SessionOutcome {
        SessionOutcome {
            session_id,
            status: FinalizeStatus::Failed(RecordingError::FinalizeLost),
            stats: SessionStats::default(),
            saved_to: None,
        }
    }
}

/// Governs the single recording session
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct RecordingController {
    inner: Arc<ControllerInner>,
}

impl RecordingController {
    pub fn new(
        settings: RecorderSettings,
        factory: Arc<dyn EncoderFactory>,
        library: Option<Arc<dyn MediaLibrary>>,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(RecordingState::Idle),
                next_session_id: AtomicU64::new(1),
                settings,
                factory,
                library,
            }),
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.inner.lock().phase()
    }

    /// Whether frames are currently routed to a session
    pub fn is_routing(&self) -> bool {
        matches!(
            *self.inner.lock(),
            RecordingState::Starting(_) | RecordingState::Active(_)
        )
    }

    /// Idle -> Starting
    ///
    /// A no-op while a session exists, including one whose encoder is still
    /// opening. If the encoder cannot be created the controller returns to idle
    /// and the error is returned (and logged here). The state lock is not held
    /// while the encoder opens.
    pub fn start_recording(&self) -> Result<StartOutcome> {
        let session_id = {
            let mut state = self.inner.lock();
            if !matches!(*state, RecordingState::Idle) {
                let phase = state.phase();
                debug!("Start request ignored while {}", phase);
                return Ok(StartOutcome::AlreadyRecording(phase));
            }

            let session_id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
            *state = RecordingState::Opening {
                session_id,
                stop_requested: None,
            };
            session_id
        };

        let destination = self.inner.destination_for(session_id);
        let opened = self.inner.open_sink(&destination);

        let mut state = self.inner.lock();
        let stop_requested = match &mut *state {
            RecordingState::Opening { session_id: id, stop_requested } if *id == session_id => {
                stop_requested.take()
            }
            _ => None,
        };

        let sink = match opened {
            Ok(sink) => sink,
            Err(e) => {
                error!("Could not start recording session {}: {}", session_id, e);
                match stop_requested {
                    Some(reply) => {
                        *state = RecordingState::Stopping { session_id };
                        drop(state);
                        self.completion(session_id, SessionStats::default(), reply)
                            .complete(FinalizeStatus::Cancelled);
                    }
                    None => *state = RecordingState::Idle,
                }
                return Err(e);
            }
        };

        let session = RecordingSession {
            id: session_id,
            destination: destination.clone(),
            frame_size: self.inner.settings.frame_size,
            sink,
            last_pts: None,
            stats: SessionStats::default(),
        };

        match stop_requested {
            None => {
                info!("Recording session {} starting -> {}", session_id, destination.display());
                *state = RecordingState::Starting(session);
            }
            Some(reply) => {
                info!("Recording session {} stopped while its encoder opened", session_id);
                *state = RecordingState::Stopping { session_id };
                drop(state);
                self.finalize(session, reply);
            }
        }

        Ok(StartOutcome::Started { session_id, destination })
    }

    /// Active/Starting -> Stopping
    ///
    /// Returns once the session is detached: any append in progress on the frame
    /// timeline has finished and no later frame will reach the session. The
    /// encoder finalizes in the background; the returned handle yields the
    /// outcome. Returns `None` when there was nothing to stop.
    pub fn stop_recording(&self) -> Option<FinalizeHandle> {
        let session = {
            let mut state = self.inner.lock();
            if let RecordingState::Opening { session_id, stop_requested } = &mut *state {
                if stop_requested.is_none() {
                    // start_recording finalizes the encoder once it is open
                    let (tx, rx) = oneshot::channel();
                    *stop_requested = Some(tx);
                    debug!("Recording session {} stopping before its encoder opened", session_id);
                    return Some(FinalizeHandle {
                        session_id: *session_id,
                        rx,
                    });
                }
            }

            match std::mem::replace(&mut *state, RecordingState::Idle) {
                RecordingState::Starting(session) | RecordingState::Active(session) => {
                    *state = RecordingState::Stopping { session_id: session.id };
                    session
                }
                other => {
                    debug!("Stop request ignored while {}", other.phase());
                    *state = other;
                    return None;
                }
            }
        };

        let session_id = session.id;
        let (tx, rx) = oneshot::channel();
        self.finalize(session, tx);
        Some(FinalizeHandle { session_id, rx })
    }

    fn completion(
        &self,
        session_id: u64,
        stats: SessionStats,
        reply: oneshot::Sender<SessionOutcome>,
    ) -> Completion {
        Completion {
            inner: Arc::clone(&self.inner),
            session_id,
            stats,
            reply: Some(reply),
        }
    }

    /// Hand a detached session to its encoder; called without the state lock
    fn finalize(&self, session: RecordingSession, reply: oneshot::Sender<SessionOutcome>) {
        let RecordingSession { id, destination, sink, stats, .. } = session;
        info!(
            "Recording session {} stopping ({} appended, {} not ready, {} out of order) -> {}",
            id,
            stats.appended,
            stats.not_ready,
            stats.out_of_order,
            destination.display()
        );

        let completion = self.completion(id, stats, reply);
        let on_complete: FinalizeCallback = Box::new(move |status| completion.complete(status));
        sink.finalize(on_complete);
    }

    /// Offer a transformed frame to the current session
    ///
    /// Called only from the frame timeline. The first frame of a session sets
    /// its time origin.
    ///
    /// # Panics
    ///
    /// If a frame headed for the encoder does not have the configured output size.
    pub fn deliver(&self, frame: &Frame) -> Delivery {
        let mut guard = self.inner.lock();
        let state = &mut *guard;

        if matches!(state, RecordingState::Starting(_)) {
            if let RecordingState::Starting(mut session) = std::mem::replace(state, RecordingState::Idle) {
                session.begin(frame.pts());
                info!("Recording session {} active", session.id);
                *state = RecordingState::Active(session);
            }
        }

        match state {
            RecordingState::Active(session) => session.offer(frame),
            _ => Delivery::NotRecording,
        }
    }
}
