// Shared mocks for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use effects_camera::{
    error::{RecordingError, Result},
    pipeline::{
        EncoderFactory, EncoderSink, FinalizeCallback, FinalizeStatus, MediaLibrary, PreviewSink,
        RecordedOutput, RecorderSettings, RecordingController,
    },
    video::types::{Frame, FrameSize},
};

pub const SIZE: FrameSize = FrameSize::new(8, 8);

pub fn frame_at(ms: u64) -> Frame {
    Frame::new_filled(SIZE, [40, 80, 120], Duration::from_millis(ms), Duration::from_millis(1))
}

/// One frame per second, as a slow camera would deliver them
pub fn frame_at_secs(secs: u64) -> Frame {
    Frame::new_filled(SIZE, [40, 80, 120], Duration::from_secs(secs), Duration::from_secs(1))
}

pub fn settings(output_dir: &Path) -> RecorderSettings {
    RecorderSettings {
        output_dir: output_dir.to_path_buf(),
        file_prefix: "test".to_string(),
        frame_size: SIZE,
    }
}

/// How a mock encoder ends its session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeMode {
    /// Completed with the appended frames, Cancelled when there were none
    Complete,
    Fail,
    /// Drop the callback without calling it
    Forget,
}

/// Everything one mock encoder saw
#[derive(Debug, Default)]
pub struct EncoderLog {
    pub destination: PathBuf,
    pub begins: Vec<Duration>,
    pub appended: Vec<Duration>,
    /// End of the last appended frame
    pub end: Duration,
    pub readiness_checks: usize,
    pub finalized: usize,
    /// Appends that arrived after finalize had started
    pub late_appends: usize,
}

pub struct MockEncoder {
    log: Arc<Mutex<EncoderLog>>,
    readiness: Arc<Mutex<VecDeque<bool>>>,
    mode: FinalizeMode,
}

impl EncoderSink for MockEncoder {
    fn is_ready_for_more_data(&self) -> bool {
        self.log.lock().unwrap().readiness_checks += 1;
        self.readiness.lock().unwrap().pop_front().unwrap_or(true)
    }

    fn begin_session(&mut self, at: Duration) {
        self.log.lock().unwrap().begins.push(at);
    }

    fn append(&mut self, frame: Frame) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        if log.finalized > 0 {
            log.late_appends += 1;
        }
        log.appended.push(frame.pts());
        log.end = frame.pts() + frame.duration();
        Ok(())
    }

    fn finalize(self: Box<Self>, on_complete: FinalizeCallback) {
        let log = Arc::clone(&self.log);
        let mode = self.mode;
        log.lock().unwrap().finalized += 1;

        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(5));
            let log = log.lock().unwrap();
            let status = match mode {
                FinalizeMode::Forget => {
                    drop(on_complete);
                    return;
                }
                FinalizeMode::Fail => FinalizeStatus::Failed(RecordingError::FinalizeFailed {
                    reason: "disk full".to_string(),
                }),
                FinalizeMode::Complete if log.appended.is_empty() => FinalizeStatus::Cancelled,
                FinalizeMode::Complete => {
                    let origin = log.begins.first().copied().unwrap_or_default();
                    FinalizeStatus::Completed(RecordedOutput {
                        path: log.destination.clone(),
                        frames: log.appended.len() as u64,
                        duration: log.end.saturating_sub(origin),
                    })
                }
            };
            drop(log);
            on_complete(status);
        });
    }
}

/// Hands out mock encoders and keeps their logs
pub struct MockFactory {
    pub sessions: Mutex<Vec<Arc<Mutex<EncoderLog>>>>,
    pub create_calls: Mutex<usize>,
    readiness: Arc<Mutex<VecDeque<bool>>>,
    mode: FinalizeMode,
    fail_creation: bool,
    create_delay: Duration,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::with_mode(FinalizeMode::Complete)
    }

    pub fn with_mode(mode: FinalizeMode) -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            create_calls: Mutex::new(0),
            readiness: Arc::new(Mutex::new(VecDeque::new())),
            mode,
            fail_creation: false,
            create_delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_creation: true,
            ..Self::new()
        }
    }

    /// Take `delay` to open each encoder, like spawning an encoder process
    pub fn with_create_delay(self, delay: Duration) -> Self {
        Self {
            create_delay: delay,
            ..self
        }
    }

    /// Answers for the next readiness checks, in order; afterwards always ready
    pub fn script_readiness(&self, answers: &[bool]) {
        self.readiness.lock().unwrap().extend(answers.iter().copied());
    }

    pub fn session(&self, index: usize) -> Arc<Mutex<EncoderLog>> {
        Arc::clone(&self.sessions.lock().unwrap()[index])
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

impl EncoderFactory for MockFactory {
    fn extension(&self) -> &str {
        "mock"
    }

    fn create(&self, destination: &Path, _size: FrameSize) -> Result<Box<dyn EncoderSink>> {
        *self.create_calls.lock().unwrap() += 1;
        std::thread::sleep(self.create_delay);
        if self.fail_creation {
            return Err(RecordingError::SinkCreation {
                destination: destination.display().to_string(),
                reason: "camera busy".to_string(),
            }
            .into());
        }

        let log = Arc::new(Mutex::new(EncoderLog {
            destination: destination.to_path_buf(),
            ..EncoderLog::default()
        }));
        self.sessions.lock().unwrap().push(Arc::clone(&log));

        Ok(Box::new(MockEncoder {
            log,
            readiness: Arc::clone(&self.readiness),
            mode: self.mode,
        }))
    }
}

/// Preview that records what it accepted, optionally refusing every other frame
#[derive(Default)]
pub struct RecordingPreview {
    pub shown: Mutex<Vec<Duration>>,
    pub skip_alternate: bool,
    offered: Mutex<usize>,
}

impl RecordingPreview {
    pub fn skipping() -> Self {
        Self {
            skip_alternate: true,
            ..Self::default()
        }
    }

    pub fn shown(&self) -> Vec<Duration> {
        self.shown.lock().unwrap().clone()
    }
}

impl PreviewSink for RecordingPreview {
    fn present(&self, frame: Frame) -> bool {
        let mut offered = self.offered.lock().unwrap();
        *offered += 1;
        if self.skip_alternate && *offered % 2 == 0 {
            return false;
        }
        self.shown.lock().unwrap().push(frame.pts());
        true
    }
}

#[derive(Default)]
pub struct MockLibrary {
    pub saved: Mutex<Vec<RecordedOutput>>,
}

impl MediaLibrary for MockLibrary {
    fn save(&self, output: &RecordedOutput) -> Result<PathBuf> {
        self.saved.lock().unwrap().push(output.clone());
        Ok(PathBuf::from("/library").join(output.path.file_name().unwrap_or_default()))
    }
}

pub fn controller(
    output_dir: &Path,
    factory: Arc<MockFactory>,
    library: Option<Arc<MockLibrary>>,
) -> RecordingController {
    RecordingController::new(
        settings(output_dir),
        factory,
        library.map(|library| library as Arc<dyn MediaLibrary>),
    )
}

/// Poll until `condition` holds or the timeout passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
