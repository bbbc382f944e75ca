use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::{
    config::RecordingConfig,
    error::{RecordingError, Result},
    output::writer::{finalize_failed, spawn_finalize, BackgroundWriter},
    pipeline::sinks::{EncoderFactory, EncoderSink, FinalizeCallback, FinalizeStatus, RecordedOutput},
    video::types::{Frame, FrameSize},
};

/// Writes each recorded frame as a PNG into a per-session directory
///
/// Files are named by their offset from the session origin in milliseconds, so
/// a directory listing sorts in presentation order.
#[derive(Debug, Clone)]
pub struct ImageSequenceEncoderFactory {
    queue_depth: usize,
}

impl ImageSequenceEncoderFactory {
    pub fn new(queue_depth: usize) -> Self {
        Self { queue_depth }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(config.queue_depth)
    }
}

impl EncoderFactory for ImageSequenceEncoderFactory {
    fn extension(&self) -> &str {
        "frames"
    }

    fn create(&self, destination: &Path, size: FrameSize) -> Result<Box<dyn EncoderSink>> {
        let creation_error = |reason: String| RecordingError::SinkCreation {
            destination: destination.display().to_string(),
            reason,
        };

        std::fs::create_dir(destination).map_err(|e| creation_error(e.to_string()))?;

        let writer = BackgroundWriter::spawn(
            "frame-writer",
            self.queue_depth,
            |(path, frame): (PathBuf, Frame)| {
                frame
                    .save_png(&path)
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{}: {}", path.display(), e)))
            },
        )
        .map_err(|e| creation_error(format!("failed to start writer: {}", e)))?;

        info!("Image sequence encoder ready: {} -> {}", size, destination.display());

        Ok(Box::new(ImageSequenceEncoder {
            directory: destination.to_path_buf(),
            writer,
            origin: Duration::ZERO,
            end: Duration::ZERO,
            appended: 0,
        }))
    }
}

pub struct ImageSequenceEncoder {
    directory: PathBuf,
    writer: BackgroundWriter<(PathBuf, Frame)>,
    origin: Duration,
    end: Duration,
    appended: u64,
}

impl ImageSequenceEncoder {
    fn frame_path(&self, pts: Duration) -> PathBuf {
        let offset = pts.saturating_sub(self.origin);
        self.directory.join(format!("frame_{:010}.png", offset.as_millis()))
    }
}

impl EncoderSink for ImageSequenceEncoder {
    fn is_ready_for_more_data(&self) -> bool {
        self.writer.has_room()
    }

    fn begin_session(&mut self, at: Duration) {
        self.origin = at;
        self.end = at;
    }

    fn append(&mut self, frame: Frame) -> Result<()> {
        let end = frame.pts() + frame.duration();
        let path = self.frame_path(frame.pts());
        self.writer.push((path, frame))?;
        self.end = end;
        self.appended += 1;
        Ok(())
    }

    fn finalize(self: Box<Self>, on_complete: FinalizeCallback) {
        let ImageSequenceEncoder {
            directory,
            mut writer,
            origin,
            end,
            appended,
        } = *self;

        spawn_finalize("frames-finalize", on_complete, move || {
            let written = writer.finish();

            if appended == 0 {
                if let Err(e) = std::fs::remove_dir_all(&directory) {
                    debug!("Could not remove empty recording {}: {}", directory.display(), e);
                }
                return FinalizeStatus::Cancelled;
            }

            match written {
                Ok(frames) => FinalizeStatus::Completed(RecordedOutput {
                    path: directory,
                    frames,
                    duration: end.saturating_sub(origin),
                }),
                Err(e) => finalize_failed(format!("writing frames: {}", e)),
            }
        });
    }
}
