use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{
    config::RecordingConfig,
    error::{RecordingError, Result},
    output::writer::{finalize_failed, spawn_finalize, BackgroundWriter},
    pipeline::sinks::{EncoderFactory, EncoderSink, FinalizeCallback, FinalizeStatus, RecordedOutput},
    video::types::{Frame, FrameSize},
};

/// Creates H.264 MP4 encoders backed by an `ffmpeg` child process
///
/// Raw RGB24 frames are piped to ffmpeg's stdin at the configured rate. Each
/// frame is placed on that rate's grid by its presentation time, so gaps in
/// the recording keep their wall-clock length.
#[derive(Debug, Clone)]
pub struct FfmpegEncoderFactory {
    ffmpeg_path: String,
    fps: f64,
    quality: u8,
    queue_depth: usize,
}

impl FfmpegEncoderFactory {
    pub fn new(ffmpeg_path: impl Into<String>, fps: f64, quality: u8, queue_depth: usize) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            fps,
            quality,
            queue_depth,
        }
    }

    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.fps, config.quality, config.queue_depth)
    }

    /// Whether the configured ffmpeg binary can be run
    pub fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn quality_to_crf(&self) -> u8 {
        (51 - ((self.quality as f32 / 100.0) * 51.0) as u8).clamp(0, 51)
    }

    fn args(&self, destination: &Path, size: FrameSize) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(), "error".to_string(),
            "-nostats".to_string(),
            "-y".to_string(),
            "-f".to_string(), "rawvideo".to_string(),
            "-pixel_format".to_string(), "rgb24".to_string(),
            "-video_size".to_string(), size.to_string(),
            "-framerate".to_string(), self.fps.to_string(),
            "-i".to_string(), "pipe:0".to_string(),
            "-c:v".to_string(), "libx264".to_string(),
            "-pix_fmt".to_string(), "yuv420p".to_string(),
            "-crf".to_string(), self.quality_to_crf().to_string(),
            "-movflags".to_string(), "+faststart".to_string(),
            destination.display().to_string(),
        ]
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn extension(&self) -> &str {
        "mp4"
    }

    fn create(&self, destination: &Path, size: FrameSize) -> Result<Box<dyn EncoderSink>> {
        let creation_error = |reason: String| RecordingError::SinkCreation {
            destination: destination.display().to_string(),
            reason,
        };

        // yuv420p subsamples chroma 2x2
        if size.width % 2 != 0 || size.height % 2 != 0 {
            return Err(creation_error(format!("{} is not even in both dimensions", size)).into());
        }

        let args = self.args(destination, size);
        debug!("Spawning {} {:?}", self.ffmpeg_path, args);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| creation_error(format!("failed to spawn {}: {}", self.ffmpeg_path, e)))?;

        let mut guard = ChildGuard(None);
        let Some(mut stdin) = child.stdin.take() else {
            guard.0 = Some(child);
            return Err(creation_error("ffmpeg stdin unavailable".to_string()).into());
        };
        guard.0 = Some(child);

        let mut slots = SlotFiller::new(move |frame: &Frame| stdin.write_all(frame.as_rgb_bytes()));
        let writer = BackgroundWriter::spawn("ffmpeg-writer", self.queue_depth, move |(frame, slot): (Frame, u64)| {
            slots.place(frame, slot).map(|_| ())
        })
        .map_err(|e| creation_error(format!("failed to start writer: {}", e)))?;

        info!("ffmpeg encoder ready: {} @ {} fps -> {}", size, self.fps, destination.display());

        Ok(Box::new(FfmpegEncoder {
            destination: destination.to_path_buf(),
            child: guard,
            writer,
            fps: self.fps,
            origin: None,
            end: Duration::ZERO,
            appended: 0,
        }))
    }
}

/// Output slot nearest to `pts` on a `fps` grid starting at `origin`
fn slot_for(pts: Duration, origin: Duration, fps: f64) -> u64 {
    (pts.saturating_sub(origin).as_secs_f64() * fps).round() as u64
}

/// Lays timestamped frames onto ffmpeg's fixed-rate input
///
/// Slots skipped by a gap repeat the previous frame. A frame whose slot was
/// already written is dropped.
struct SlotFiller<W> {
    write: W,
    next_slot: u64,
    last: Option<Frame>,
}

impl<W> SlotFiller<W>
where
    W: FnMut(&Frame) -> std::io::Result<()>,
{
    fn new(write: W) -> Self {
        Self {
            write,
            next_slot: 0,
            last: None,
        }
    }

    /// Returns how many slots were written
    fn place(&mut self, frame: Frame, slot: u64) -> std::io::Result<u64> {
        if self.last.is_some() && slot < self.next_slot {
            debug!("Slot {} already written, dropping frame at {:?}", slot, frame.pts());
            return Ok(0);
        }

        let mut written = 0;
        if let Some(last) = &self.last {
            while self.next_slot < slot {
                (self.write)(last)?;
                self.next_slot += 1;
                written += 1;
            }
        }

        (self.write)(&frame)?;
        self.next_slot = slot + 1;
        self.last = Some(frame);
        Ok(written + 1)
    }
}

/// Kills the ffmpeg process unless finalize took it
struct ChildGuard(Option<Child>);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.0.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// One recording written through ffmpeg
pub struct FfmpegEncoder {
    destination: PathBuf,
    child: ChildGuard,
    writer: BackgroundWriter<(Frame, u64)>,
    fps: f64,
    origin: Option<Duration>,
    end: Duration,
    appended: u64,
}

impl EncoderSink for FfmpegEncoder {
    fn is_ready_for_more_data(&self) -> bool {
        self.writer.has_room()
    }

    fn begin_session(&mut self, at: Duration) {
        // Rawvideo input carries no timestamps; slots are counted from here
        self.origin = Some(at);
        self.end = at;
    }

    fn append(&mut self, frame: Frame) -> Result<()> {
        let origin = *self.origin.get_or_insert(frame.pts());
        let end = frame.pts() + frame.duration();
        let slot = slot_for(frame.pts(), origin, self.fps);
        self.writer.push((frame, slot))?;
        self.end = end;
        self.appended += 1;
        Ok(())
    }

    fn finalize(self: Box<Self>, on_complete: FinalizeCallback) {
        let FfmpegEncoder {
            destination,
            mut child,
            mut writer,
            origin,
            end,
            appended,
            ..
        } = *self;

        spawn_finalize("ffmpeg-finalize", on_complete, move || {
            let written = writer.finish();
            let Some(process) = child.0.take() else {
                return finalize_failed("ffmpeg process already gone");
            };

            if appended == 0 {
                drop(ChildGuard(Some(process)));
                if let Err(e) = std::fs::remove_file(&destination) {
                    debug!("Nothing to clean up at {}: {}", destination.display(), e);
                }
                return FinalizeStatus::Cancelled;
            }

            let output = match process.wait_with_output() {
                Ok(output) => output,
                Err(e) => return finalize_failed(format!("waiting for ffmpeg: {}", e)),
            };

            let frames = match written {
                Ok(frames) => frames,
                Err(e) => {
                    warn!("ffmpeg stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
                    return finalize_failed(format!("writing frames to ffmpeg: {}", e));
                }
            };

            if !output.status.success() {
                return finalize_failed(format!(
                    "ffmpeg exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ));
            }

            FinalizeStatus::Completed(RecordedOutput {
                path: destination,
                frames,
                duration: end.saturating_sub(origin.unwrap_or(end)),
            })
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_describe_raw_input() {
        let factory = FfmpegEncoderFactory::new("ffmpeg", 30.0, 100, 4);
        let args = factory.args(Path::new("/tmp/out.mp4"), FrameSize::new(720, 1280));

        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pixel_format rgb24 -video_size 720x1280 -framerate 30"));
        assert!(joined.contains("-crf 0"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp4"));
    }

    #[test]
    fn test_slot_for_rounds_to_nearest() {
        let origin = Duration::from_secs(10);
        assert_eq!(slot_for(origin, origin, 30.0), 0);
        assert_eq!(slot_for(Duration::from_millis(10_033), origin, 30.0), 1);
        assert_eq!(slot_for(Duration::from_secs(12), origin, 30.0), 60);
        assert_eq!(slot_for(Duration::from_secs(9), origin, 30.0), 0);
    }

    #[test]
    fn test_gap_repeats_previous_frame() {
        let mut written = Vec::new();
        let fps = 30.0;
        let origin = Duration::ZERO;
        let frame = |secs: u64| {
            Frame::new_filled(
                FrameSize::new(2, 2),
                [secs as u8, 0, 0],
                Duration::from_secs(secs),
                Duration::from_millis(33),
            )
        };

        let mut slots = SlotFiller::new(|frame: &Frame| {
            written.push(frame.pts());
            Ok(())
        });
        // The frame at t=1 never arrives
        assert_eq!(slots.place(frame(0), slot_for(Duration::ZERO, origin, fps)).unwrap(), 1);
        assert_eq!(slots.place(frame(2), slot_for(Duration::from_secs(2), origin, fps)).unwrap(), 60);
        drop(slots);

        assert_eq!(written.len(), 61);
        assert!(written[..60].iter().all(|&pts| pts == Duration::ZERO));
        assert_eq!(written[60], Duration::from_secs(2));
    }

    #[test]
    fn test_frame_on_written_slot_is_dropped() {
        let mut count = 0;
        let mut slots = SlotFiller::new(|_: &Frame| {
            count += 1;
            Ok(())
        });
        let frame = |ms: u64| {
            Frame::new_filled(FrameSize::new(2, 2), [0, 0, 0], Duration::from_millis(ms), Duration::from_millis(5))
        };

        // 200 fps capture into a 30 fps file
        for ms in [0, 5, 10, 15, 20, 25, 30, 35] {
            slots.place(frame(ms), slot_for(Duration::from_millis(ms), Duration::ZERO, 30.0)).unwrap();
        }
        drop(slots);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_odd_size_rejected() {
        let factory = FfmpegEncoderFactory::new("ffmpeg", 30.0, 85, 4);
        let result = factory.create(Path::new("/tmp/never.mp4"), FrameSize::new(721, 1280));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_binary_is_creation_error() {
        let factory = FfmpegEncoderFactory::new("/nonexistent/ffmpeg-binary", 30.0, 85, 4);
        assert!(!factory.is_available());

        let err = factory
            .create(Path::new("/tmp/never.mp4"), FrameSize::new(16, 16))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            crate::CameraError::Recording(RecordingError::SinkCreation { .. })
        ));
    }
}
