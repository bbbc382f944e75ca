use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    filters::FilterConfig,
    video::{FrameSize, PreviewRect, Rotation},
};

/// Main configuration for the effects camera
///
/// Chosen once at startup and never mutated while the pipeline runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Frame source settings
    pub capture: CaptureConfig,

    /// Output geometry and preview placement
    pub pipeline: PipelineConfig,

    /// Photographic filter applied to every frame
    pub filter: FilterSettings,

    /// Recording and media library settings
    pub recording: RecordingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        self.pipeline.validate()?;
        self.filter.validate()?;
        self.recording.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Nominal capture rate (frames per second)
    pub fps: f64,

    /// Sensor frame size
    pub size: FrameSize,

    /// Rotation applied before filtering
    pub rotation: Rotation,

    /// Frames that may wait for the frame timeline before the source starts dropping
    pub queue_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fps: 30.0,
            size: FrameSize::new(1280, 720),
            // Sensors deliver landscape frames; the camera app runs in portrait
            rotation: Rotation::Clockwise90,
            queue_depth: 4,
        }
    }
}

impl CaptureConfig {
    fn validate(&self) -> Result<()> {
        if !(self.fps > 0.0) {
            return Err(invalid("capture.fps", self.fps).into());
        }

        if self.size.is_empty() {
            return Err(invalid("capture.size", self.size).into());
        }

        if self.queue_depth == 0 {
            return Err(invalid("capture.queue_depth", self.queue_depth).into());
        }

        Ok(())
    }

    /// Duration of one frame at the nominal rate
    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps)
    }
}

/// Pipeline geometry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Every frame leaving the transform, and every frame recorded, has exactly this size
    pub output_size: FrameSize,

    /// Where the preview is drawn on the preview surface
    pub preview_rect: PreviewRect,

    /// Worker threads for per-row filter work
    pub filter_threads: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_size: FrameSize::new(720, 1280),
            preview_rect: PreviewRect::new(0, 0, 360, 640),
            filter_threads: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    fn validate(&self) -> Result<()> {
        if self.output_size.is_empty() {
            return Err(invalid("pipeline.output_size", self.output_size).into());
        }

        if self.preview_rect.is_empty() {
            return Err(invalid(
                "pipeline.preview_rect",
                format!("{}x{}", self.preview_rect.width, self.preview_rect.height),
            ).into());
        }

        if self.filter_threads == 0 {
            return Err(invalid("pipeline.filter_threads", self.filter_threads).into());
        }

        Ok(())
    }
}

/// Which filter to run and with what parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterSettings {
    /// Registered filter name
    pub name: String,

    /// Filter parameters
    pub config: FilterConfig,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            name: "sepia".to_string(),
            config: FilterConfig::with_intensity(1.0),
        }
    }
}

impl FilterSettings {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("filter.name", &self.name).into());
        }

        if !(0.0..=1.0).contains(&self.config.intensity) {
            return Err(invalid("filter.config.intensity", self.config.intensity).into());
        }

        Ok(())
    }
}

/// Encoder backend used for recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    /// H.264 MP4 through an `ffmpeg` child process
    Ffmpeg,
    /// One PNG per frame in a directory
    ImageSequence,
}

/// Recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory where in-progress recordings are written
    pub output_dir: PathBuf,

    /// Recording file name prefix; a timestamp and session id are appended
    pub file_prefix: String,

    /// Encoder backend
    pub encoder: EncoderKind,

    /// Frame rate written into the container
    pub fps: f64,

    /// Quality setting (0-100, higher is better)
    pub quality: u8,

    /// Frames the encoder may buffer before it reports not ready
    pub queue_depth: usize,

    /// ffmpeg executable
    pub ffmpeg_path: String,

    /// Completed recordings are moved here; `None` leaves them in `output_dir`
    pub library_dir: Option<PathBuf>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("effects-camera"),
            file_prefix: "recording".to_string(),
            encoder: EncoderKind::Ffmpeg,
            fps: 30.0,
            quality: 85,
            queue_depth: 8,
            ffmpeg_path: "ffmpeg".to_string(),
            library_dir: None,
        }
    }
}

impl RecordingConfig {
    fn validate(&self) -> Result<()> {
        if !(self.fps > 0.0) {
            return Err(invalid("recording.fps", self.fps).into());
        }

        if self.quality > 100 {
            return Err(invalid("recording.quality", self.quality).into());
        }

        if self.queue_depth == 0 {
            return Err(invalid("recording.queue_depth", self.queue_depth).into());
        }

        if self.file_prefix.contains(std::path::MAIN_SEPARATOR) {
            return Err(invalid("recording.file_prefix", &self.file_prefix).into());
        }

        Ok(())
    }
}
