use thiserror::Error;

/// Main error type for the effects-camera library
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Frame source errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open frame source: {path}")]
    OpenFailed { path: String },

    #[error("No frames found in source: {path}")]
    NoFrames { path: String },

    #[error("Failed to decode frame {path}: {reason}")]
    DecodeFailed { path: String, reason: String },

    #[error("Frame pipeline has shut down")]
    PipelineClosed,
}

/// Filter errors
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Filter not found: {name}")]
    NotFound { name: String },

    #[error("Filter failed: {filter} - {reason}")]
    Failed { filter: String, reason: String },

    #[error("Filter configuration invalid: {details}")]
    InvalidConfig { details: String },
}

/// Recording session errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Failed to create encoder for {destination}: {reason}")]
    SinkCreation { destination: String, reason: String },

    #[error("Encoder rejected frame: {reason}")]
    AppendFailed { reason: String },

    #[error("Encoder finalize failed: {reason}")]
    FinalizeFailed { reason: String },

    #[error("Finalize outcome was never delivered")]
    FinalizeLost,

    #[error("Failed to save recording {path}: {reason}")]
    SaveFailed { path: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using CameraError
pub type Result<T> = std::result::Result<T, CameraError>;

impl CameraError {
    /// Check if the user can simply trigger the operation again
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            // Session-fatal errors tear the session down; a new press starts a fresh one
            Self::Recording(RecordingError::SinkCreation { .. }) => true,
            Self::Recording(RecordingError::FinalizeFailed { .. }) => true,
            Self::Recording(RecordingError::SaveFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Capture(CaptureError::OpenFailed { path }) => {
                format!("Could not open frame source '{}'. Please check it exists and contains images.", path)
            }
            Self::Filter(FilterError::NotFound { name }) => {
                format!("Filter '{}' not found. Available filters: none, monochrome, sepia, vignette, invert", name)
            }
            Self::Recording(RecordingError::SinkCreation { destination, .. }) => {
                format!("Could not start recording to '{}'. Is ffmpeg installed?", destination)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_fatal_errors_are_recoverable() {
        let err: CameraError = RecordingError::SinkCreation {
            destination: "out.mp4".to_string(),
            reason: "denied".to_string(),
        }
        .into();
        assert!(err.is_recoverable());
        assert!(err.user_message().contains("out.mp4"));

        let err: CameraError = FilterError::NotFound { name: "glow".to_string() }.into();
        assert!(!err.is_recoverable());
        assert!(err.user_message().contains("glow"));
    }
}
