use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::{
    error::{RecordingError, Result},
    pipeline::sinks::{MediaLibrary, RecordedOutput},
};

/// Media library backed by a plain directory
///
/// Completed recordings are moved in, keeping their file names. A clash gets a
/// numeric suffix instead of overwriting.
#[derive(Debug, Clone)]
pub struct DirectoryLibrary {
    root: PathBuf,
}

impl DirectoryLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn free_destination(&self, source: &Path) -> Option<PathBuf> {
        let file_name = source.file_name()?;
        let candidate = self.root.join(file_name);
        if !candidate.exists() {
            return Some(candidate);
        }

        let stem = source.file_stem()?.to_string_lossy().into_owned();
        let extension = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        (1..)
            .map(|n| self.root.join(format!("{}_{}{}", stem, n, extension)))
            .find(|candidate| !candidate.exists())
    }

    fn move_into(&self, source: &Path, target: &Path) -> std::io::Result<()> {
        match std::fs::rename(source, target) {
            Ok(()) => Ok(()),
            // Rename fails across filesystems; files can still be copied over
            Err(e) if source.is_file() => {
                debug!("Rename failed ({}), copying {}", e, source.display());
                std::fs::copy(source, target)?;
                std::fs::remove_file(source)
            }
            Err(e) => Err(e),
        }
    }
}

impl MediaLibrary for DirectoryLibrary {
    fn save(&self, output: &RecordedOutput) -> Result<PathBuf> {
        let save_failed = |reason: String| RecordingError::SaveFailed {
            path: output.path.display().to_string(),
            reason,
        };

        std::fs::create_dir_all(&self.root).map_err(|e| save_failed(e.to_string()))?;

        let target = self
            .free_destination(&output.path)
            .ok_or_else(|| save_failed("recording path has no file name".to_string()))?;

        self.move_into(&output.path, &target)
            .map_err(|e| save_failed(e.to_string()))?;

        info!(
            "Saved recording ({} frames, {:.2}s) to {}",
            output.frames,
            output.duration.as_secs_f64(),
            target.display()
        );
        Ok(target)
    }
}
