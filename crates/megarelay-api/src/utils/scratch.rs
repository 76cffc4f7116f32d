//! Request-scoped scratch directory
//!
//! Both handlers stage bytes on disk for exactly one request. The scratch
//! guard owns that space: a fresh random directory under the configured
//! temp root, removed recursively when the guard drops — on success, on
//! mapped errors, and on panics alike. Removal failures (including an
//! already-absent directory) are logged and swallowed; they never cross the
//! handler boundary.

use std::path::{Path, PathBuf};

use megarelay_core::AppError;
use tempfile::TempDir;

use crate::utils::upload::sanitize_filename;

pub struct RequestScratch {
    dir: Option<TempDir>,
}

impl RequestScratch {
    pub fn new(base: &Path) -> Result<Self, AppError> {
        let dir = TempDir::with_prefix_in("relay-", base).map_err(|e| {
            AppError::Internal(format!("failed to create scratch directory: {}", e))
        })?;
        tracing::debug!(path = %dir.path().display(), "created scratch directory");
        Ok(RequestScratch { dir: Some(dir) })
    }

    pub fn path(&self) -> &Path {
        self.dir().path()
    }

    /// Collision-resistant path for an uploaded file: a fresh random token
    /// combined with the sanitized caller-supplied name.
    pub fn upload_path(&self, original_filename: &str) -> Result<PathBuf, AppError> {
        let safe = sanitize_filename(original_filename)?;
        Ok(self
            .dir()
            .path()
            .join(format!("{}_{}", uuid::Uuid::new_v4(), safe)))
    }

    fn dir(&self) -> &TempDir {
        // Present from construction until drop.
        self.dir.as_ref().expect("scratch directory present")
    }
}

impl Drop for RequestScratch {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(err) = dir.close() {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to remove scratch directory"
                );
            } else {
                tracing::debug!(path = %path.display(), "removed scratch directory");
            }
        }
    }
}
