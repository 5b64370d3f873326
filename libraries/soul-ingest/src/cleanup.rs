//! Scoped file guards
//!
//! Both guards delete their file when dropped, which covers early returns,
//! unwinding and a stage future being cancelled by a timeout. Removal
//! failures are logged rather than returned, since they must never block an
//! ingestion result.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Output file that belongs to the pipeline until it is handed to the caller
#[derive(Debug)]
pub(crate) struct PendingFile {
    path: Option<PathBuf>,
}

impl PendingFile {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Give up ownership; the file is no longer deleted on drop
    pub(crate) fn keep(mut self) -> PathBuf {
        self.path.take().unwrap_or_default()
    }

    /// Delete the file now
    pub(crate) fn discard(mut self) {
        if let Some(path) = self.path.take() {
            remove_leftover(&path);
        }
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            remove_leftover(&path);
        }
    }
}

/// Temporary decoder output, removed when the guard goes out of scope
#[derive(Debug)]
pub(crate) struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    /// Create an empty scratch file in `dir` (or the OS temp dir)
    pub(crate) fn create(dir: Option<&Path>, suffix: &str) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("soul-ingest-").suffix(suffix);

        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        Ok(Self {
            path: Some(file.into_temp_path()),
        })
    }

    /// [`ScratchFile::create`] on the blocking pool
    ///
    /// If the caller goes away first, the file is removed when the finished
    /// task's output is dropped.
    pub(crate) async fn create_async(dir: Option<&Path>, suffix: &'static str) -> io::Result<Self> {
        let dir = dir.map(Path::to_path_buf);
        tokio::task::spawn_blocking(move || Self::create(dir.as_deref(), suffix))
            .await
            .map_err(io::Error::other)?
    }

    pub(crate) fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(temp) = self.path.take() {
            let path = temp.to_path_buf();
            match temp.close() {
                Ok(()) => tracing::trace!("Removed scratch file {}", path.display()),
                Err(e) => log_cleanup_failure(&path, &e),
            }
        }
    }
}

fn remove_leftover(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed unused output {}", path.display()),
        Err(e) => log_cleanup_failure(path, &e),
    }
}

fn log_cleanup_failure(path: &Path, err: &io::Error) {
    // Never created (engine failed before writing) is not a leak
    if err.kind() == io::ErrorKind::NotFound {
        return;
    }
    tracing::warn!(
        "Failed to clean up {}: {} (file may be leaking)",
        path.display(),
        err
    );
}
