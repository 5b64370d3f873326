/// Library scanner - ingests every supported audio file under a directory
use crate::engine::DecodingEngine;
use crate::error::{IngestError, Result};
use crate::ingestor::{IngestionResult, Ingestor};
use crate::sink::AssetSink;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{Id, JoinSet};

/// Extensions picked up by default
pub const DEFAULT_EXTENSIONS: [&str; 4] = ["mp3", "wav", "flac", "m4a"];

/// Scan configuration
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Supported audio file extensions, lowercase without dot
    pub extensions: Vec<String>,

    /// Files ingested at the same time (default: num_cpus)
    pub max_in_flight: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            max_in_flight: num_cpus::get(),
        }
    }
}

/// Scan progress updates
#[derive(Debug, Clone)]
pub enum ScanProgress {
    /// Discovery finished
    Started { total_files: usize },

    /// File ingested (possibly with degraded features)
    FileIngested { path: PathBuf, degraded: bool },

    /// File rejected
    FileRejected { path: PathBuf, error: String },

    /// Scanning completed
    Completed {
        ingested: usize,
        rejected: usize,
    },
}

/// Outcome of a scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    /// Number of supported files found
    pub files_discovered: usize,

    /// Successful ingestions, sorted by path
    pub ingested: Vec<(PathBuf, IngestionResult)>,

    /// Rejected files and the reason, sorted by path
    pub rejected: Vec<(PathBuf, String)>,
}

/// Library scanner
pub struct LibraryScanner<E, S> {
    ingestor: Arc<Ingestor<E, S>>,
    options: ScanOptions,
}

impl<E, S> LibraryScanner<E, S>
where
    E: DecodingEngine + 'static,
    S: AssetSink + 'static,
{
    /// Create a new library scanner
    pub fn new(ingestor: Arc<Ingestor<E, S>>) -> Self {
        Self::with_options(ingestor, ScanOptions::default())
    }

    /// Create a scanner with custom configuration
    pub fn with_options(ingestor: Arc<Ingestor<E, S>>, options: ScanOptions) -> Self {
        Self { ingestor, options }
    }

    /// Scan a directory (or a single file) for audio files
    ///
    /// # Arguments
    /// * `root` - Directory to scan
    /// * `progress_tx` - Optional channel for progress updates
    pub async fn scan(
        &self,
        root: &Path,
        progress_tx: Option<mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanReport> {
        let files = self.discover_files(root)?;
        let mut report = ScanReport {
            files_discovered: files.len(),
            ..Default::default()
        };

        tracing::info!(
            "Scanning {}: {} audio files found",
            root.display(),
            files.len()
        );
        notify(
            progress_tx.as_ref(),
            ScanProgress::Started {
                total_files: files.len(),
            },
        )
        .await;

        let max_in_flight = self.options.max_in_flight.max(1);
        let mut tasks = JoinSet::new();
        // A panicked task only hands back its id, so paths are tracked here
        let mut in_flight: HashMap<Id, PathBuf> = HashMap::new();
        let mut pending = files.into_iter();

        loop {
            while tasks.len() < max_in_flight {
                let Some(path) = pending.next() else { break };
                let ingestor = Arc::clone(&self.ingestor);
                let task_path = path.clone();
                let handle =
                    tasks.spawn(async move { ingestor.ingest_default(&task_path).await });
                in_flight.insert(handle.id(), path);
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };

            let (id, outcome) = match joined {
                Ok((id, Ok(result))) => (id, Ok(result)),
                Ok((id, Err(e))) => (id, Err(e.to_string())),
                Err(e) => (e.id(), Err(format!("ingestion task failed: {}", e))),
            };
            let Some(path) = in_flight.remove(&id) else {
                continue;
            };

            match outcome {
                Ok(result) => {
                    notify(
                        progress_tx.as_ref(),
                        ScanProgress::FileIngested {
                            path: path.clone(),
                            degraded: result.is_degraded(),
                        },
                    )
                    .await;
                    report.ingested.push((path, result));
                }
                Err(error) => {
                    tracing::warn!("Skipping {}: {}", path.display(), error);
                    notify(
                        progress_tx.as_ref(),
                        ScanProgress::FileRejected {
                            path: path.clone(),
                            error: error.clone(),
                        },
                    )
                    .await;
                    report.rejected.push((path, error));
                }
            }
        }

        report.ingested.sort_by(|a, b| a.0.cmp(&b.0));
        report.rejected.sort_by(|a, b| a.0.cmp(&b.0));

        tracing::info!(
            "Scan of {} complete: {} ingested, {} rejected",
            root.display(),
            report.ingested.len(),
            report.rejected.len()
        );
        notify(
            progress_tx.as_ref(),
            ScanProgress::Completed {
                ingested: report.ingested.len(),
                rejected: report.rejected.len(),
            },
        )
        .await;

        Ok(report)
    }

    /// Discover audio files recursively, sorted by path
    pub fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.exists() {
            return Err(IngestError::SourceNotFound(root.to_path_buf()));
        }

        if root.is_file() {
            return Ok(if self.is_supported_file(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && self.is_supported_file(entry.path()))
            .map(walkdir::DirEntry::into_path)
            .collect();

        files.sort();
        Ok(files)
    }

    /// Check if file has a supported extension
    fn is_supported_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.options.extensions.iter().any(|ext| *ext == e)
            })
            .unwrap_or(false)
    }
}

async fn notify(tx: Option<&mpsc::Sender<ScanProgress>>, progress: ScanProgress) {
    if let Some(tx) = tx {
        // Receiver going away does not stop the scan
        let _ = tx.send(progress).await;
    }
}
