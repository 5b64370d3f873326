//! Ingestion orchestration - probe, then cover art and waveform side by side
//!
//! ```text
//!              ┌──────────┐
//! source ────► │  probe   │ ── fails ──► IngestError (reject file)
//!              └────┬─────┘
//!          ┌────────┴─────────┐
//!          ▼                  ▼
//!   ┌─────────────┐    ┌─────────────┐
//!   │ extract_art │    │ decode+down │   failures ──► Diagnostic
//!   └──────┬──────┘    └──────┬──────┘
//!          └────────┬─────────┘
//!                   ▼
//!            IngestionResult
//! ```
//!
//! Every stage runs under its own timeout and holds a permit from a shared
//! semaphore while the engine works, which bounds the number of decoder
//! processes across concurrent ingestions.

use crate::artwork::{extract_art, ArtworkOutcome, CoverArtAsset, PictureHint};
use crate::engine::DecodingEngine;
use crate::error::{DegradedReason, Diagnostic, Feature, IngestError, Result};
use crate::pcm::decode_for_analysis;
use crate::probe::{probe, ProbeResult, TagOverrides};
use crate::sink::AssetSink;
use serde::Serialize;
use soul_waveform::{downsample, WaveformEnvelope, DEFAULT_POINTS};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

/// Pipeline stage, used for timeouts and error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Probe,
    Artwork,
    Decode,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Probe => write!(f, "probe"),
            Stage::Artwork => write!(f, "artwork"),
            Stage::Decode => write!(f, "decode"),
        }
    }
}

/// Ingestion options
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Envelope length used by [`Ingestor::ingest_default`] (default: 100)
    pub waveform_points: usize,

    /// Time limit for probing (default: 30s)
    pub probe_timeout: Duration,

    /// Time limit for cover art extraction (default: 30s)
    pub artwork_timeout: Duration,

    /// Time limit for PCM decoding (default: 120s)
    pub decode_timeout: Duration,

    /// Maximum engine invocations in flight across all ingestions (default: num_cpus)
    pub max_concurrent_decodes: usize,

    /// Extract embedded cover art (default: true)
    pub extract_artwork: bool,

    /// Compute the waveform envelope (default: true)
    pub compute_waveform: bool,

    /// Directory for intermediate decoder output (default: OS temp dir)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            waveform_points: DEFAULT_POINTS,
            probe_timeout: Duration::from_secs(30),
            artwork_timeout: Duration::from_secs(30),
            decode_timeout: Duration::from_secs(120),
            max_concurrent_decodes: num_cpus::get(),
            extract_artwork: true,
            compute_waveform: true,
            scratch_dir: None,
        }
    }
}

impl IngestOptions {
    fn timeout(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Probe => self.probe_timeout,
            Stage::Artwork => self.artwork_timeout,
            Stage::Decode => self.decode_timeout,
        }
    }
}

/// Everything ingestion learned about one file
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    /// File that was ingested
    pub source: PathBuf,
    /// Normalized container metadata
    pub metadata: ProbeResult,
    /// Extracted cover image, owned by the caller from here on
    pub cover_art: Option<CoverArtAsset>,
    /// Normalized envelope; empty if the waveform could not be computed
    pub waveform: WaveformEnvelope,
    /// Features that are missing and why
    pub diagnostics: Vec<Diagnostic>,
}

impl IngestionResult {
    /// True if a feature is missing for a reason other than "the file has none"
    pub fn is_degraded(&self) -> bool {
        self.diagnostics.iter().any(|d| !d.reason.is_expected())
    }

    /// Diagnostic for `feature`, if it was degraded
    pub fn diagnostic(&self, feature: Feature) -> Option<&Diagnostic> {
        self.diagnostics.iter().find(|d| d.feature == feature)
    }
}

enum StageError {
    TimedOut(Duration),
    Closed,
}

impl From<StageError> for DegradedReason {
    fn from(err: StageError) -> Self {
        match err {
            StageError::TimedOut(timeout) => DegradedReason::timed_out(timeout),
            StageError::Closed => DegradedReason::Cancelled,
        }
    }
}

/// Audio ingestion orchestrator
///
/// Stateless per call; share one instance (behind an `Arc`) across tasks so
/// they share the decoder concurrency limit.
pub struct Ingestor<E, S> {
    engine: Arc<E>,
    sink: Arc<S>,
    options: IngestOptions,
    permits: Arc<Semaphore>,
}

impl<E, S> Ingestor<E, S>
where
    E: DecodingEngine + 'static,
    S: AssetSink + 'static,
{
    /// Create an ingestor with default options
    pub fn new(engine: Arc<E>, sink: Arc<S>) -> Self {
        Self::with_options(engine, sink, IngestOptions::default())
    }

    /// Create an ingestor with custom options
    pub fn with_options(engine: Arc<E>, sink: Arc<S>, options: IngestOptions) -> Self {
        let permits = Arc::new(Semaphore::new(options.max_concurrent_decodes.max(1)));
        Self {
            engine,
            sink,
            options,
            permits,
        }
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Ingest with the configured envelope length
    pub async fn ingest_default(&self, source: &Path) -> Result<IngestionResult> {
        self.ingest(source, self.options.waveform_points).await
    }

    /// Ingest one audio file
    ///
    /// Returns `Err` only when the file must be rejected (or the arguments are
    /// invalid). Cover art and waveform problems are reported in
    /// [`IngestionResult::diagnostics`].
    pub async fn ingest(&self, source: &Path, num_waveform_points: usize) -> Result<IngestionResult> {
        self.ingest_with_overrides(source, num_waveform_points, &TagOverrides::default())
            .await
    }

    /// Ingest one audio file, letting user-entered tags win over probed ones
    pub async fn ingest_with_overrides(
        &self,
        source: &Path,
        num_waveform_points: usize,
        overrides: &TagOverrides,
    ) -> Result<IngestionResult> {
        if num_waveform_points == 0 {
            return Err(IngestError::InvalidInput(
                "waveform point count must be at least 1".to_string(),
            ));
        }

        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(IngestError::SourceNotFound(source.to_path_buf()));
        }

        let started = Instant::now();

        let metadata = self.probe_stage(source).await?.with_overrides(overrides);

        let (artwork, waveform) = tokio::join!(
            self.artwork_stage(source, PictureHint::from_metadata(&metadata)),
            self.waveform_stage(source, num_waveform_points),
        );

        let mut diagnostics = Vec::new();

        let cover_art = match artwork {
            Ok(asset) => asset,
            Err(reason) => {
                diagnostics.push(Diagnostic::new(Feature::CoverArt, reason));
                None
            }
        };

        let waveform = match waveform {
            Ok(envelope) => envelope,
            Err(reason) => {
                diagnostics.push(Diagnostic::new(Feature::Waveform, reason));
                WaveformEnvelope::empty()
            }
        };

        let result = IngestionResult {
            source: source.to_path_buf(),
            metadata,
            cover_art,
            waveform,
            diagnostics,
        };

        if result.is_degraded() {
            tracing::warn!(
                "Ingested {} with degraded features in {:?}: {:?}",
                source.display(),
                started.elapsed(),
                result.diagnostics
            );
        } else {
            tracing::info!(
                "Ingested {} in {:?} (art: {}, waveform points: {})",
                source.display(),
                started.elapsed(),
                result.cover_art.is_some(),
                result.waveform.len()
            );
        }

        Ok(result)
    }

    /// Probe only; same rejection rules as [`Ingestor::ingest`]
    pub async fn probe(&self, source: &Path) -> Result<ProbeResult> {
        if !tokio::fs::try_exists(source).await.unwrap_or(false) {
            return Err(IngestError::SourceNotFound(source.to_path_buf()));
        }
        self.probe_stage(source).await
    }

    /// Decode and downsample only
    ///
    /// Unlike [`Ingestor::ingest`], a decode failure is returned as the reason
    /// instead of an empty envelope. A zero point count is rejected before the
    /// engine is touched.
    pub async fn waveform(
        &self,
        source: &Path,
        num_points: usize,
    ) -> std::result::Result<WaveformEnvelope, DegradedReason> {
        if num_points == 0 {
            return Err(DegradedReason::InvalidInput(
                "waveform point count must be at least 1".to_string(),
            ));
        }
        let envelope = self.compute_waveform(source, num_points).await?;
        Ok(envelope)
    }

    async fn probe_stage(&self, source: &Path) -> Result<ProbeResult> {
        match self
            .run_stage(Stage::Probe, probe(self.engine.as_ref(), source))
            .await
        {
            Ok(Ok(metadata)) => Ok(metadata),
            Ok(Err(e)) => {
                tracing::error!("Rejecting {}: {}", source.display(), e);
                Err(IngestError::Probe {
                    path: source.to_path_buf(),
                    source: e,
                })
            }
            Err(StageError::TimedOut(timeout)) => {
                tracing::error!(
                    "Rejecting {}: probe timed out after {:?}",
                    source.display(),
                    timeout
                );
                Err(IngestError::Timeout {
                    stage: Stage::Probe,
                    timeout,
                })
            }
            Err(StageError::Closed) => Err(IngestError::Cancelled),
        }
    }

    async fn artwork_stage(
        &self,
        source: &Path,
        hint: PictureHint<'_>,
    ) -> std::result::Result<Option<CoverArtAsset>, DegradedReason> {
        if !self.options.extract_artwork {
            return Ok(None);
        }

        let extraction = extract_art(self.engine.as_ref(), self.sink.as_ref(), source, hint);
        match self.run_stage(Stage::Artwork, extraction).await {
            Ok(ArtworkOutcome::Extracted(asset)) => Ok(Some(asset)),
            Ok(ArtworkOutcome::Absent(reason)) => Err(reason),
            Err(e) => {
                let reason = DegradedReason::from(e);
                tracing::warn!("Cover art for {} abandoned: {}", source.display(), reason);
                Err(reason)
            }
        }
    }

    async fn waveform_stage(
        &self,
        source: &Path,
        num_points: usize,
    ) -> std::result::Result<WaveformEnvelope, DegradedReason> {
        if !self.options.compute_waveform {
            return Ok(WaveformEnvelope::empty());
        }

        self.compute_waveform(source, num_points).await.map_err(|reason| {
            tracing::warn!("Waveform for {} unavailable: {}", source.display(), reason);
            reason
        })
    }

    async fn compute_waveform(
        &self,
        source: &Path,
        num_points: usize,
    ) -> std::result::Result<WaveformEnvelope, DegradedReason> {
        let decode = decode_for_analysis(
            self.engine.as_ref(),
            source,
            self.options.scratch_dir.as_deref(),
        );

        let pcm = self.run_stage(Stage::Decode, decode).await??;

        // CPU-bound, runs on the blocking pool
        tokio::task::spawn_blocking(move || downsample(&pcm.samples, num_points))
            .await
            .map_err(|e| DegradedReason::Engine(format!("waveform task failed: {}", e)))?
            .map_err(|e| DegradedReason::Engine(e.to_string()))
    }

    /// Run `work` holding a decoder permit, bounded by the stage timeout
    ///
    /// On timeout `work` is dropped, which kills its engine process and
    /// removes any scratch or partial output it owns.
    async fn run_stage<F>(&self, stage: Stage, work: F) -> std::result::Result<F::Output, StageError>
    where
        F: Future,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| StageError::Closed)?;

        let timeout = self.options.timeout(stage);
        tokio::time::timeout(timeout, work)
            .await
            .map_err(|_| StageError::TimedOut(timeout))
    }
}
