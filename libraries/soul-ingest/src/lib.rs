//! Soul Ingest - audio ingestion pipeline
//!
//! Turns an uploaded or scanned audio file into what the library stores for a
//! track: normalized metadata, an optional cover image and a waveform preview.
//!
//! # Architecture
//!
//! - [`DecodingEngine`]: container probing, picture extraction and PCM
//!   transcoding ([`FfmpegEngine`] drives the ffmpeg/ffprobe binaries)
//! - [`AssetSink`]: hands out locations for extracted cover art
//! - [`Ingestor`]: runs the stages for one file, with timeouts and a shared
//!   decoder concurrency limit
//! - [`LibraryScanner`]: ingests every supported file under a directory
//!
//! A file that cannot be probed is rejected with an [`IngestError`]. Cover
//! art and waveform failures only degrade the result; they are listed in
//! [`IngestionResult::diagnostics`].
//!
//! # Example
//!
//! ```no_run
//! use soul_ingest::{FfmpegEngine, Ingestor, LocalAssetSink};
//! use std::path::{Path, PathBuf};
//! use std::sync::Arc;
//!
//! # async fn example() -> soul_ingest::Result<()> {
//! let engine = Arc::new(FfmpegEngine::default());
//! let sink = Arc::new(LocalAssetSink::new(PathBuf::from("uploads/album_art")));
//! let ingestor = Ingestor::new(engine, sink);
//!
//! let result = ingestor.ingest(Path::new("song.mp3"), 100).await?;
//! println!("{} - {}", result.metadata.artist, result.metadata.title);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod artwork;
mod cleanup;
pub mod engine;
pub mod error;
pub mod ingestor;
pub mod pcm;
pub mod probe;
pub mod scanner;
pub mod sink;

pub use artwork::{extract_art, ArtworkOutcome, CoverArtAsset, PictureHint};
pub use engine::{ContainerInfo, DecodingEngine, FfmpegEngine, PcmFormat};
pub use error::{
    DecodeError, DegradedReason, Diagnostic, EngineError, Feature, IngestError, Result, SinkError,
};
pub use ingestor::{IngestOptions, IngestionResult, Ingestor, Stage};
pub use pcm::{decode_for_analysis, PcmBuffer};
pub use probe::{probe, ProbeResult, TagField, TagOverrides, TAG_DEFAULTS};
pub use scanner::{LibraryScanner, ScanOptions, ScanProgress, ScanReport, DEFAULT_EXTENSIONS};
pub use sink::{AssetSink, LocalAssetSink};

pub use soul_waveform::{downsample, WaveformEnvelope, WaveformError, DEFAULT_POINTS};
