/// Cover art extraction
///
/// Copies the embedded picture stream of a container into a sink-allocated
/// file. Every failure degrades to "no art"; none of them abort ingestion.
use crate::cleanup::PendingFile;
use crate::engine::DecodingEngine;
use crate::error::{DegradedReason, EngineError};
use crate::probe::ProbeResult;
use crate::sink::AssetSink;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extracted cover image, owned by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverArtAsset {
    /// Location of the image file
    pub path: PathBuf,
    /// Image size in bytes (never zero)
    pub size_bytes: u64,
    /// MIME type derived from the picture codec
    pub mime_type: String,
}

/// Result of one extraction attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtworkOutcome {
    /// A non-empty image was written
    Extracted(CoverArtAsset),
    /// No image; nothing is left on disk
    Absent(DegradedReason),
}

impl ArtworkOutcome {
    /// The asset, if one was extracted
    pub fn into_asset(self) -> Option<CoverArtAsset> {
        match self {
            Self::Extracted(asset) => Some(asset),
            Self::Absent(_) => None,
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }
}

/// File extension for a picture codec as reported by the engine
pub fn picture_extension(codec: Option<&str>) -> &'static str {
    match codec.map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "png",
        Some("bmp") => "bmp",
        Some("gif") => "gif",
        Some("webp") => "webp",
        _ => "jpg",
    }
}

/// MIME type for an extension produced by [`picture_extension`]
pub fn mime_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/jpeg",
    }
}

/// Embedded picture stream reported for a container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PictureHint<'a> {
    /// Picture codec; only picks the file extension
    pub codec: Option<&'a str>,
    /// Absolute stream index to copy
    pub stream: Option<usize>,
}

impl<'a> PictureHint<'a> {
    pub fn from_metadata(metadata: &'a ProbeResult) -> Self {
        Self {
            codec: metadata.picture_codec.as_deref(),
            stream: metadata.picture_stream,
        }
    }
}

/// Extract the embedded picture of `source`, if any
///
/// A zero-byte output is deleted and reported as
/// [`DegradedReason::EmptyOutput`].
pub async fn extract_art<E, S>(
    engine: &E,
    sink: &S,
    source: &Path,
    hint: PictureHint<'_>,
) -> ArtworkOutcome
where
    E: DecodingEngine + ?Sized,
    S: AssetSink + ?Sized,
{
    let extension = picture_extension(hint.codec);

    let dest = match sink.allocate(extension).await {
        Ok(dest) => dest,
        Err(e) => {
            tracing::warn!("No cover art location for {}: {}", source.display(), e);
            return ArtworkOutcome::Absent(DegradedReason::Sink(e.to_string()));
        }
    };

    // Dropping the guard removes whatever the engine wrote, on every early exit
    let pending = PendingFile::new(dest);

    match engine
        .extract_picture(source, hint.stream, pending.path())
        .await
    {
        Ok(()) => {}
        Err(EngineError::NoSuchStream(_)) => {
            tracing::debug!("No embedded picture in {}", source.display());
            return ArtworkOutcome::Absent(DegradedReason::NoPictureStream);
        }
        Err(e) => {
            tracing::warn!("Cover art extraction failed for {}: {}", source.display(), e);
            return ArtworkOutcome::Absent(DegradedReason::Engine(e.to_string()));
        }
    }

    let size_bytes = match tokio::fs::metadata(pending.path()).await {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => {
            tracing::warn!(
                "Cannot stat cover art {}: {}",
                pending.path().display(),
                e
            );
            return ArtworkOutcome::Absent(DegradedReason::Io(e.to_string()));
        }
    };

    if size_bytes == 0 {
        tracing::debug!(
            "Embedded picture in {} was empty, discarding",
            source.display()
        );
        pending.discard();
        return ArtworkOutcome::Absent(DegradedReason::EmptyOutput);
    }

    let path = pending.keep();
    tracing::debug!(
        "Extracted cover art for {} to {} ({} bytes)",
        source.display(),
        path.display(),
        size_bytes
    );

    ArtworkOutcome::Extracted(CoverArtAsset {
        path,
        size_bytes,
        mime_type: mime_type_for(extension).to_string(),
    })
}
