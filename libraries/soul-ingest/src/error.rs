//! Error types for the ingestion pipeline
//!
//! Failures fall into two tiers:
//! - [`IngestError`] is fatal. The file cannot be read as audio and callers
//!   must not store it as a track.
//! - [`Diagnostic`] records a degraded feature (cover art or waveform). The
//!   ingestion still succeeds, with the affected field left empty.

use crate::ingestor::Stage;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors reported by a decoding engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input is corrupt, empty, or in a format the engine cannot parse
    #[error("Unsupported or corrupt input: {0}")]
    UnsupportedInput(String),

    /// The container has no stream of the requested kind
    #[error("No such stream: {0}")]
    NoSuchStream(String),

    /// The engine ran but failed for another reason
    #[error("Decoding engine failed: {0}")]
    Failed(String),

    /// The engine binary could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Engine output could not be parsed
    #[error("Malformed engine output: {0}")]
    MalformedOutput(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by an asset sink
#[derive(Debug, Error)]
pub enum SinkError {
    /// Destination could not be prepared
    #[error("Asset location unavailable: {0}")]
    Unavailable(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from decoding a source into analysis PCM
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Decoding engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Scratch file could not be created
    #[error("Failed to create scratch file: {0}")]
    Scratch(#[source] std::io::Error),

    /// Decoded PCM could not be read back
    #[error("Failed to read decoded PCM: {0}")]
    Read(#[source] std::io::Error),
}

/// Fatal ingestion errors
#[derive(Debug, Error)]
pub enum IngestError {
    /// Source file does not exist
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Caller supplied an invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Container could not be probed
    #[error("Failed to probe {}: {source}", .path.display())]
    Probe {
        path: PathBuf,
        #[source]
        source: EngineError,
    },

    /// A fatal stage exceeded its time limit
    #[error("{stage} stage timed out after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    /// The ingestor was shut down while work was pending
    #[error("Ingestion cancelled")]
    Cancelled,

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IngestError {
    /// True if the source itself was rejected (as opposed to a caller or
    /// runtime problem), meaning the file must not be stored as a track
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_) | Self::Probe { .. } | Self::Timeout { .. }
        )
    }
}

/// Optional output of an ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    CoverArt,
    Waveform,
}

/// Why an optional feature is missing from an ingestion result
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradedReason {
    /// Container carries no embedded picture
    #[error("no embedded picture stream")]
    NoPictureStream,

    /// Engine reported success but wrote nothing
    #[error("engine produced empty output")]
    EmptyOutput,

    /// Engine failed
    #[error("decoding engine error: {0}")]
    Engine(String),

    /// Asset sink could not provide a destination
    #[error("asset sink error: {0}")]
    Sink(String),

    /// Local I/O failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Stage exceeded its time limit
    #[error("timed out after {after_ms} ms")]
    TimedOut { after_ms: u64 },

    /// Ingestor was shut down
    #[error("cancelled")]
    Cancelled,

    /// Caller supplied an invalid argument
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl DegradedReason {
    /// True for outcomes that are normal for valid files (most audio carries no art)
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::NoPictureStream)
    }

    pub(crate) fn timed_out(timeout: Duration) -> Self {
        Self::TimedOut {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl From<DecodeError> for DegradedReason {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Engine(e) => Self::Engine(e.to_string()),
            DecodeError::Scratch(e) | DecodeError::Read(e) => Self::Io(e.to_string()),
        }
    }
}

/// A degraded feature, reported alongside a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub feature: Feature,
    pub reason: DegradedReason,
}

impl Diagnostic {
    pub fn new(feature: Feature, reason: DegradedReason) -> Self {
        Self { feature, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_failures_are_rejections() {
        let err = IngestError::Probe {
            path: PathBuf::from("/music/broken.mp3"),
            source: EngineError::UnsupportedInput("invalid data".to_string()),
        };
        assert!(err.is_rejection());
        assert!(err.to_string().contains("/music/broken.mp3"));

        let timeout = IngestError::Timeout {
            stage: Stage::Probe,
            timeout: Duration::from_secs(30),
        };
        assert!(timeout.is_rejection());
    }

    #[test]
    fn invalid_input_is_not_a_rejection() {
        assert!(!IngestError::InvalidInput("zero points".to_string()).is_rejection());
        assert!(!IngestError::Cancelled.is_rejection());
    }

    #[test]
    fn only_missing_picture_is_expected() {
        assert!(DegradedReason::NoPictureStream.is_expected());
        assert!(!DegradedReason::EmptyOutput.is_expected());
        assert!(!DegradedReason::timed_out(Duration::from_secs(1)).is_expected());
    }

    #[test]
    fn decode_errors_map_to_reasons() {
        let reason: DegradedReason =
            DecodeError::Engine(EngineError::Failed("exit status 1".to_string())).into();
        assert_eq!(
            reason,
            DegradedReason::Engine("Decoding engine failed: exit status 1".to_string())
        );
    }

    #[test]
    fn diagnostics_serialize_with_kind_tag() {
        let diagnostic = Diagnostic::new(
            Feature::Waveform,
            DegradedReason::timed_out(Duration::from_millis(1500)),
        );
        let json = serde_json::to_value(&diagnostic).unwrap();
        assert_eq!(json["feature"], "waveform");
        assert_eq!(json["reason"]["kind"], "timed_out");
        assert_eq!(json["reason"]["detail"]["after_ms"], 1500);
    }
}
