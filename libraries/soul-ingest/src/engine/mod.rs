/// Decoding engine abstraction
///
/// The pipeline never parses containers itself. Probing, picture extraction
/// and PCM conversion are delegated to an engine: `FfmpegEngine` in
/// production, fakes and mocks in tests.
use crate::error::EngineError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;

mod ffmpeg;

pub use ffmpeg::FfmpegEngine;

/// Container-level facts reported by an engine probe
///
/// Numeric fields are kept as the engine reports them; the prober owns parsing
/// and defaulting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerInfo {
    /// Duration in seconds, as text
    pub duration: Option<String>,
    /// Overall bit rate in bits per second, as text
    pub bit_rate: Option<String>,
    /// File size in bytes, as text
    pub size: Option<String>,
    /// Container tags, keys as found in the file
    pub tags: BTreeMap<String, String>,
    /// Codec of the embedded picture stream, if the container has one
    pub picture_codec: Option<String>,
    /// Absolute index of that picture stream within the container
    pub picture_stream: Option<usize>,
}

impl ContainerInfo {
    /// Look up a tag, ignoring key case (`TITLE` and `title` both match)
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .or_else(|| {
                self.tags
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
            .map(String::as_str)
    }
}

/// Layout of the raw PCM an engine writes for analysis
///
/// Samples are signed 16-bit little-endian, interleaved when `channels > 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmFormat {
    /// Mono at 8 kHz: coarse, but fast to decode and plenty for a preview envelope
    pub const ANALYSIS: Self = Self {
        channels: 1,
        sample_rate: 8000,
    };

    /// Bytes per interleaved frame
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * 2
    }
}

/// Decoding engine contract
///
/// Implementations must report [`EngineError::UnsupportedInput`] for corrupt
/// or unknown input and [`EngineError::NoSuchStream`] when a requested stream
/// does not exist, so callers can tell the two apart.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecodingEngine: Send + Sync {
    /// Read container-level metadata without a full decode
    async fn probe(&self, source: &Path) -> Result<ContainerInfo, EngineError>;

    /// Copy an embedded picture stream verbatim into `dest`
    ///
    /// `stream` is the absolute stream index reported by [`probe`]; without
    /// one the first video stream is used.
    ///
    /// [`probe`]: DecodingEngine::probe
    async fn extract_picture(
        &self,
        source: &Path,
        stream: Option<usize>,
        dest: &Path,
    ) -> Result<(), EngineError>;

    /// Decode the audio stream into raw PCM of the given layout at `dest`
    async fn transcode_pcm(
        &self,
        source: &Path,
        format: PcmFormat,
        dest: &Path,
    ) -> Result<(), EngineError>;
}
