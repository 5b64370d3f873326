/// PCM adapter - decodes a source into mono 8 kHz samples for envelope analysis
///
/// The engine writes raw PCM into a scratch file that lives only as long as
/// this call: it is removed on success, on error and when the future is
/// dropped mid-decode.
use crate::cleanup::ScratchFile;
use crate::engine::{DecodingEngine, PcmFormat};
use crate::error::DecodeError;
use std::path::Path;

/// Decoded samples, scaled to `[-1, 1)`
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub format: PcmFormat,
}

impl PcmBuffer {
    /// Decode signed 16-bit little-endian bytes
    ///
    /// A trailing odd byte (truncated output) is ignored.
    pub fn from_s16le(bytes: &[u8], format: PcmFormat) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
            .collect();
        Self { samples, format }
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.format.channels.max(1))
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.format.sample_rate)
    }
}

/// Decode `source` into the analysis PCM layout
///
/// # Arguments
/// * `scratch_dir` - Where the intermediate file goes (OS temp dir if `None`)
pub async fn decode_for_analysis<E>(
    engine: &E,
    source: &Path,
    scratch_dir: Option<&Path>,
) -> Result<PcmBuffer, DecodeError>
where
    E: DecodingEngine + ?Sized,
{
    let format = PcmFormat::ANALYSIS;
    let scratch = ScratchFile::create_async(scratch_dir, ".pcm")
        .await
        .map_err(DecodeError::Scratch)?;

    engine
        .transcode_pcm(source, format, scratch.path())
        .await?;

    let bytes = tokio::fs::read(scratch.path())
        .await
        .map_err(DecodeError::Read)?;

    let buffer = PcmBuffer::from_s16le(&bytes, format);
    tracing::debug!(
        "Decoded {} for analysis: {} samples ({:.1}s)",
        source.display(),
        buffer.samples.len(),
        buffer.duration_seconds()
    );

    Ok(buffer)
}
