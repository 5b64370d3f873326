//! Chunked mean-absolute downsampling
//!
//! The envelope is computed as:
//! 1. `chunk = len / num_points` (integer division). The remainder past
//!    `num_points * chunk` samples is dropped.
//! 2. If `chunk == 0` the input is too short to fill one sample per point and
//!    the result is `num_points` zeros.
//! 3. Each point is the mean of `|x|` over its chunk. NaN and infinite
//!    samples count as silence.
//! 4. The whole envelope is divided by its peak. A zero peak (digital
//!    silence) leaves every value at zero.

use crate::envelope::WaveformEnvelope;
use crate::error::{Result, WaveformError};

/// Reduce `samples` to a peak-normalized envelope of exactly `num_points` values
///
/// Pure and deterministic: the same input always yields a bit-identical
/// envelope.
///
/// # Errors
/// Returns [`WaveformError::InvalidPointCount`] if `num_points` is zero.
pub fn downsample(samples: &[f32], num_points: usize) -> Result<WaveformEnvelope> {
    if num_points == 0 {
        return Err(WaveformError::InvalidPointCount(num_points));
    }

    let chunk_size = samples.len() / num_points;
    if chunk_size == 0 {
        return Ok(WaveformEnvelope::silent(num_points));
    }

    // Accumulate in f64 so long chunks don't lose precision
    let means: Vec<f64> = samples
        .chunks_exact(chunk_size)
        .take(num_points)
        .map(|chunk| {
            let sum: f64 = chunk.iter().map(|s| magnitude(*s)).sum();
            sum / chunk_size as f64
        })
        .collect();

    let peak = means.iter().copied().reduce(f64::max).unwrap_or(1.0);

    let values = if peak > 0.0 {
        means.iter().map(|m| (m / peak) as f32).collect()
    } else {
        vec![0.0; num_points]
    };

    Ok(WaveformEnvelope::from_values(values))
}

fn magnitude(sample: f32) -> f64 {
    if sample.is_finite() {
        f64::from(sample.abs())
    } else {
        0.0
    }
}
