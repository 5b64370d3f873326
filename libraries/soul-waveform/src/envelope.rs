use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// Normalized amplitude envelope of a track
///
/// Values are in `[0, 1]` and ordered in time. An all-zero envelope is a valid
/// result for silent or degenerate input. The empty envelope stands for
/// "no waveform available" and is what ingestion stores when decoding fails.
///
/// Serializes as a plain JSON array of numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaveformEnvelope(Vec<f32>);

impl WaveformEnvelope {
    /// Envelope used when no waveform could be computed
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// All-zero envelope of `num_points` values
    pub fn silent(num_points: usize) -> Self {
        Self(vec![0.0; num_points])
    }

    pub(crate) fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Envelope values in temporal order
    pub fn values(&self) -> &[f32] {
        &self.0
    }

    /// Consume the envelope, returning the raw values
    pub fn into_values(self) -> Vec<f32> {
        self.0
    }

    /// Largest value, or `None` for an empty envelope
    pub fn peak(&self) -> Option<f32> {
        self.0.iter().copied().reduce(f32::max)
    }

    /// True if every value is zero (silence or too-short input)
    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    /// Iterate over the values by copy
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.0.iter().copied()
    }
}

impl Deref for WaveformEnvelope {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl From<WaveformEnvelope> for Vec<f32> {
    fn from(envelope: WaveformEnvelope) -> Self {
        envelope.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_envelope_has_no_peak() {
        let envelope = WaveformEnvelope::empty();
        assert!(envelope.is_empty());
        assert_eq!(envelope.peak(), None);
    }

    #[test]
    fn silent_envelope_is_all_zero() {
        let envelope = WaveformEnvelope::silent(5);
        assert_eq!(envelope.len(), 5);
        assert!(envelope.is_silent());
        assert_eq!(envelope.peak(), Some(0.0));
    }

    #[test]
    fn serializes_as_plain_array() {
        let envelope = WaveformEnvelope::from_values(vec![0.0, 0.5, 1.0]);
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, "[0.0,0.5,1.0]");

        let back: WaveformEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }
}
