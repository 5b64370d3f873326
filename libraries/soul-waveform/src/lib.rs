//! Waveform envelopes for Soul Ingest
//!
//! Reduces a decoded PCM stream to a small, fixed-length amplitude envelope
//! that clients draw as a track preview.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────────┐
//! │ PCM samples │ ──► │  downsample  │ ──► │ WaveformEnvelope │
//! └─────────────┘     └──────────────┘     └──────────────────┘
//!                      mean(|x|) per chunk,
//!                      peak-normalized to [0, 1]
//! ```
//!
//! # Example
//!
//! ```
//! use soul_waveform::{downsample, DEFAULT_POINTS};
//!
//! let samples: Vec<f32> = (0..8000).map(|i| (i as f32 / 8000.0).sin()).collect();
//! let envelope = downsample(&samples, DEFAULT_POINTS)?;
//!
//! assert_eq!(envelope.len(), DEFAULT_POINTS);
//! assert!(envelope.iter().all(|v| (0.0..=1.0).contains(&v)));
//! # Ok::<(), soul_waveform::WaveformError>(())
//! ```

#![deny(unsafe_code)]

mod downsample;
mod envelope;
mod error;

pub use downsample::downsample;
pub use envelope::WaveformEnvelope;
pub use error::{Result, WaveformError};

/// Number of envelope points produced when the caller does not ask for a specific count
pub const DEFAULT_POINTS: usize = 100;
