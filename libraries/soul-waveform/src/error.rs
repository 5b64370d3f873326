//! Error types for waveform computation

use thiserror::Error;

/// Result type for waveform operations
pub type Result<T> = std::result::Result<T, WaveformError>;

/// Errors that can occur while building an envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaveformError {
    /// An envelope needs at least one point
    #[error("Invalid point count: {0} (must be at least 1)")]
    InvalidPointCount(usize),
}
