//! Error types for the receiver

use thiserror::Error;

/// Result alias used throughout the crate
pub type CwResult<T> = Result<T, CwError>;

/// Errors surfaced by the receiver.
///
/// Tuning values (speed, ratios, thresholds) never end up here; they are
/// clamped instead. These variants cover contract violations by the frame
/// producer and failures of the I/O collaborators.
#[derive(Error, Debug)]
pub enum CwError {
    /// Spectrum frame does not describe a usable spectrum
    #[error("invalid spectrum frame: {0}")]
    InvalidFrame(String),

    /// Band cannot be mapped onto the frame's bins
    #[error("invalid band: {0}")]
    InvalidBand(String),

    /// Capture device or stream failure
    #[error("audio error: {0}")]
    Audio(String),

    /// Settings file could not be read or written
    #[error("settings error: {0}")]
    Settings(String),

    /// WAV input could not be decoded
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}
