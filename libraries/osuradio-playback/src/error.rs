//! Error types for playback management

use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Audio file is missing, corrupt or in an unsupported format
    #[error("Decode error: {0}")]
    Decode(String),

    /// Output stream could not be opened or started
    #[error("Device error: {0}")]
    Device(String),

    /// Operation is not valid in the current engine state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Library index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Library has no tracks
    #[error("Library is empty")]
    EmptyLibrary,
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
