//! Playback events
//!
//! Queued by the transport controller and drained by the front end on its
//! poll tick.

use serde::{Deserialize, Serialize};

/// Events emitted by the transport controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// A session opened and is producing audio
    TrackStarted {
        /// Library index of the track
        index: usize,
        /// Track length at the effective rate
        duration_ms: f64,
    },

    /// The track ran to its end
    PlaybackFinished {
        /// Library index of the finished track
        index: usize,
    },

    /// Opening the decoder or the output failed
    StartFailed {
        /// Library index of the track that failed
        index: usize,
        /// Error message
        message: String,
    },

    /// Playback was stopped and controls disabled
    Stopped,
}
