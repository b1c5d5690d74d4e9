//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clock::DOUBLE_TIME_FACTOR;

/// Track descriptor produced by the library scanner
///
/// Immutable once scanned. The core only ever reads tracks by library index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Artist name
    pub artist: String,

    /// Track title
    pub title: String,

    /// File path for audio decoding
    pub audio_path: PathBuf,

    /// Background image shipped with the beatmap (optional)
    #[serde(default)]
    pub background_path: Option<PathBuf>,

    /// Beats per minute of the first uninherited timing point (optional)
    #[serde(default)]
    pub bpm: Option<u32>,

    /// Text shown in the library list, also the sort key
    pub display_text: String,
}

impl Track {
    /// Create a track with `display_text` derived as `"<artist> - <title>"`
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        audio_path: impl Into<PathBuf>,
    ) -> Self {
        let artist = artist.into();
        let title = title.into();
        let display_text = format!("{} - {}", artist, title);

        Self {
            artist,
            title,
            audio_path: audio_path.into(),
            background_path: None,
            bpm: None,
            display_text,
        }
    }

    /// Set the BPM
    pub fn with_bpm(mut self, bpm: u32) -> Self {
        self.bpm = Some(bpm);
        self
    }

    /// Set the background image path
    pub fn with_background(mut self, path: impl Into<PathBuf>) -> Self {
        self.background_path = Some(path.into());
        self
    }

    /// BPM label as shown next to the cover, e.g. `"BPM: 180 -> 270"` in double-time
    pub fn bpm_label(&self, double_time: bool) -> Option<String> {
        let bpm = self.bpm?;
        if double_time {
            Some(format!("BPM: {} -> {}", bpm, display_bpm(bpm, true)))
        } else {
            Some(format!("BPM: {}", bpm))
        }
    }
}

/// BPM as heard at the current rate
///
/// Double-time scales by 1.5 and rounds half to even (171 -> 256, 173 -> 260).
pub fn display_bpm(bpm: u32, double_time: bool) -> u32 {
    if double_time {
        (f64::from(bpm) * DOUBLE_TIME_FACTOR).round_ties_even() as u32
    } else {
        bpm
    }
}

/// Format a millisecond position as `MM:SS`
///
/// Minutes wrap at 60. `None` renders as `"00:00"`.
pub fn format_time(ms: Option<f64>) -> String {
    let Some(ms) = ms else {
        return "00:00".to_string();
    };
    let ms = ms.max(0.0);
    let seconds = (ms / 1000.0) as u64 % 60;
    let minutes = (ms / 60_000.0) as u64 % 60;
    format!("{:02}:{:02}", minutes, seconds)
}

/// Playback engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    /// No session
    Idle,

    /// Opening decoder and output stream
    Starting,

    /// Session live, fill routine producing audio
    Playing,

    /// Session live, fill routine emitting silence
    Paused,

    /// Tearing down the session
    Stopping,

    /// Stream exhausted, completion being reported
    Finished,
}

impl EngineState {
    /// Whether a session exists in this state
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Advance to the next track when one ends
    #[default]
    Off,

    /// Loop current track only
    One,
}

/// Configuration for the transport controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Initial linear volume (0.0-1.0, default: 0.75)
    pub volume: f32,

    /// Start muted (default: false)
    pub muted: bool,

    /// Initial shuffle state (default: false)
    pub shuffle: bool,

    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Start with double-time enabled (default: false)
    pub double_time: bool,

    /// Elapsed time after which "previous" restarts the current track (default: 3000)
    pub restart_threshold_ms: u64,

    /// Frames per fill block for headless output and device adaptation (default: 1024)
    pub block_frames: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 0.75,
            muted: false,
            shuffle: false,
            repeat: RepeatMode::Off,
            double_time: false,
            restart_threshold_ms: 3000,
            block_frames: 1024,
        }
    }
}
