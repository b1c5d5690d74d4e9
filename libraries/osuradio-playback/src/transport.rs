//! Transport controller
//!
//! Front-end facing command surface. Combines the engine, the navigator and
//! the library, and queues [`PlaybackEvent`]s for the UI to drain.

use crate::engine::{PlaybackEngine, StartOptions};
use crate::error::{PlaybackError, Result};
use crate::events::PlaybackEvent;
use crate::navigator::{NavigationTarget, PlaylistNavigator};
use crate::types::{EngineState, PlaybackConfig, RepeatMode, Track};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Snapshot of everything a UI needs to render transport controls
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportStatus {
    /// Library index of the current track
    pub index: Option<usize>,
    /// Highlighted row
    pub selected: Option<usize>,
    /// Engine state
    pub state: EngineState,
    /// Elapsed time at the effective rate
    pub position_ms: f64,
    /// Track length at the effective rate
    pub duration_ms: f64,
    /// Linear volume
    pub volume: f32,
    /// Mute flag
    pub muted: bool,
    /// Shuffle flag
    pub shuffle: bool,
    /// Repeat mode
    pub repeat: RepeatMode,
    /// Double-time flag
    pub double_time: bool,
    /// Whether transport controls should accept input
    pub controls_enabled: bool,
}

/// Drives playback of a fixed library
pub struct TransportController {
    engine: PlaybackEngine,
    navigator: PlaylistNavigator,
    library: Vec<Track>,
    selected: Option<usize>,
    controls_enabled: bool,
    restart_threshold_ms: u64,
    events: Vec<PlaybackEvent>,
}

impl TransportController {
    /// Create a controller over `library`, applying `config` to the engine
    pub fn new(library: Vec<Track>, engine: PlaybackEngine, config: &PlaybackConfig) -> Self {
        let navigator = PlaylistNavigator::new(library.len());
        Self::with_navigator(library, engine, navigator, config)
    }

    /// Create a controller with a prepared navigator
    pub fn with_navigator(
        library: Vec<Track>,
        mut engine: PlaybackEngine,
        mut navigator: PlaylistNavigator,
        config: &PlaybackConfig,
    ) -> Self {
        engine.set_volume(config.volume);
        engine.set_muted(config.muted);
        // Idle engine, so this cannot fail
        let _ = engine.set_double_time(config.double_time);
        navigator.set_shuffle(config.shuffle);
        navigator.set_repeat(config.repeat);

        Self {
            engine,
            navigator,
            library,
            selected: None,
            controls_enabled: false,
            restart_threshold_ms: config.restart_threshold_ms,
            events: Vec::new(),
        }
    }

    /// Play the track the user picked
    ///
    /// # Errors
    /// `IndexOutOfBounds` leaves everything untouched; start failures are
    /// also reported as `StartFailed` events.
    pub fn play_index(&mut self, index: usize) -> Result<()> {
        if index >= self.library.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        debug!("Manual play of {}", index);
        self.navigator.on_manual_play(index);
        self.start_session(index, 0.0, true)
    }

    /// Pause or resume; with nothing loaded, play the selected row
    pub fn toggle_play_pause(&mut self) -> Result<()> {
        if self.engine.is_active() {
            self.engine.toggle_pause();
            return Ok(());
        }
        if self.library.is_empty() {
            return Err(PlaybackError::EmptyLibrary);
        }
        let index = self.selected.unwrap_or(0);
        self.start_session(index, 0.0, true)
    }

    /// Stop playback and disable controls
    pub fn stop(&mut self) {
        self.engine.stop();
        self.disable_controls();
        self.events.push(PlaybackEvent::Stopped);
    }

    /// Advance to the next track
    pub fn next(&mut self) -> Result<()> {
        if self.navigator.current().is_none() {
            return Ok(());
        }
        match self.navigator.resolve_next() {
            NavigationTarget::Play(index) => self.start_session(index, 0.0, true),
            NavigationTarget::Stop => {
                info!("Reached end of playlist");
                self.stop();
                Ok(())
            }
        }
    }

    /// Restart the current track, or go back one past the threshold
    pub fn previous(&mut self) -> Result<()> {
        let Some(current) = self.navigator.current() else {
            return Ok(());
        };
        if self.engine.is_active() && self.engine.position_ms() > self.restart_threshold_ms as f64
        {
            debug!("Restarting {}", current);
            return self.start_session(current, 0.0, true);
        }
        match self.navigator.resolve_previous() {
            NavigationTarget::Play(index) => self.start_session(index, 0.0, true),
            NavigationTarget::Stop => {
                self.stop();
                Ok(())
            }
        }
    }

    /// Seek the current track; ignored when nothing is playing
    pub fn seek(&mut self, ms: f64) -> Result<()> {
        if !self.engine.is_active() {
            return Ok(());
        }
        self.engine.seek(ms)
    }

    /// Set linear volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.engine.set_volume(volume);
    }

    /// Set mute
    pub fn set_muted(&mut self, muted: bool) {
        self.engine.set_muted(muted);
    }

    /// Flip mute
    pub fn toggle_mute(&mut self) {
        self.engine.toggle_mute();
    }

    /// Switch double-time, restarting the current track at the same position
    pub fn set_double_time(&mut self, enabled: bool) -> Result<()> {
        let index = self.navigator.current();
        if let Err(e) = self.engine.set_double_time(enabled) {
            self.disable_controls();
            if let Some(index) = index {
                self.events.push(PlaybackEvent::StartFailed {
                    index,
                    message: e.to_string(),
                });
            }
            return Err(e);
        }
        Ok(())
    }

    /// Flip double-time
    pub fn toggle_double_time(&mut self) -> Result<()> {
        self.set_double_time(!self.engine.double_time())
    }

    /// Turn shuffle on or off
    pub fn set_shuffle(&mut self, enabled: bool) {
        self.navigator.set_shuffle(enabled);
    }

    /// Flip shuffle
    pub fn toggle_shuffle(&mut self) {
        self.set_shuffle(!self.navigator.shuffle_enabled());
    }

    /// Set the repeat mode
    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.navigator.set_repeat(mode);
    }

    /// Cycle between no repeat and repeat-one
    pub fn toggle_repeat(&mut self) {
        let next = match self.navigator.repeat() {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        };
        self.navigator.set_repeat(next);
    }

    /// Highlight a row without playing it
    pub fn select(&mut self, index: usize) -> Result<()> {
        if index >= self.library.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.selected = Some(index);
        Ok(())
    }

    /// Handle natural completion; call from the UI timer
    ///
    /// Repeat-one reopens the same track without touching navigation,
    /// otherwise playback advances.
    pub fn poll(&mut self) -> Result<()> {
        if !self.engine.poll_finished() {
            return Ok(());
        }
        let Some(index) = self.navigator.current() else {
            return Ok(());
        };
        self.events.push(PlaybackEvent::PlaybackFinished { index });

        match self.navigator.repeat() {
            RepeatMode::One => self.start_session(index, 0.0, false),
            RepeatMode::Off => self.next(),
        }
    }

    fn start_session(&mut self, index: usize, start_ms: f64, record: bool) -> Result<()> {
        let Some(track) = self.library.get(index) else {
            return Err(PlaybackError::IndexOutOfBounds(index));
        };
        let path = track.audio_path.clone();

        if record {
            self.navigator.record_play(index);
        }
        self.selected = Some(index);

        self.engine.stop();
        match self.engine.start(&path, StartOptions::at(start_ms)) {
            Ok(()) => {
                self.controls_enabled = true;
                let duration_ms = self.engine.duration_ms();
                info!("Now playing {}: {}", index, self.library[index].display_text);
                self.events.push(PlaybackEvent::TrackStarted { index, duration_ms });
                Ok(())
            }
            Err(e) => {
                warn!("Could not play {}: {}", index, e);
                self.disable_controls();
                self.events.push(PlaybackEvent::StartFailed {
                    index,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn disable_controls(&mut self) {
        self.controls_enabled = false;
        self.navigator.set_repeat(RepeatMode::Off);
        self.navigator.set_shuffle(false);
    }

    /// Take all events queued since the last call
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        std::mem::take(&mut self.events)
    }

    /// Current transport state
    pub fn status(&self) -> TransportStatus {
        TransportStatus {
            index: self.navigator.current(),
            selected: self.selected,
            state: self.engine.state(),
            position_ms: self.engine.position_ms(),
            duration_ms: self.engine.duration_ms(),
            volume: self.engine.volume(),
            muted: self.engine.is_muted(),
            shuffle: self.navigator.shuffle_enabled(),
            repeat: self.navigator.repeat(),
            double_time: self.engine.double_time(),
            controls_enabled: self.controls_enabled,
        }
    }

    /// Track at the current index
    pub fn current_track(&self) -> Option<&Track> {
        self.navigator.current().and_then(|i| self.library.get(i))
    }

    /// The library
    pub fn library(&self) -> &[Track] {
        &self.library
    }

    /// The engine
    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// The navigator
    pub fn navigator(&self) -> &PlaylistNavigator {
        &self.navigator
    }
}
