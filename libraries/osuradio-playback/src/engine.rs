//! Playback engine
//!
//! Owns at most one [`Session`] and the output it streams through. All
//! methods run on the control thread; the fill routine handed to the output
//! runs on the device thread and shares only the session mutex and the
//! completion channel.

use crate::clock::PlaybackClock;
use crate::error::{PlaybackError, Result};
use crate::output::{AudioOutput, FillFn, StreamSpec};
use crate::session::{lock, FillStatus, Session, SharedSession};
use crate::source::DecoderFactory;
use crate::types::EngineState;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Options for [`PlaybackEngine::start`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StartOptions {
    /// Initial position in milliseconds at the effective rate
    pub start_ms: f64,

    /// Open the session paused
    pub paused: bool,
}

impl StartOptions {
    /// Start playing at `start_ms`
    pub fn at(start_ms: f64) -> Self {
        Self {
            start_ms,
            paused: false,
        }
    }
}

/// Streams one file at a time to an [`AudioOutput`]
pub struct PlaybackEngine {
    factory: Box<dyn DecoderFactory>,
    output: Box<dyn AudioOutput>,
    state: EngineState,
    session: Option<SharedSession>,
    session_id: u64,
    path: Option<PathBuf>,
    volume: f32,
    muted: bool,
    double_time: bool,
    finished_tx: Sender<u64>,
    finished_rx: Receiver<u64>,
}

impl PlaybackEngine {
    /// Create an idle engine
    pub fn new(factory: Box<dyn DecoderFactory>, output: Box<dyn AudioOutput>) -> Self {
        let (finished_tx, finished_rx) = bounded(1);

        Self {
            factory,
            output,
            state: EngineState::Idle,
            session: None,
            session_id: 0,
            path: None,
            volume: 1.0,
            muted: false,
            double_time: false,
            finished_tx,
            finished_rx,
        }
    }

    /// Open `path` and start streaming it
    ///
    /// # Errors
    /// - `InvalidState` unless the engine is idle
    /// - `Decode` if the file cannot be opened
    /// - `Device` if the output stream cannot be opened
    ///
    /// On error the engine is idle with no live decoder.
    pub fn start(&mut self, path: &Path, options: StartOptions) -> Result<()> {
        if self.state != EngineState::Idle {
            return Err(PlaybackError::InvalidState(format!(
                "cannot start from {:?}",
                self.state
            )));
        }

        self.state = EngineState::Starting;
        match self.open_session(path, options) {
            Ok(session) => {
                self.session = Some(session);
                self.path = Some(path.to_path_buf());
                self.state = if options.paused {
                    EngineState::Paused
                } else {
                    EngineState::Playing
                };
                info!(
                    "Playback started: {} at {:.0} ms",
                    path.display(),
                    options.start_ms
                );
                Ok(())
            }
            Err(e) => {
                self.state = EngineState::Idle;
                warn!("Failed to start {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    fn open_session(&mut self, path: &Path, options: StartOptions) -> Result<SharedSession> {
        let mut decoder = self.factory.open(path)?;

        let clock = PlaybackClock::new(decoder.sample_rate(), self.double_time);
        let start_frame = clock.ms_to_frame(options.start_ms).min(decoder.total_frames());
        if start_frame > 0 {
            decoder.seek(start_frame)?;
        }

        self.session_id += 1;
        let id = self.session_id;

        let mut session = Session::new(id, decoder, clock, start_frame);
        session.volume = self.volume;
        session.muted = self.muted;
        session.paused = options.paused;

        let spec = StreamSpec {
            sample_rate: clock.output_rate_hz(),
            channels: session.channels,
        };
        let session = Arc::new(Mutex::new(session));

        let fill_session = Arc::clone(&session);
        let finished_tx = self.finished_tx.clone();
        let fill: FillFn = Box::new(move |out: &mut [f32]| {
            let status = lock(&fill_session).fill(out);
            if status == FillStatus::Ended {
                let _ = finished_tx.try_send(id);
            }
        });

        debug!(
            "Opening output: {} Hz ({} native), {} channels",
            spec.sample_rate,
            clock.native_rate(),
            spec.channels
        );
        self.output.open(spec, fill).map_err(|e| match e {
            PlaybackError::Device(_) => e,
            other => PlaybackError::Device(other.to_string()),
        })?;

        Ok(session)
    }

    /// Pause the active session
    pub fn pause(&mut self) {
        if self.state == EngineState::Playing {
            self.set_paused(true);
        }
    }

    /// Resume a paused session
    pub fn resume(&mut self) {
        if self.state == EngineState::Paused {
            self.set_paused(false);
        }
    }

    /// Flip between playing and paused
    pub fn toggle_pause(&mut self) {
        match self.state {
            EngineState::Playing => self.set_paused(true),
            EngineState::Paused => self.set_paused(false),
            _ => debug!("toggle_pause ignored in {:?}", self.state),
        }
    }

    fn set_paused(&mut self, paused: bool) {
        if let Some(session) = &self.session {
            lock(session).paused = paused;
            self.state = if paused {
                EngineState::Paused
            } else {
                EngineState::Playing
            };
            debug!("Engine {:?}", self.state);
        }
    }

    /// Move the active session to `ms`, clamped to the track
    ///
    /// # Errors
    /// `InvalidState` with no active session; decoder seek failures.
    pub fn seek(&mut self, ms: f64) -> Result<()> {
        let Some(session) = self.session.as_ref().filter(|_| self.state.is_active()) else {
            return Err(PlaybackError::InvalidState("no active session".to_string()));
        };
        lock(session).seek(ms)?;
        debug!("Seeked to {:.0} ms", ms);
        Ok(())
    }

    /// Set linear volume, clamped to 0.0-1.0
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        if let Some(session) = &self.session {
            lock(session).volume = self.volume;
        }
    }

    /// Set mute
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(session) = &self.session {
            lock(session).muted = muted;
        }
    }

    /// Flip mute
    pub fn toggle_mute(&mut self) {
        self.set_muted(!self.muted);
    }

    /// Switch double-time on or off
    ///
    /// An active session is restarted at the same millisecond position with
    /// its pause state preserved.
    ///
    /// # Errors
    /// Whatever the restart returns; the engine is idle afterwards.
    pub fn set_double_time(&mut self, enabled: bool) -> Result<()> {
        if self.double_time == enabled {
            return Ok(());
        }
        self.double_time = enabled;
        debug!("Double-time {}", if enabled { "on" } else { "off" });

        if !self.state.is_active() {
            return Ok(());
        }
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let options = StartOptions {
            start_ms: self.position_ms(),
            paused: self.state == EngineState::Paused,
        };

        self.stop();
        self.start(&path, options)
    }

    /// Tear down the active session
    ///
    /// Returns once the output no longer invokes the fill routine and the
    /// decoder has been released. Teardown errors are logged.
    pub fn stop(&mut self) {
        if self.session.is_none() {
            self.drain_finished();
            self.state = EngineState::Idle;
            return;
        }
        self.state = EngineState::Stopping;
        self.teardown();
        info!("Playback stopped");
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            lock(&session).halted = true;

            if let Err(e) = self.output.close() {
                warn!("Output close failed during teardown: {}", e);
            }

            lock(&session).decoder = None;
        }

        self.drain_finished();
        self.path = None;
        self.state = EngineState::Idle;
    }

    fn drain_finished(&self) {
        while self.finished_rx.try_recv().is_ok() {}
    }

    /// Report natural completion of the live session
    ///
    /// Returns `true` exactly once per completed session, after tearing it
    /// down. Notices from sessions that were already stopped are discarded.
    pub fn poll_finished(&mut self) -> bool {
        while let Ok(id) = self.finished_rx.try_recv() {
            if self.is_live(id) {
                self.finish();
                return true;
            }
            debug!("Discarding stale completion for session {}", id);
        }
        false
    }

    /// Block up to `timeout` for the live session to complete
    pub fn wait_finished(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.session.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.finished_rx.recv_timeout(remaining) {
                Ok(id) if self.is_live(id) => {
                    self.finish();
                    return true;
                }
                Ok(id) => debug!("Discarding stale completion for session {}", id),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false
                }
            }
        }
        false
    }

    fn is_live(&self, id: u64) -> bool {
        self.session.is_some() && id == self.session_id
    }

    fn finish(&mut self) {
        self.state = EngineState::Finished;
        debug!("Session {} finished", self.session_id);
        self.teardown();
    }

    /// Current engine state
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Whether a session is playing or paused
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Whether the active session is paused
    pub fn is_paused(&self) -> bool {
        self.state == EngineState::Paused
    }

    /// Position of the active session, 0 when idle
    pub fn position_ms(&self) -> f64 {
        self.session
            .as_ref()
            .map_or(0.0, |session| lock(session).position_ms())
    }

    /// Duration of the active session at the effective rate, 0 when idle
    pub fn duration_ms(&self) -> f64 {
        self.session
            .as_ref()
            .map_or(0.0, |session| lock(session).duration_ms())
    }

    /// Effective output rate of the active session
    pub fn effective_rate(&self) -> Option<f64> {
        self.session
            .as_ref()
            .map(|session| lock(session).clock.effective_rate())
    }

    /// Linear volume applied to new and live sessions
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Whether output is muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Whether double-time is enabled
    pub fn double_time(&self) -> bool {
        self.double_time
    }

    /// Path of the active session
    pub fn current_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.session.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{AudioDecoder, MemoryDecoder};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Output that stores the fill routine so the test can pump it
    #[derive(Default)]
    struct PumpOutput {
        fill: Arc<Mutex<Option<FillFn>>>,
        spec: Arc<Mutex<Option<StreamSpec>>>,
        fail: Arc<AtomicBool>,
    }

    impl AudioOutput for PumpOutput {
        fn open(&mut self, spec: StreamSpec, fill: FillFn) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(PlaybackError::Device("no device".to_string()));
            }
            *self.spec.lock().unwrap() = Some(spec);
            *self.fill.lock().unwrap() = Some(fill);
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.fill.lock().unwrap().take();
            Ok(())
        }
    }

    type Pump = Arc<Mutex<Option<FillFn>>>;

    fn engine(frames: usize) -> (PlaybackEngine, Pump, Arc<Mutex<Option<StreamSpec>>>) {
        let output = PumpOutput::default();
        let fill = Arc::clone(&output.fill);
        let spec = Arc::clone(&output.spec);
        let factory = move |_: &Path| -> Result<Box<dyn AudioDecoder>> {
            Ok(Box::new(MemoryDecoder::constant(0.5, frames, 2, 1000)?))
        };
        (
            PlaybackEngine::new(Box::new(factory), Box::new(output)),
            fill,
            spec,
        )
    }

    fn pump(fill: &Pump, frames: usize) -> Vec<f32> {
        let mut out = vec![1.0; frames * 2];
        if let Some(f) = fill.lock().unwrap().as_mut() {
            f(&mut out);
        }
        out
    }

    #[test]
    fn start_from_non_idle_is_rejected() {
        let (mut engine, _, _) = engine(1000);
        engine.start(Path::new("a"), StartOptions::default()).unwrap();
        assert!(matches!(
            engine.start(Path::new("b"), StartOptions::default()),
            Err(PlaybackError::InvalidState(_))
        ));
        assert_eq!(engine.current_path(), Some(Path::new("a")));
    }

    #[test]
    fn start_at_offset_and_paused() {
        let (mut engine, fill, _) = engine(1000);
        engine
            .start(
                Path::new("a"),
                StartOptions {
                    start_ms: 250.0,
                    paused: true,
                },
            )
            .unwrap();

        assert_eq!(engine.state(), EngineState::Paused);
        assert_eq!(engine.position_ms(), 250.0);
        assert!(pump(&fill, 10).iter().all(|&x| x == 0.0));
        assert_eq!(engine.position_ms(), 250.0);

        engine.resume();
        pump(&fill, 10);
        assert_eq!(engine.position_ms(), 260.0);
    }

    #[test]
    fn device_failure_leaves_engine_idle() {
        let (mut engine, _, _) = engine(1000);
        // Swap in a device that refuses to open
        let output = PumpOutput::default();
        output.fail.store(true, Ordering::SeqCst);
        engine.output = Box::new(output);

        let err = engine.start(Path::new("a"), StartOptions::default());
        assert!(matches!(err, Err(PlaybackError::Device(_))));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.current_path().is_none());
    }

    #[test]
    fn completion_is_reported_once() {
        let (mut engine, fill, _) = engine(10);
        engine.start(Path::new("a"), StartOptions::default()).unwrap();

        pump(&fill, 10);
        assert!(!engine.poll_finished());
        pump(&fill, 10);
        pump(&fill, 10);

        assert!(engine.poll_finished());
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(!engine.poll_finished());
    }

    #[test]
    fn stop_discards_pending_completion() {
        let (mut engine, fill, _) = engine(10);
        engine.start(Path::new("a"), StartOptions::default()).unwrap();
        pump(&fill, 20);
        pump(&fill, 20);

        engine.stop();
        engine.start(Path::new("b"), StartOptions::default()).unwrap();
        assert!(!engine.poll_finished());
        assert!(engine.is_active());
    }

    #[test]
    fn double_time_restarts_at_same_position() {
        let (mut engine, fill, spec) = engine(10_000);
        engine.start(Path::new("a"), StartOptions::at(1500.0)).unwrap();
        engine.pause();

        engine.set_double_time(true).unwrap();
        assert_eq!(engine.state(), EngineState::Paused);
        assert_eq!(engine.effective_rate(), Some(1500.0));
        assert_eq!(spec.lock().unwrap().unwrap().sample_rate, 1500);
        assert!((engine.position_ms() - 1500.0).abs() < 1.0);
        assert!(fill.lock().unwrap().is_some());

        engine.set_double_time(false).unwrap();
        assert_eq!(engine.effective_rate(), Some(1000.0));
    }

    #[test]
    fn volume_is_clamped_and_carried_into_sessions() {
        let (mut engine, fill, _) = engine(1000);
        engine.set_volume(4.0);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(0.5);
        engine.start(Path::new("a"), StartOptions::default()).unwrap();

        assert!(pump(&fill, 4).iter().all(|&x| x == 0.25));

        engine.toggle_mute();
        assert!(pump(&fill, 4).iter().all(|&x| x == 0.0));
    }

    #[test]
    fn seek_requires_active_session() {
        let (mut engine, _, _) = engine(1000);
        assert!(matches!(
            engine.seek(10.0),
            Err(PlaybackError::InvalidState(_))
        ));
    }
}
