//! Live playback session shared between the control thread and the fill routine

use crate::clock::PlaybackClock;
use crate::error::Result;
use crate::source::AudioDecoder;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// Session handle shared with the device callback
pub(crate) type SharedSession = Arc<Mutex<Session>>;

/// Lock a session, recovering from poisoning
pub(crate) fn lock(session: &SharedSession) -> MutexGuard<'_, Session> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of one fill invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FillStatus {
    /// Buffer was silenced without touching the decoder
    Silent,

    /// Decoded audio was written
    Played,

    /// The stream ran out during this call; reported once per session
    Ended,
}

/// State of one opened stream
///
/// All fields are read and written under the session mutex.
pub(crate) struct Session {
    pub(crate) id: u64,
    pub(crate) decoder: Option<Box<dyn AudioDecoder>>,
    pub(crate) clock: PlaybackClock,
    pub(crate) channels: u16,
    pub(crate) current_frame: u64,
    pub(crate) total_frames: u64,
    pub(crate) paused: bool,
    pub(crate) muted: bool,
    pub(crate) volume: f32,
    pub(crate) ended: bool,
    pub(crate) halted: bool,
}

impl Session {
    pub(crate) fn new(
        id: u64,
        decoder: Box<dyn AudioDecoder>,
        clock: PlaybackClock,
        start_frame: u64,
    ) -> Self {
        let channels = decoder.channels();
        let total_frames = decoder.total_frames();

        Self {
            id,
            decoder: Some(decoder),
            clock,
            channels,
            current_frame: start_frame.min(total_frames),
            total_frames,
            paused: false,
            muted: false,
            volume: 1.0,
            ended: false,
            halted: false,
        }
    }

    pub(crate) fn position_ms(&self) -> f64 {
        self.clock.frames_to_ms(self.current_frame)
    }

    pub(crate) fn duration_ms(&self) -> f64 {
        self.clock.frames_to_ms(self.total_frames)
    }

    /// Reposition decoder and frame counter to `ms`, clamped to the stream
    pub(crate) fn seek(&mut self, ms: f64) -> Result<()> {
        let frame = self.clock.ms_to_frame(ms).min(self.total_frames);
        if let Some(decoder) = self.decoder.as_mut() {
            decoder.seek(frame)?;
        }
        self.current_frame = frame;
        Ok(())
    }

    /// Produce the next block into `out`
    ///
    /// Runs on the device thread. Never allocates.
    pub(crate) fn fill(&mut self, out: &mut [f32]) -> FillStatus {
        if self.paused || self.ended || self.halted {
            out.fill(0.0);
            return FillStatus::Silent;
        }
        let Some(decoder) = self.decoder.as_mut() else {
            out.fill(0.0);
            return FillStatus::Silent;
        };

        let channels = usize::from(self.channels.max(1));
        let frames = out.len() / channels;
        let produced = match decoder.read_block(out, frames) {
            Ok(n) => n.min(frames),
            Err(e) => {
                warn!("Decode error mid-stream, ending track: {}", e);
                0
            }
        };

        if produced == 0 {
            out.fill(0.0);
            self.ended = true;
            return FillStatus::Ended;
        }

        let written = produced * channels;
        let gain = if self.muted { 0.0 } else { self.volume };
        if gain == 0.0 {
            out[..written].fill(0.0);
        } else if gain != 1.0 {
            for sample in &mut out[..written] {
                *sample *= gain;
            }
        }
        out[written..].fill(0.0);

        self.current_frame = (self.current_frame + produced as u64).min(self.total_frames);
        FillStatus::Played
    }
}
