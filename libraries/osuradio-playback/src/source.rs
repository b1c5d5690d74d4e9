//! Platform-agnostic decoder traits
//!
//! Abstracts audio decoding so the engine runs unchanged against symphonia on
//! desktop and in-memory buffers in tests.

use crate::error::{PlaybackError, Result};
use std::path::Path;

/// Incremental decoder for one opened audio file
///
/// Frames are interleaved f32 in [-1.0, 1.0] at the file's native rate.
pub trait AudioDecoder: Send {
    /// Number of interleaved channels
    fn channels(&self) -> u16;

    /// Native sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Total frames in the stream
    fn total_frames(&self) -> u64;

    /// Move the read cursor to `frame`
    ///
    /// Positions past the end clamp to `total_frames()`.
    fn seek(&mut self, frame: u64) -> Result<()>;

    /// Decode up to `frames` frames into `out`
    ///
    /// `out` must hold at least `frames * channels()` samples. Returns the
    /// number of frames written: fewer than requested on the final block, 0
    /// once the cursor sits at the end.
    fn read_block(&mut self, out: &mut [f32], frames: usize) -> Result<usize>;
}

/// Opens decoders for paths in the library
pub trait DecoderFactory: Send + Sync {
    /// Open `path` for decoding
    ///
    /// # Errors
    /// `PlaybackError::Decode` if the file is unreadable or unsupported.
    fn open(&self, path: &Path) -> Result<Box<dyn AudioDecoder>>;
}

impl<F> DecoderFactory for F
where
    F: Fn(&Path) -> Result<Box<dyn AudioDecoder>> + Send + Sync,
{
    fn open(&self, path: &Path) -> Result<Box<dyn AudioDecoder>> {
        self(path)
    }
}

/// Decoder over an interleaved in-memory buffer
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
    cursor: u64,
}

impl MemoryDecoder {
    /// Wrap interleaved `samples`
    ///
    /// A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(PlaybackError::Decode("zero channels".to_string()));
        }
        if sample_rate == 0 {
            return Err(PlaybackError::Decode("zero sample rate".to_string()));
        }
        let whole = samples.len() - samples.len() % usize::from(channels);
        samples.truncate(whole);

        Ok(Self {
            samples,
            channels,
            sample_rate,
            cursor: 0,
        })
    }

    /// `frames` frames of the constant `value` on every channel
    pub fn constant(value: f32, frames: usize, channels: u16, sample_rate: u32) -> Result<Self> {
        Self::new(
            vec![value; frames * usize::from(channels)],
            channels,
            sample_rate,
        )
    }

    /// Current read position in frames
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl AudioDecoder for MemoryDecoder {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels)) as u64
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.cursor = frame.min(self.total_frames());
        Ok(())
    }

    fn read_block(&mut self, out: &mut [f32], frames: usize) -> Result<usize> {
        let channels = usize::from(self.channels);
        let remaining = (self.total_frames() - self.cursor) as usize;
        let n = frames.min(remaining).min(out.len() / channels);

        let start = self.cursor as usize * channels;
        let len = n * channels;
        out[..len].copy_from_slice(&self.samples[start..start + len]);
        self.cursor += n as u64;

        Ok(n)
    }
}
