//! Output device seam
//!
//! An [`AudioOutput`] drives the fill routine from its own context. The
//! desktop crate provides the cpal implementation; [`NullOutput`] is a
//! headless stand-in that paces the fill routine on a worker thread.

use crate::error::{PlaybackError, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

/// Fill routine invoked by the device with an interleaved buffer
pub type FillFn = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Stream format requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Frames per second the device should consume
    pub sample_rate: u32,

    /// Interleaved channel count of the buffers passed to the fill routine
    pub channels: u16,
}

/// Audio output device
pub trait AudioOutput: Send {
    /// Open a stream and start invoking `fill`
    ///
    /// # Errors
    /// `PlaybackError::Device` if the stream cannot be built or started.
    fn open(&mut self, spec: StreamSpec, fill: FillFn) -> Result<()>;

    /// Close the stream
    ///
    /// Blocks until `fill` will not be invoked again, then drops it. Closing
    /// an output with no open stream is a no-op.
    fn close(&mut self) -> Result<()>;
}

struct NullWorker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Headless output
///
/// Calls the fill routine with `block_frames`-sized blocks at real-time
/// cadence on a worker thread and discards the samples.
pub struct NullOutput {
    block_frames: usize,
    worker: Option<NullWorker>,
}

impl NullOutput {
    /// Create a headless output that pulls `block_frames` frames per call
    pub fn new(block_frames: usize) -> Self {
        Self {
            block_frames: block_frames.max(1),
            worker: None,
        }
    }

    /// Whether a stream is currently open
    pub fn is_open(&self) -> bool {
        self.worker.is_some()
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl AudioOutput for NullOutput {
    fn open(&mut self, spec: StreamSpec, mut fill: FillFn) -> Result<()> {
        if self.worker.is_some() {
            return Err(PlaybackError::Device("stream already open".to_string()));
        }
        if spec.sample_rate == 0 || spec.channels == 0 {
            return Err(PlaybackError::Device(format!(
                "unsupported stream format: {} Hz, {} channels",
                spec.sample_rate, spec.channels
            )));
        }

        let samples = self.block_frames * usize::from(spec.channels);
        let period =
            Duration::from_secs_f64(self.block_frames as f64 / f64::from(spec.sample_rate));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("osuradio-null-output".to_string())
            .spawn(move || {
                let mut buffer = vec![0.0f32; samples];
                loop {
                    fill(&mut buffer);
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;

        debug!(
            "Null output opened: {} Hz, {} channels, {} frames per block",
            spec.sample_rate, spec.channels, self.block_frames
        );
        self.worker = Some(NullWorker { stop_tx, handle });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        // The worker may have exited already; a dropped receiver is fine.
        let _ = worker.stop_tx.send(());
        worker
            .handle
            .join()
            .map_err(|_| PlaybackError::Device("null output worker panicked".to_string()))?;

        debug!("Null output closed");
        Ok(())
    }
}

impl Drop for NullOutput {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close null output: {}", e);
        }
    }
}
