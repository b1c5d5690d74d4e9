//! Shared test doubles for engine and transport tests

#![allow(dead_code)]

use osuradio_playback::{
    AudioDecoder, AudioOutput, DecoderFactory, FillFn, MemoryDecoder, PlaybackEngine,
    PlaybackError, Result, StreamSpec, Track,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const RATE: u32 = 1000;
pub const CHANNELS: u16 = 2;

/// Open/close bookkeeping shared between a factory and its decoders
#[derive(Debug, Default)]
pub struct DecoderCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    live: AtomicUsize,
    pub max_live: AtomicUsize,
}

impl DecoderCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

struct CountedDecoder {
    inner: MemoryDecoder,
    counters: Arc<DecoderCounters>,
}

impl AudioDecoder for CountedDecoder {
    fn channels(&self) -> u16 {
        self.inner.channels()
    }

    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn total_frames(&self) -> u64 {
        self.inner.total_frames()
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        self.inner.seek(frame)
    }

    fn read_block(&mut self, out: &mut [f32], frames: usize) -> Result<usize> {
        self.inner.read_block(out, frames)
    }
}

impl Drop for CountedDecoder {
    fn drop(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Factory producing constant-value decoders of a fixed length
pub struct CountingFactory {
    frames: usize,
    failing: HashSet<PathBuf>,
    counters: Arc<DecoderCounters>,
}

impl CountingFactory {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            failing: HashSet::new(),
            counters: Arc::new(DecoderCounters::default()),
        }
    }

    /// Make `path` fail to open
    pub fn failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    pub fn counters(&self) -> Arc<DecoderCounters> {
        Arc::clone(&self.counters)
    }
}

impl DecoderFactory for CountingFactory {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioDecoder>> {
        if self.failing.contains(path) {
            return Err(PlaybackError::Decode(format!(
                "unsupported file: {}",
                path.display()
            )));
        }

        let inner = MemoryDecoder::constant(0.5, self.frames, CHANNELS, RATE)?;
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(CountedDecoder {
            inner,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// Test-side handle to a [`ManualOutput`]
#[derive(Clone, Default)]
pub struct ManualDevice {
    fill: Arc<Mutex<Option<FillFn>>>,
    spec: Arc<Mutex<Option<StreamSpec>>>,
    opens: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl ManualDevice {
    /// Invoke the fill routine once with `frames` frames, if a stream is open
    pub fn pump(&self, frames: usize) -> Option<Vec<f32>> {
        let mut guard = self.fill.lock().unwrap();
        let fill = guard.as_mut()?;
        let channels = self.spec().map_or(CHANNELS, |s| s.channels);
        let mut out = vec![1.0; frames * usize::from(channels)];
        fill(&mut out);
        Some(out)
    }

    /// Pump `calls` times, stopping early once the stream is closed
    pub fn pump_many(&self, frames: usize, calls: usize) {
        for _ in 0..calls {
            if self.pump(frames).is_none() {
                break;
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.fill.lock().unwrap().is_some()
    }

    pub fn spec(&self) -> Option<StreamSpec> {
        *self.spec.lock().unwrap()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

/// Output whose fill routine only runs when the test pumps it
pub struct ManualOutput {
    device: ManualDevice,
}

impl ManualOutput {
    pub fn new() -> (Self, ManualDevice) {
        let device = ManualDevice::default();
        (
            Self {
                device: device.clone(),
            },
            device,
        )
    }
}

impl AudioOutput for ManualOutput {
    fn open(&mut self, spec: StreamSpec, fill: FillFn) -> Result<()> {
        if self.device.fail.load(Ordering::SeqCst) {
            return Err(PlaybackError::Device("device unplugged".to_string()));
        }
        let mut slot = self.device.fill.lock().unwrap();
        if slot.is_some() {
            return Err(PlaybackError::Device("stream already open".to_string()));
        }
        *slot = Some(fill);
        *self.device.spec.lock().unwrap() = Some(spec);
        self.device.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the closure here is the teardown barrier
        self.device.fill.lock().unwrap().take();
        Ok(())
    }
}

/// Engine over a counting factory and a manual output
pub fn engine(factory: CountingFactory) -> (PlaybackEngine, ManualDevice) {
    let (output, device) = ManualOutput::new();
    (
        PlaybackEngine::new(Box::new(factory), Box::new(output)),
        device,
    )
}

/// Library of `n` tracks at `/songs/<i>/audio.mp3`
pub fn library(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| {
            Track::new(
                format!("Artist {}", i),
                format!("Song {}", i),
                track_path(i),
            )
        })
        .collect()
}

pub fn track_path(i: usize) -> PathBuf {
    PathBuf::from(format!("/songs/{}/audio.mp3", i))
}
