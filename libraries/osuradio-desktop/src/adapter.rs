//! Rate and channel adaptation between the engine and a device
//!
//! Used when the device cannot open a stream in the format the engine asked
//! for. The engine's fill routine keeps producing frames at the requested
//! rate and channel count; the adapter converts them to what the device
//! actually runs at. Buffers are sized once at construction.

use crate::error::{AudioError, Result};
use osuradio_playback::FillFn;
use rubato::{FastFixedOut, PolynomialDegree, Resampler};
use tracing::warn;

/// Converts engine-format blocks to device-format blocks
pub struct BlockAdapter {
    source_channels: usize,
    device_channels: usize,
    resampler: Option<FastFixedOut<f32>>,
    chunk_frames: usize,

    /// Interleaved engine-format scratch passed to the fill routine
    source: Vec<f32>,
    planar_in: Vec<Vec<f32>>,
    planar_out: Vec<Vec<f32>>,

    /// Device-format frames produced but not yet delivered
    pending: Vec<f32>,
    pending_len: usize,
    pending_pos: usize,
}

impl BlockAdapter {
    /// Build an adapter from `source_rate`/`source_channels` to the device format
    ///
    /// `chunk_frames` is the number of device frames produced per conversion.
    pub fn new(
        source_rate: u32,
        source_channels: u16,
        device_rate: u32,
        device_channels: u16,
        chunk_frames: usize,
    ) -> Result<Self> {
        if source_rate == 0 || device_rate == 0 || source_channels == 0 || device_channels == 0 {
            return Err(AudioError::UnsupportedFormat(format!(
                "{} Hz x{} -> {} Hz x{}",
                source_rate, source_channels, device_rate, device_channels
            )));
        }

        let source_channels = usize::from(source_channels);
        let device_channels = usize::from(device_channels);
        let chunk_frames = chunk_frames.max(1);

        let (resampler, input_max, output_max) = if source_rate == device_rate {
            (None, chunk_frames, chunk_frames)
        } else {
            let ratio = f64::from(device_rate) / f64::from(source_rate);
            let resampler = FastFixedOut::<f32>::new(
                ratio,
                1.1,
                PolynomialDegree::Linear,
                chunk_frames,
                source_channels,
            )?;
            let input_max = resampler.input_frames_max();
            let output_max = resampler.output_frames_max();
            (Some(resampler), input_max, output_max)
        };

        Ok(Self {
            source_channels,
            device_channels,
            resampler,
            chunk_frames,
            source: vec![0.0; input_max * source_channels],
            planar_in: vec![vec![0.0; input_max]; source_channels],
            planar_out: vec![vec![0.0; output_max]; source_channels],
            pending: vec![0.0; output_max * device_channels],
            pending_len: 0,
            pending_pos: 0,
        })
    }

    /// Whether rate conversion is active
    pub fn is_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    /// Fill a device buffer, pulling engine blocks from `fill` as needed
    pub fn process(&mut self, out: &mut [f32], fill: &mut FillFn) {
        let mut offset = 0;
        while offset < out.len() {
            if self.pending_pos >= self.pending_len && !self.refill(fill) {
                out[offset..].fill(0.0);
                return;
            }
            let n = (self.pending_len - self.pending_pos).min(out.len() - offset);
            out[offset..offset + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            self.pending_pos += n;
            offset += n;
        }
    }

    /// Pull one chunk from the engine and convert it into `pending`
    fn refill(&mut self, fill: &mut FillFn) -> bool {
        self.pending_pos = 0;
        self.pending_len = 0;

        let Some(resampler) = self.resampler.as_mut() else {
            let samples = self.chunk_frames * self.source_channels;
            fill(&mut self.source[..samples]);
            let source_channels = self.source_channels;
            let frames = self.source[..samples]
                .chunks_exact(source_channels)
                .zip(self.pending.chunks_exact_mut(self.device_channels));
            for (src, dst) in frames {
                map_frame(dst, |ch| src[ch], source_channels);
            }
            self.pending_len = self.chunk_frames * self.device_channels;
            return true;
        };

        let input_frames = resampler.input_frames_next();
        fill(&mut self.source[..input_frames * self.source_channels]);
        for (frame, samples) in self
            .source
            .chunks_exact(self.source_channels)
            .take(input_frames)
            .enumerate()
        {
            for (ch, &sample) in samples.iter().enumerate() {
                self.planar_in[ch][frame] = sample;
            }
        }

        let result = resampler.process_into_buffer(&self.planar_in, &mut self.planar_out, None);
        let produced = match result {
            Ok((_, produced)) => produced,
            Err(e) => {
                warn!("Resampling failed, emitting silence: {}", e);
                return false;
            }
        };

        for frame in 0..produced {
            let planar = &self.planar_out;
            let dst =
                &mut self.pending[frame * self.device_channels..(frame + 1) * self.device_channels];
            map_frame(dst, |ch| planar[ch][frame], self.source_channels);
        }
        self.pending_len = produced * self.device_channels;
        true
    }
}

/// Write one device frame from a source frame
///
/// Mono is copied to every device channel. Otherwise channels are matched by
/// position; missing device channels are dropped and extra ones zeroed.
fn map_frame(dst: &mut [f32], src: impl Fn(usize) -> f32, source_channels: usize) {
    for (ch, out) in dst.iter_mut().enumerate() {
        *out = if source_channels == 1 {
            src(0)
        } else if ch < source_channels {
            src(ch)
        } else {
            0.0
        };
    }
}
