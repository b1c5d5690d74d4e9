//! Streaming file decoder using Symphonia
//!
//! Decodes one packet at a time into a reusable interleaved f32 buffer, so a
//! file is never held in memory whole. Every Symphonia sample format goes
//! through `SampleBuffer<f32>`, which normalises to [-1.0, 1.0].
//!
//! Conversion buffers are sized from the codec's maximum packet length when
//! the file is opened. The format reader still allocates each packet it
//! reads; nothing else on the read path does unless a packet is longer than
//! the codec advertised.
//!
//! Seeks use `SeekMode::Accurate` and then discard decoded frames up to the
//! requested frame, so the cursor lands on the exact sample.

use crate::error::{AudioError, Result};
use osuradio_playback::{AudioDecoder, DecoderFactory};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::{Channels, SampleBuffer, SignalSpec};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::TimeBase;
use tracing::{debug, warn};

/// Decoder for a local audio file
pub struct SymphoniaDecoder {
    path: PathBuf,
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: TimeBase,
    sample_rate: u32,
    channels: u16,
    total_frames: u64,

    /// Frames handed out so far
    cursor: u64,

    /// Decoded frames not yet handed out, interleaved at `channels`
    pending: Vec<f32>,
    pending_len: usize,
    pending_pos: usize,

    /// Frames still to discard after an accurate seek
    skip_frames: u64,

    sample_buf: SampleBuffer<f32>,
    eof: bool,
}

/// Packet length assumed when the codec does not report one
const DEFAULT_PACKET_FRAMES: u64 = 8192;

/// Probe `path` and return the reader plus its default track id
fn probe(path: &Path) -> Result<(Box<dyn FormatReader>, u32)> {
    let file = File::open(path)
        .map_err(|e| AudioError::Decode(format!("Failed to open {}: {}", path.display(), e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let format = probed.format;
    let track_id = format
        .default_track()
        .ok_or_else(|| AudioError::Decode(format!("No audio track in {}", path.display())))?
        .id;

    Ok((format, track_id))
}

/// Count frames by walking every packet of the default track
fn count_frames(path: &Path) -> Result<u64> {
    let (mut format, track_id) = probe(path)?;
    let mut frames = 0u64;

    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => frames += packet.dur,
            Ok(_) => {}
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(frames)
}

impl SymphoniaDecoder {
    /// Open `path` for streaming
    ///
    /// Only the container header is read, unless the container does not
    /// report a frame count, in which case the packets are counted once.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (format, track_id) = probe(&path)?;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.id == track_id)
            .ok_or_else(|| AudioError::Decode("Default track vanished".into()))?;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| AudioError::Decode(format!("Unknown sample rate: {}", path.display())))?;
        let channels = params.channels.map_or(2, |c| c.count()) as u16;
        let time_base = params.time_base.unwrap_or(TimeBase::new(1, sample_rate));

        let decoder = symphonia::default::get_codecs().make(&params, &DecoderOptions::default())?;

        let packet_frames = params
            .max_frames_per_packet
            .unwrap_or(DEFAULT_PACKET_FRAMES)
            .max(1);
        let source_channels = params
            .channels
            .unwrap_or(Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let sample_buf =
            SampleBuffer::new(packet_frames, SignalSpec::new(sample_rate, source_channels));
        let pending = vec![0.0; packet_frames as usize * usize::from(channels)];

        let total_frames = match params.n_frames {
            Some(n) => n,
            None => {
                debug!("No frame count in header, counting packets: {}", path.display());
                count_frames(&path)?
            }
        };

        debug!(
            "Opened {}: {} Hz, {} channels, {} frames",
            path.display(),
            sample_rate,
            channels,
            total_frames
        );

        Ok(Self {
            path,
            format,
            decoder,
            track_id,
            time_base,
            sample_rate,
            channels,
            total_frames,
            cursor: 0,
            pending,
            pending_len: 0,
            pending_pos: 0,
            skip_frames: 0,
            sample_buf,
            eof: false,
        })
    }

    /// File path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next packet into `pending`
    ///
    /// Returns `false` at end of stream. Corrupt packets are skipped.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.eof = true;
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping corrupt packet in {}: {}", self.path.display(), e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let src_channels = spec.channels.count().max(1);
            let out_channels = usize::from(self.channels);
            if self.sample_buf.capacity() < decoded.capacity() * src_channels {
                debug!(
                    "Packet of {} frames exceeds buffer, growing: {}",
                    decoded.capacity(),
                    self.path.display()
                );
                self.sample_buf = SampleBuffer::new(decoded.capacity() as u64, spec);
            }
            if self.pending.len() < decoded.capacity() * out_channels {
                self.pending.resize(decoded.capacity() * out_channels, 0.0);
            }
            self.sample_buf.copy_interleaved_ref(decoded);

            let samples = self.sample_buf.samples();
            let frames = samples.len() / src_channels;

            let skip = self.skip_frames.min(frames as u64) as usize;
            self.skip_frames -= skip as u64;

            self.pending_pos = 0;
            self.pending_len = (frames - skip) * out_channels;
            let pending = self.pending[..self.pending_len].chunks_exact_mut(out_channels);
            for (dst, frame) in pending.zip(samples.chunks_exact(src_channels).skip(skip)) {
                for (ch, out) in dst.iter_mut().enumerate() {
                    *out = if src_channels == 1 {
                        frame[0]
                    } else {
                        frame.get(ch).copied().unwrap_or(0.0)
                    };
                }
            }

            if self.pending_len > 0 {
                return Ok(true);
            }
        }
    }

    fn frame_to_timestamp(&self, frame: u64) -> u64 {
        let secs = frame as f64 / f64::from(self.sample_rate);
        self.time_base.calc_timestamp(Duration::from_secs_f64(secs).into())
    }

    fn timestamp_to_frames(&self, ts: u64) -> u64 {
        let time = self.time_base.calc_time(ts);
        ((time.seconds as f64 + time.frac) * f64::from(self.sample_rate)).round() as u64
    }

    fn seek_to(&mut self, frame: u64) -> Result<()> {
        let frame = frame.min(self.total_frames);
        self.pending_len = 0;
        self.pending_pos = 0;
        self.skip_frames = 0;

        if frame >= self.total_frames {
            self.cursor = self.total_frames;
            return Ok(());
        }

        let seeked = self.format.seek(
            SeekMode::Accurate,
            SeekTo::TimeStamp {
                ts: self.frame_to_timestamp(frame),
                track_id: self.track_id,
            },
        )?;
        self.decoder.reset();

        self.skip_frames =
            self.timestamp_to_frames(seeked.required_ts.saturating_sub(seeked.actual_ts));
        self.cursor = frame;
        self.eof = false;
        Ok(())
    }

    fn read_frames(&mut self, out: &mut [f32], frames: usize) -> Result<usize> {
        let channels = usize::from(self.channels);
        let remaining = (self.total_frames - self.cursor) as usize;
        let wanted = frames.min(remaining).min(out.len() / channels);

        let mut written = 0;
        while written < wanted {
            if self.pending_pos >= self.pending_len {
                if self.eof || !self.decode_next()? {
                    break;
                }
                continue;
            }

            let available = (self.pending_len - self.pending_pos) / channels;
            let n = available.min(wanted - written);
            let src = &self.pending[self.pending_pos..self.pending_pos + n * channels];
            out[written * channels..(written + n) * channels].copy_from_slice(src);

            self.pending_pos += n * channels;
            written += n;
        }

        self.cursor += written as u64;
        Ok(written)
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_frames(&self) -> u64 {
        self.total_frames
    }

    fn seek(&mut self, frame: u64) -> osuradio_playback::Result<()> {
        Ok(self.seek_to(frame)?)
    }

    fn read_block(&mut self, out: &mut [f32], frames: usize) -> osuradio_playback::Result<usize> {
        Ok(self.read_frames(out, frames)?)
    }
}

/// Opens [`SymphoniaDecoder`]s for the playback engine
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoderFactory;

impl DecoderFactory for SymphoniaDecoderFactory {
    fn open(&self, path: &Path) -> osuradio_playback::Result<Box<dyn AudioDecoder>> {
        Ok(Box::new(SymphoniaDecoder::open(path)?))
    }
}
