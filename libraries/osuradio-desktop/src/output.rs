/// CPAL-based audio output with a dedicated audio thread
use crate::adapter::BlockAdapter;
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use osuradio_playback::{AudioOutput, FillFn, PlaybackError, StreamSpec};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Commands sent to the audio thread
enum OutputCommand {
    /// Build and start a stream driving `fill`
    Open {
        spec: StreamSpec,
        fill: FillFn,
        reply: Sender<Result<()>>,
    },
    /// Drop the current stream; reply once it is gone
    Close { reply: Sender<()> },
    /// Shutdown the audio thread
    Shutdown,
}

/// CPAL audio output
///
/// **Architecture**: one long-lived audio thread owns the CPAL device and at
/// most one `Stream`. The control thread talks to it over a channel, which
/// keeps the platform-specific `Stream` off other threads. `close()` waits
/// for the audio thread to acknowledge that the stream has been dropped, so
/// the fill routine is never invoked after it returns.
pub struct CpalOutput {
    /// Channel to send commands to the audio thread
    command_tx: Sender<OutputCommand>,
    /// Handle to the audio thread, joined on drop
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Create an output on the default device
    ///
    /// `block_frames` sizes the conversion chunks used when the device needs
    /// rate or channel adaptation.
    ///
    /// # Errors
    /// `DeviceNotFound` if the host has no default output device.
    pub fn new(block_frames: usize) -> Result<Self> {
        let (command_tx, command_rx) = bounded::<OutputCommand>(8);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let audio_thread = thread::Builder::new()
            .name("osuradio-audio".to_string())
            .spawn(move || {
                let host = cpal::default_host();
                let Some(device) = host.default_output_device() else {
                    let _ = ready_tx.send(Err(AudioError::DeviceNotFound));
                    return;
                };
                let _ = ready_tx.send(Ok(()));
                Self::audio_thread_run(&device, block_frames, &command_rx);
            })
            .map_err(|e| AudioError::DeviceError(e.to_string()))?;

        ready_rx.recv().map_err(|_| AudioError::WorkerGone)??;
        info!("Audio output ready");

        Ok(Self {
            command_tx,
            audio_thread: Some(audio_thread),
        })
    }

    /// Audio thread main loop
    fn audio_thread_run(
        device: &Device,
        block_frames: usize,
        command_rx: &Receiver<OutputCommand>,
    ) {
        let mut stream: Option<Stream> = None;

        while let Ok(cmd) = command_rx.recv() {
            match cmd {
                OutputCommand::Open { spec, fill, reply } => {
                    // A stale stream must never outlive a new open
                    drop(stream.take());
                    let result = match Self::build_stream(device, spec, fill, block_frames) {
                        Ok(s) => {
                            stream = Some(s);
                            Ok(())
                        }
                        Err(e) => Err(e),
                    };
                    let _ = reply.send(result);
                }
                OutputCommand::Close { reply } => {
                    if stream.take().is_some() {
                        debug!("Stream dropped");
                    }
                    let _ = reply.send(());
                }
                OutputCommand::Shutdown => break,
            }
        }

        drop(stream);
        debug!("Audio thread exiting");
    }

    /// Build and start a stream for `spec`, adapting when the device can't match it
    fn build_stream(
        device: &Device,
        spec: StreamSpec,
        mut fill: FillFn,
        block_frames: usize,
    ) -> Result<Stream> {
        let err_fn = |err: cpal::StreamError| warn!("Audio stream error: {}", err);

        let stream = if Self::supports(device, spec)? {
            let config = StreamConfig {
                channels: spec.channels,
                sample_rate: spec.sample_rate,
                buffer_size: BufferSize::Default,
            };
            debug!("Opening stream directly: {:?}", config);
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| fill(data),
                err_fn,
                None,
            )?
        } else {
            let supported = Self::fallback_config(device)?;
            let config = supported.config();
            let mut adapter = BlockAdapter::new(
                spec.sample_rate,
                spec.channels,
                config.sample_rate,
                config.channels,
                block_frames,
            )?;
            info!(
                "Device cannot open {} Hz x{}, adapting to {} Hz x{}",
                spec.sample_rate, spec.channels, config.sample_rate, config.channels
            );
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    adapter.process(data, &mut fill);
                },
                err_fn,
                None,
            )?
        };

        stream.play()?;
        Ok(stream)
    }

    /// Whether the device has an f32 config with the requested channels and rate
    fn supports(device: &Device, spec: StreamSpec) -> Result<bool> {
        let supported = device.supported_output_configs()?.any(|range| {
            range.sample_format() == SampleFormat::F32
                && range.channels() == spec.channels
                && range.min_sample_rate() <= spec.sample_rate
                && spec.sample_rate <= range.max_sample_rate()
        });
        Ok(supported)
    }

    /// The device default config, or an f32 config at the default rate
    fn fallback_config(device: &Device) -> Result<SupportedStreamConfig> {
        let default = device.default_output_config()?;
        if default.sample_format() == SampleFormat::F32 {
            return Ok(default);
        }

        let rate = default.sample_rate();
        let mut f32_ranges: Vec<_> = device
            .supported_output_configs()?
            .filter(|range| {
                range.sample_format() == SampleFormat::F32
                    && range.min_sample_rate() <= rate
                    && rate <= range.max_sample_rate()
            })
            .collect();
        f32_ranges.sort_by_key(|range| range.channels() != default.channels());

        f32_ranges
            .into_iter()
            .next()
            .map(|range| range.with_sample_rate(rate))
            .ok_or_else(|| {
                AudioError::UnsupportedFormat(format!(
                    "no f32 output config at {} Hz (default is {:?})",
                    rate,
                    default.sample_format()
                ))
            })
    }

    fn request_open(&self, spec: StreamSpec, fill: FillFn) -> Result<()> {
        let (reply, reply_rx) = bounded(1);
        self.command_tx
            .send(OutputCommand::Open { spec, fill, reply })
            .map_err(|_| AudioError::WorkerGone)?;
        reply_rx.recv().map_err(|_| AudioError::WorkerGone)?
    }

    fn request_close(&self) -> Result<()> {
        let (reply, reply_rx) = bounded(1);
        self.command_tx
            .send(OutputCommand::Close { reply })
            .map_err(|_| AudioError::WorkerGone)?;
        reply_rx.recv().map_err(|_| AudioError::WorkerGone)
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, spec: StreamSpec, fill: FillFn) -> osuradio_playback::Result<()> {
        self.request_open(spec, fill).map_err(PlaybackError::from)
    }

    fn close(&mut self) -> osuradio_playback::Result<()> {
        self.request_close().map_err(PlaybackError::from)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
        if let Some(handle) = self.audio_thread.take() {
            if handle.join().is_err() {
                warn!("Audio thread panicked");
            }
        }
    }
}
