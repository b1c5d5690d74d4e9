//! osu!radio - Playback Core
//!
//! Platform-agnostic playback engine and playlist navigation for osu!radio.
//!
//! This crate provides:
//! - Streaming playback of one track at a time through a device fill routine
//! - Sample-accurate seeking, linear volume and mute
//! - Double-time (effective rate x1.5, pitch and tempo shift together)
//! - End-of-track detection with auto-advance and repeat-one
//! - Shuffle with history and deterministic next/previous resolution
//!
//! # Architecture
//!
//! `osuradio-playback` has no device or codec dependencies. Decoding and
//! audio output are supplied through the [`DecoderFactory`] and
//! [`AudioOutput`] traits; `osuradio-desktop` implements them with
//! symphonia and cpal.
//!
//! Two contexts touch a live session: the control thread, which calls every
//! method on [`TransportController`] and [`PlaybackEngine`], and the device
//! thread, which runs the fill routine. They share one mutex per session and
//! a single-slot completion channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use osuradio_playback::{
//!     AudioDecoder, MemoryDecoder, NullOutput, PlaybackConfig, PlaybackEngine, Result, Track,
//!     TransportController,
//! };
//! use std::path::Path;
//!
//! let factory = |_: &Path| -> Result<Box<dyn AudioDecoder>> {
//!     Ok(Box::new(MemoryDecoder::constant(0.1, 44_100, 2, 44_100)?))
//! };
//! let engine = PlaybackEngine::new(Box::new(factory), Box::new(NullOutput::new(1024)));
//!
//! let library = vec![Track::new("xi", "FREEDOM DiVE", "/songs/39804/audio.mp3")];
//! let mut transport = TransportController::new(library, engine, &PlaybackConfig::default());
//!
//! transport.play_index(0)?;
//! transport.toggle_double_time()?;
//!
//! // From the UI timer
//! transport.poll()?;
//! for event in transport.drain_events() {
//!     println!("{:?}", event);
//! }
//! # Ok::<(), osuradio_playback::PlaybackError>(())
//! ```

mod clock;
mod engine;
mod error;
mod events;
mod navigator;
mod output;
mod session;
mod source;
mod transport;
pub mod types;

// Public exports
pub use clock::{PlaybackClock, DOUBLE_TIME_FACTOR};
pub use engine::{PlaybackEngine, StartOptions};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use navigator::{NavigationTarget, PlaylistNavigator};
pub use output::{AudioOutput, FillFn, NullOutput, StreamSpec};
pub use source::{AudioDecoder, DecoderFactory, MemoryDecoder};
pub use transport::{TransportController, TransportStatus};
pub use types::{display_bpm, format_time, EngineState, PlaybackConfig, RepeatMode, Track};
