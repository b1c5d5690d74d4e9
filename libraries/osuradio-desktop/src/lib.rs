//! Desktop backends for the osu!radio playback core
//!
//! This crate provides the platform pieces that `osuradio-playback` leaves
//! behind traits:
//!
//! - [`SymphoniaDecoderFactory`]: streams MP3, OGG, FLAC and WAV files from
//!   disk with sample-accurate seeking
//! - [`CpalOutput`]: cross-platform output on a dedicated audio thread
//! - [`BlockAdapter`]: rate and channel conversion when the device cannot open
//!   the stream format the engine asks for (double-time rates usually need it)
//!
//! # Example
//!
//! ```no_run
//! use osuradio_desktop::{CpalOutput, SymphoniaDecoderFactory};
//! use osuradio_playback::{PlaybackEngine, StartOptions};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let output = CpalOutput::new(1024)?;
//! let mut engine = PlaybackEngine::new(Box::new(SymphoniaDecoderFactory), Box::new(output));
//!
//! engine.start(Path::new("/songs/39804/audio.mp3"), StartOptions::default())?;
//! engine.set_double_time(true)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod adapter;
mod decoder;
mod error;
mod output;

pub use adapter::BlockAdapter;
pub use decoder::{SymphoniaDecoder, SymphoniaDecoderFactory};
pub use error::{AudioError, Result};
pub use output::CpalOutput;
