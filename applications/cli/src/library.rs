//! Library loading
//!
//! The scanner caches its result as `{"mtime": <f64>, "library": [...]}`.
//! A bare array of tracks is accepted too, and so are plain audio files
//! given on the command line.

use anyhow::{Context, Result};
use osuradio_playback::Track;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Artist used for files loaded without beatmap metadata
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Deserialize)]
#[serde(untagged)]
enum Snapshot {
    Cached { mtime: f64, library: Vec<Track> },
    Bare(Vec<Track>),
}

/// Load a library snapshot written by the scanner
pub fn load_snapshot(path: &Path) -> Result<Vec<Track>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read library snapshot {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&data)
        .with_context(|| format!("Invalid library snapshot {}", path.display()))?;

    let library = match snapshot {
        Snapshot::Cached { mtime, library } => {
            debug!("Snapshot taken at songs-folder mtime {}", mtime);
            library
        }
        Snapshot::Bare(library) => library,
    };

    info!("Loaded {} tracks from {}", library.len(), path.display());
    Ok(library)
}

/// Build a library from audio files, sorted by display text
pub fn from_files(paths: &[PathBuf]) -> Vec<Track> {
    let mut library: Vec<Track> = paths
        .iter()
        .map(|path| {
            let title = path
                .file_stem()
                .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
            Track::new(UNKNOWN_ARTIST, title, path.clone())
        })
        .collect();

    library.sort_by(|a, b| a.display_text.cmp(&b.display_text));
    library
}

/// Files take precedence over a snapshot; with neither the library is empty
pub fn resolve(files: &[PathBuf], snapshot: Option<&Path>) -> Result<Vec<Track>> {
    if !files.is_empty() {
        return Ok(from_files(files));
    }
    match snapshot {
        Some(path) => load_snapshot(path),
        None => Ok(Vec::new()),
    }
}
