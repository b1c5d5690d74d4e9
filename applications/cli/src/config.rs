/// Front-end configuration
use anyhow::{Context, Result};
use osuradio_playback::PlaybackConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "osuradio.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Library snapshot to load when no files are given
    pub library: Option<PathBuf>,

    /// Render into a `NullOutput` instead of the audio device
    pub headless: bool,

    /// Interval of the transport poll tick
    pub poll_interval_ms: u64,

    pub playback: PlaybackConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library: None,
            headless: false,
            poll_interval_ms: 100,
            playback: PlaybackConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist. Without one, `osuradio.toml` in the
    /// working directory is used if present. Variables such as
    /// `OSURADIO_PLAYBACK__VOLUME=0.5` override the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Load with an explicit environment map in place of the process environment
    fn load_from(path: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("OSURADIO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = settings.build().context("Failed to read configuration")?;
        let config: Self = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        if self.playback.block_frames == 0 {
            anyhow::bail!("playback.block_frames must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.playback.volume) {
            anyhow::bail!("playback.volume must be between 0.0 and 1.0");
        }
        Ok(())
    }
}
