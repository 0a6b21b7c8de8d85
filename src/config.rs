use crate::constants::DEFAULT_BITRATE;
use crate::pipeline::OpenOptions;
use crate::process::ExecutablePaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::read_to_string;

const CONFIG_FILE: &str = "Config.toml";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Opus bitrate in bits per second
    pub bitrate: i32,

    pub executables: ExecutablePaths,

    /// Virtual sink names are `<sink_prefix>-<unique id>`
    pub sink_prefix: String,

    /// Directory for the decoder's control sockets
    pub socket_dir: PathBuf,

    /// Sink volume (0-65535) applied right after opening
    pub initial_volume: Option<u16>,

    /// Where the player binary writes encoded frames, `-` for stdout
    pub output: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bitrate: DEFAULT_BITRATE,
            executables: ExecutablePaths::default(),
            sink_prefix: "discord".to_string(),
            socket_dir: PathBuf::from("/tmp"),
            initial_volume: None,
            output: "-".to_string(),
        }
    }
}

impl Config {
    /// Pipeline parameters for playing `source` with this configuration.
    pub fn open_options(&self, source: &str) -> OpenOptions {
        OpenOptions {
            source: source.to_string(),
            bitrate: self.bitrate,
            executables: self.executables.clone(),
            sink_prefix: self.sink_prefix.clone(),
            socket_dir: self.socket_dir.clone(),
        }
    }
}

pub fn from_str(config: &str) -> Result<Config> {
    let config: Config = toml::from_str(config).context("Invalid configuration")?;
    Ok(config)
}

/// Reads `Config.toml` from the working directory, falling back to defaults
/// when the file does not exist.
pub async fn load() -> Result<Config> {
    load_from(CONFIG_FILE).await
}

pub async fn load_from(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();

    match read_to_string(path).await {
        Ok(config) => from_str(&config),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No {} found, using default configuration", path.display());
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Could not read {}", path.display())),
    }
}
