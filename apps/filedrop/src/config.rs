//! filedrop configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/filedrop/config.toml`
//! - Windows: `%APPDATA%/filedrop/config.toml`
//!
//! Every field has a default, so partial files are fine and a missing
//! file means "all defaults".

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use filedrop_protocol::DEFAULT_CHUNK_SIZE;
use filedrop_transfer::{DispatcherConfig, ReceiverConfig, SenderConfig};

/// filedrop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen address for `serve`.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Directory received files are written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Receiver address used by `send` when none is given.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Payload chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Connection timeout in seconds (0 = none).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Idle timeout per read/write in seconds (0 = none).
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,

    /// Seconds in-flight transfers get to finish on shutdown.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Compare the written file size with the declared size.
    #[serde(default = "default_true")]
    pub verify_size: bool,
}

fn default_bind() -> String {
    "0.0.0.0:5001".into()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("received_files")
}

fn default_endpoint() -> String {
    "127.0.0.1:5001".into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_io_timeout_secs() -> u64 {
    60
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            output_dir: default_output_dir(),
            endpoint: default_endpoint(),
            chunk_size: default_chunk_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            io_timeout_secs: default_io_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            verify_size: default_true(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform default
    /// location when `path` is `None`.
    ///
    /// An explicitly given file must exist; a missing default file yields
    /// the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !explicit && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn sender_config(&self) -> SenderConfig {
        SenderConfig {
            chunk_size: self.chunk_size,
            connect_timeout: secs(self.connect_timeout_secs),
            io_timeout: secs(self.io_timeout_secs),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            bind_addr: self.bind.clone(),
            output_dir: self.output_dir.clone(),
            receiver: ReceiverConfig {
                chunk_size: self.chunk_size,
                io_timeout: secs(self.io_timeout_secs),
                verify_size: self.verify_size,
            },
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }
}

/// Converts a seconds setting, treating 0 as "no limit".
fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

/// Returns the platform-specific configuration file path.
fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("filedrop").join("config.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("filedrop")
            .join("config.toml")
    }
}
