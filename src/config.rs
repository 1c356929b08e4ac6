//! Runtime configuration.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults rooted at `~/.stegdrop`
//! 2. A TOML file (`~/.stegdrop/config.toml` or `--config <file>`)
//! 3. `STEGDROP_*` environment variables

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::crypto::{resolve_key, KeyError, KeyOrigin, MessageKey, KEY_ENV_VAR};
use crate::stego::DEFAULT_MAX_PAYLOAD_BYTES;

/// Default single-view display window, in seconds.
pub const DEFAULT_VIEW_SECONDS: u64 = 10;

pub const VIEW_SECONDS_ENV_VAR: &str = "STEGDROP_VIEW_SECONDS";
pub const DATA_DIR_ENV_VAR: &str = "STEGDROP_DATA_DIR";
pub const UPLOAD_DIR_ENV_VAR: &str = "STEGDROP_UPLOAD_DIR";

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found. Unable to determine home directory.")]
    NoConfigDir,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),
}

/// Resolved settings for a postbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the message database.
    pub data_dir: PathBuf,

    /// Directory holding stego artifacts.
    pub upload_dir: PathBuf,

    /// Message key file, used when `STEGDROP_KEY` is not set.
    pub key_file: PathBuf,

    /// Largest framed payload accepted on embed or extract.
    pub max_payload_bytes: usize,

    /// How long a revealed message should stay on screen.
    pub view_seconds: u64,
}

/// Settings gathered from the file and the environment, before defaults.
/// Every field is optional so partial files work.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
    key_file: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    view_seconds: Option<u64>,
}

impl ConfigFile {
    fn read(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }

    /// Applies `STEGDROP_*` overrides.
    fn apply_env<F>(&mut self, env: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = env(DATA_DIR_ENV_VAR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = env(UPLOAD_DIR_ENV_VAR) {
            self.upload_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = env(VIEW_SECONDS_ENV_VAR) {
            let seconds = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: VIEW_SECONDS_ENV_VAR.to_string(),
                value: raw.clone(),
            })?;
            self.view_seconds = Some(seconds);
        }
        Ok(())
    }

    fn has_all_paths(&self) -> bool {
        self.data_dir.is_some() && self.upload_dir.is_some() && self.key_file.is_some()
    }

    /// Fills unset fields from defaults rooted at `base`.
    fn into_config(self, base: Option<&Path>) -> Result<Config, ConfigError> {
        let default_path = |value: Option<PathBuf>, name: &str| match (value, base) {
            (Some(value), _) => Ok(value),
            (None, Some(base)) => Ok(base.join(name)),
            (None, None) => Err(ConfigError::NoConfigDir),
        };

        Ok(Config {
            data_dir: default_path(self.data_dir, "data")?,
            upload_dir: default_path(self.upload_dir, "uploads")?,
            key_file: default_path(self.key_file, "message.key")?,
            max_payload_bytes: self.max_payload_bytes.unwrap_or(DEFAULT_MAX_PAYLOAD_BYTES),
            view_seconds: self.view_seconds.unwrap_or(DEFAULT_VIEW_SECONDS),
        })
    }
}

impl Config {
    /// Defaults rooted at `base`.
    pub fn with_base_dir(base: &Path) -> Self {
        Self {
            data_dir: base.join("data"),
            upload_dir: base.join("uploads"),
            key_file: base.join("message.key"),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            view_seconds: DEFAULT_VIEW_SECONDS,
        }
    }

    /// Loads configuration from `path` (or the default location) and the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = |name: &str| std::env::var(name).ok();
        match path {
            Some(path) => Self::load_from(path, get_config_dir, env),
            None => {
                let base = get_config_dir()?;
                Self::load_from(&base.join("config.toml"), || Ok(base.clone()), env)
            }
        }
    }

    /// Loads `path` and applies `env` overrides. A missing file yields the
    /// defaults.
    ///
    /// `base` supplies the default root directory. It is only called when
    /// the file and the environment leave a path setting unset, so a
    /// complete file works without a home directory.
    pub fn load_from<B, F>(path: &Path, base: B, env: F) -> Result<Self, ConfigError>
    where
        B: FnOnce() -> Result<PathBuf, ConfigError>,
        F: Fn(&str) -> Option<String>,
    {
        let mut file = ConfigFile::read(path)?;
        file.apply_env(env)?;

        let base = if file.has_all_paths() {
            None
        } else {
            Some(base()?)
        };
        let config = file.into_config(base.as_deref())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_payload_bytes".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Resolves the message key from `STEGDROP_KEY` or the key file,
    /// generating and persisting one on first use.
    pub fn message_key(&self) -> Result<(MessageKey, KeyOrigin), KeyError> {
        let env_value = std::env::var(KEY_ENV_VAR).ok();
        resolve_key(env_value.as_deref(), &self.key_file)
    }
}

/// Get the stegdrop config directory (`~/.stegdrop`).
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(".stegdrop"))
        .ok_or(ConfigError::NoConfigDir)
}
