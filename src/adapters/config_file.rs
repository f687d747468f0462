//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] over a JSON file on disk.  Fields missing from
//! the file keep their defaults; the result is validated before it is
//! returned.  Loading happens before logging is up, so nothing here logs:
//! callers report the returned [`ConfigOrigin`] once the logger exists.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::FeederConfig;

/// Config path used when neither an argument nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "petfeeder.json";

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PETFEEDER_CONFIG";

/// Where a loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    File,
    /// The file did not exist.
    Defaults,
}

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the path: explicit argument, then `PETFEEDER_CONFIG`, then
    /// `petfeeder.json` in the working directory.
    pub fn locate(arg: Option<String>) -> Self {
        let path = arg
            .or_else(|| std::env::var(CONFIG_ENV).ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load, falling back to defaults when the file does not exist.
    pub fn load_or_default(&self) -> Result<(FeederConfig, ConfigOrigin), ConfigError> {
        match self.load() {
            Ok(config) => Ok((config, ConfigOrigin::File)),
            Err(ConfigError::NotFound) => Ok((FeederConfig::default(), ConfigOrigin::Defaults)),
            Err(e) => Err(e),
        }
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            kind => ConfigError::IoError(kind),
        })?;
        let config: FeederConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
