//! Run configuration file.
use std::{fmt, fs, io, path::Path};

use chip8vm::prelude::*;
use serde::Deserialize;

/// Number of frames to run when the configuration does not say.
pub const DEFAULT_FRAMES: usize = 120;

/// Settings for a headless run, read from a YAML file.
///
/// ```yaml
/// clock_frequency: 700
/// quirks:
///   shift_vy: true
///   load_store_increment: true
/// seed: 42
/// frames: 300
/// keys: [5, 0xA]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    #[serde(flatten)]
    pub vm: Chip8Conf,
    /// How many 60Hz frames to run before dumping the display.
    pub frames: usize,
    /// Keys held down for the whole run.
    pub keys: Vec<KeyCode>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vm: Chip8Conf::default(),
            frames: DEFAULT_FRAMES,
            keys: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = fs::File::open(filepath.as_ref())?;
        let config: RunConfig = serde_yaml::from_reader(file)?;
        log::debug!("loaded run configuration: {:#?}", config);

        Ok(config)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Yaml(serde_yaml::Error),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read configuration: {err}"),
            Self::Yaml(err) => write!(f, "invalid configuration: {err}"),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err)
    }
}
