use std::{path::PathBuf, time::Duration};

use moneytracker_lib::rates::{SourceConfig, Timeouts};
use serde::{Deserialize, Serialize};

pub(crate) static BIN_NAME: &str = std::env!("CARGO_PKG_NAME");

/// Application settings, kept as YAML in the platform config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Where the records are saved. Defaults to `people.json` next to the
    /// config file.
    pub data_file: Option<PathBuf>,

    /// 0 logs warnings only, 1 info, 2 debug, 3 and above everything
    pub verbosity: u8,

    /// Seconds allowed for connecting to a rate source
    pub connect_timeout_secs: u64,

    /// Seconds allowed for a rate source to answer once connected
    pub read_timeout_secs: u64,

    /// Rate sources, tried in order
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let timeouts = Timeouts::default();
        Self {
            data_file: None,
            verbosity: 0,
            connect_timeout_secs: timeouts.connect.as_secs(),
            read_timeout_secs: timeouts.read.as_secs(),
            sources: SourceConfig::defaults(),
        }
    }
}

impl Config {
    /// Load the config file, creating it with defaults if it doesn't exist
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read or parsed
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(BIN_NAME, "config")
    }

    /// Write these settings to the config file
    ///
    /// # Errors
    ///
    /// Fails if the file can't be written
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(BIN_NAME, "config", self)
    }

    /// The per-request timeouts for rate sources
    #[must_use]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            read: Duration::from_secs(self.read_timeout_secs),
        }
    }

    /// The location of the data file
    ///
    /// # Errors
    ///
    /// Fails if no data file is configured and the platform config directory
    /// can't be determined
    pub fn data_path(&self) -> Result<PathBuf, confy::ConfyError> {
        if let Some(path) = &self.data_file {
            return Ok(path.clone());
        }

        let path = confy::get_configuration_file_path(BIN_NAME, "people")?;
        Ok(path.with_extension("json"))
    }
}
