use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::profile::ProfileParams;

pub const CONFIG_FILE: &str = ".gitlog-parser.toml";

pub const DEFAULT_PROFILE: &str = "go-ethereum";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .gitlog-parser.toml.
/// All fields are optional; the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Profile used when none is given on the command line
    pub profile: Option<String>,

    /// Options passed through to `git log`
    #[serde(default)]
    pub log: LogOptions,

    /// Extra profiles, keyed by repository identifier
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileParams>,
}

/// Which history `git log` prints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogOptions {
    /// Walk every ref, not just HEAD
    pub all: bool,
    /// Only commits after this date (YYYY-MM-DD)
    pub since: Option<String>,
    /// Only commits before this date (YYYY-MM-DD)
    pub until: Option<String>,
    /// Start from this ref instead of HEAD
    pub branch: Option<String>,
    pub no_renames: bool,
    pub no_merges: bool,
    /// Include patches; without them only numstat lines are parsed
    pub show_diff: bool,
    /// Pathspecs limiting the files shown (e.g. "*.go")
    pub paths: Vec<String>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            all: true,
            since: None,
            until: None,
            branch: None,
            no_renames: false,
            no_merges: false,
            show_diff: true,
            paths: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from .gitlog-parser.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// The profile to use: an explicit choice wins over the config file.
    pub fn profile_name<'a>(&'a self, explicit: Option<&'a str>) -> &'a str {
        explicit
            .or(self.profile.as_deref())
            .unwrap_or(DEFAULT_PROFILE)
    }
}
