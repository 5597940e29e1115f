use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoResultExt, Result};

/// default zstd level for stored objects (fast, reasonable ratio)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// repository configuration stored in config.toml
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// human-readable repository name
    #[serde(default)]
    pub name: String,
    /// author recorded on changesets when the caller gives none
    #[serde(default = "default_author")]
    pub author: String,
    /// zstd level for objects written to disk
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
    /// glob patterns (matched against working-copy relative paths) never versioned
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_author() -> String {
    "sprig".to_string()
}

fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}

fn default_ignore() -> Vec<String> {
    vec![".sprig".to_string()]
}

impl Config {
    /// create a new config for a named repository
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_path(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_path(path)?;
        Ok(())
    }

    /// compiled ignore patterns
    pub fn ignore_patterns(&self) -> Result<Vec<glob::Pattern>> {
        self.ignore
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| Error::InvalidIgnorePattern(format!("{}: {}", p, e)))
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: String::new(),
            author: default_author(),
            compression_level: default_compression_level(),
            ignore: default_ignore(),
        }
    }
}
