// Configuration file handling

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_RESULTS_DIRECTORY: &str = "ALLURE_RESULTS_DIRECTORY";
pub const ENV_HOST_NAME: &str = "ALLURE_HOST_NAME";
pub const ENV_THREAD_NAME: &str = "ALLURE_THREAD_NAME";

/// File names searched in the current directory, then the home directory
pub const CONFIG_FILE_NAMES: [&str; 2] = ["allure.toml", ".allurerc.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub results: ResultsConfig,

    /// Link patterns by link type, `{}` is replaced by the link value
    #[serde(default)]
    pub links: BTreeMap<String, String>,

    #[serde(default)]
    pub labels: LabelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsConfig {
    /// Directory results are written to
    #[serde(default = "default_results_directory")]
    pub directory: String,

    /// Pretty-print result files
    #[serde(default)]
    pub indent_output: bool,

    /// Remove previous results before the first write
    #[serde(default)]
    pub clean: bool,
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            directory: default_results_directory(),
            indent_output: false,
            clean: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LabelsConfig {
    /// Value of the `host` label, the machine host name when unset
    #[serde(default)]
    pub host: Option<String>,

    /// Value of the `thread` label, the running thread name when unset
    #[serde(default)]
    pub thread: Option<String>,
}

pub fn default_results_directory() -> String {
    String::from("allure-results")
}

impl Config {
    /// Load configuration from default locations, falling back to defaults.
    /// Environment overrides are applied on top.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::find_file() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// First existing config file, current directory first
    pub fn find_file() -> Option<PathBuf> {
        let mut dirs = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            dirs.push(cwd);
        }
        if let Some(home) = dirs::home_dir() {
            dirs.push(home);
        }

        dirs.iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|path| path.exists())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Option<Self> {
        toml::from_str(content).ok()
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = non_empty(ENV_RESULTS_DIRECTORY) {
            self.results.directory = dir;
        }
        if let Some(host) = non_empty(ENV_HOST_NAME) {
            self.labels.host = Some(host);
        }
        if let Some(thread) = non_empty(ENV_THREAD_NAME) {
            self.labels.thread = Some(thread);
        }
    }

    pub fn results_directory(&self) -> PathBuf {
        PathBuf::from(&self.results.directory)
    }

    /// Link pattern for a link type
    pub fn link_pattern(&self, link_type: &str) -> Option<&str> {
        self.links.get(link_type).map(String::as_str)
    }

    /// Generate configuration as TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
