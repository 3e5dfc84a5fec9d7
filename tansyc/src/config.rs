//! Configuration module for the tansyc CLI.
//!
//! Settings here are read-only diagnostics surfaced to the user (GC
//! tuning, stack limits) rather than knobs the VM acts on differently —
//! the interpreter's behavior is otherwise fixed by the language
//! definition, not configurable per invocation.

use dirs::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, TansycError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "tansyc.toml";

/// Application configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Global verbose setting.
    #[serde(default)]
    pub verbose: bool,

    /// Garbage collector tuning, surfaced read-only via `tansyc info`-style
    /// output; the collector itself hardcodes these unless stress mode is on.
    #[serde(default)]
    pub gc: GcConfig,
}

/// GC tuning diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GcConfig {
    /// Run a collection before every allocation instead of only once the
    /// heap has grown past its threshold. Exercises GC correctness at the
    /// cost of throughput.
    #[serde(default)]
    pub stress: bool,

    /// Multiplier applied to `bytes_allocated` at the end of a collection
    /// to compute the next collection threshold.
    #[serde(default = "default_heap_grow_factor")]
    pub heap_grow_factor: u32,
}

fn default_heap_grow_factor() -> u32 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self { verbose: false, gc: GcConfig::default() }
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self { stress: false, heap_grow_factor: default_heap_grow_factor() }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Searches the current directory, then the user's home directory,
    /// then the system configuration directory. Returns the default
    /// configuration if no config file is found.
    pub fn load() -> Result<Self> {
        match Self::find_config_file() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TansycError::Config(format!("Configuration file not found: {}", path.display())));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| TansycError::Config(format!("Failed to parse configuration: {e}")))?;

        Ok(config)
    }

    fn check_current_dir_config() -> Option<PathBuf> {
        let path = PathBuf::from(CONFIG_FILE_NAME);
        path.exists().then_some(path)
    }

    fn check_home_config() -> Option<PathBuf> {
        home_dir()
            .map(|dir| dir.join(".config").join("tansyc").join(CONFIG_FILE_NAME))
            .filter(|path| path.exists())
    }

    fn check_system_config() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("tansyc").join(CONFIG_FILE_NAME)).filter(|path| path.exists())
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::check_current_dir_config().or_else(Self::check_home_config).or_else(Self::check_system_config)
    }
}
