//! Runtime configuration
//!
//! Read from a TOML file with every section optional.
//!
//! # Lookup order
//!
//! ```text
//! 1. --config <path>
//! 2. $XDG_CONFIG_HOME/scriptrt/config.toml
//! 3. ~/.config/scriptrt/config.toml
//! 4. Default values
//! ```
//!
//! # Example
//!
//! ```toml
//! [scheduler]
//! instructions_per_tick = 500
//!
//! [events]
//! discard_old_events = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::runtime::clock::TICKS_PER_SEC;
use crate::runtime::scheduler::{SchedulerConfig, DEFAULT_MAX_EVENT_QUEUE};
use crate::vm::VMConfig;

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub events: EventsSection,
    #[serde(default)]
    pub rtc: RtcSection,
    #[serde(default)]
    pub log: LogSection,
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Instructions per tick, shared by every runnable script
    #[serde(default = "default_instructions_per_tick")]
    pub instructions_per_tick: usize,
    /// Longest idle period reported to the host
    #[serde(default = "default_max_idle_secs")]
    pub max_idle_secs: u64,
    /// Nested call limit per script
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
}

fn default_instructions_per_tick() -> usize {
    1000
}

fn default_max_idle_secs() -> u64 {
    60
}

fn default_max_call_depth() -> usize {
    256
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            instructions_per_tick: 1000,
            max_idle_secs: 60,
            max_call_depth: 256,
        }
    }
}

/// Event mailbox settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventsSection {
    #[serde(default = "default_max_event_queue")]
    pub max_event_queue: usize,
    /// Drop the oldest event instead of rejecting a new one when full
    #[serde(default)]
    pub discard_old_events: bool,
}

fn default_max_event_queue() -> usize {
    DEFAULT_MAX_EVENT_QUEUE
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            max_event_queue: DEFAULT_MAX_EVENT_QUEUE,
            discard_old_events: false,
        }
    }
}

/// Run-to-completion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcSection {
    /// Log progress of long run-to-completion scripts
    #[serde(default)]
    pub report_rtc_scripts: bool,
    /// Instructions between progress reports
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

fn default_report_interval() -> u64 {
    1000
}

impl Default for RtcSection {
    fn default() -> Self {
        Self {
            report_rtc_scripts: false,
            report_interval: 1000,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSection {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Parse configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::ParseError)
    }

    /// Load a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::IoError)?;
        Self::from_toml(&content)
    }

    /// Load `explicit` if given, else the user config file, else the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match get_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            instructions_per_tick: self.scheduler.instructions_per_tick.max(1),
            max_idle: self.scheduler.max_idle_secs.saturating_mul(TICKS_PER_SEC),
        }
    }

    pub fn vm_config(&self) -> VMConfig {
        VMConfig {
            max_call_depth: self.scheduler.max_call_depth,
        }
    }
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("scriptrt"));
    }

    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("scriptrt"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("scriptrt"));
    }

    None
}

/// Get the user config file path
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(toml::de::Error),
    SerializeError(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Config serialize error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}
