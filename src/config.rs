//! JSON configuration: which programs to supervise and how.
//!
//! ```json
//! {
//!   "name": "dev fleet",
//!   "buffer_lines": 100,
//!   "debounce_ms": 100,
//!   "stop_mode": "detach",
//!   "commands": [
//!     { "command": "/usr/bin/make build" },
//!     { "command": "/bin/ls -la", "buffer_lines": 500 }
//!   ]
//! }
//! ```
//!
//! Everything except `commands` is optional. The capitalised `Name`,
//! `Commands` and `ProgramCommand` keys of older files are accepted too.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::command::{RunSettings, StopMode};
use crate::error::{Result, RunboardError};

/// Default number of lines kept per program
pub const DEFAULT_BUFFER_LINES: usize = 100;

const DEFAULT_DEBOUNCE_MS: u64 = 100;

/// Configuration file as written on disk
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default, alias = "Name")]
    pub name: Option<String>,

    /// Default ring buffer capacity for every program
    #[serde(default = "default_buffer_lines")]
    pub buffer_lines: usize,

    /// Interval between "more output" notifications
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub stop_mode: StopMode,

    #[serde(alias = "Commands")]
    pub commands: Vec<ProgramEntry>,
}

/// One `commands` entry
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramEntry {
    #[serde(alias = "ProgramCommand")]
    pub command: String,

    /// Overrides the file-wide `buffer_lines`
    #[serde(default)]
    pub buffer_lines: Option<usize>,
}

fn default_buffer_lines() -> usize {
    DEFAULT_BUFFER_LINES
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

/// A program ready to be turned into a `ProgramState`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramConfig {
    pub command: String,
    pub buffer_lines: usize,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub name: Option<String>,
    pub programs: Vec<ProgramConfig>,
    pub settings: RunSettings,
}

impl TryFrom<ConfigFile> for Config {
    type Error = RunboardError;

    fn try_from(file: ConfigFile) -> Result<Self> {
        if file.commands.is_empty() {
            return Err(RunboardError::Config("no commands configured".into()));
        }
        if file.debounce_ms == 0 {
            return Err(RunboardError::Config(
                "debounce_ms must be greater than zero".into(),
            ));
        }

        let programs = file
            .commands
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                if entry.command.trim().is_empty() {
                    return Err(RunboardError::EmptyCommand { index });
                }
                let buffer_lines = entry.buffer_lines.unwrap_or(file.buffer_lines);
                if buffer_lines == 0 {
                    return Err(RunboardError::ZeroCapacity);
                }
                Ok(ProgramConfig {
                    command: entry.command,
                    buffer_lines,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Config {
            name: file.name,
            programs,
            settings: RunSettings {
                debounce_interval: Duration::from_millis(file.debounce_ms),
                stop_mode: file.stop_mode,
            },
        })
    }
}

/// Parse a configuration file without validating it
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let contents = fs::read_to_string(path)?;
    parse(&contents)
}

/// Parse configuration text without validating it
pub fn parse(contents: &str) -> Result<ConfigFile> {
    Ok(serde_json::from_str(contents)?)
}

/// Load and validate a configuration file
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    Config::try_from(load_from_path(path)?)
}

/// `config.json` in the current directory
pub fn default_config_path() -> PathBuf {
    PathBuf::from("config.json")
}
