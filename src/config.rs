//! The structures and functions for configuration. Must be accessible to main.
//!
//! Settings come from an optional RON file. Anything left out of the file
//! keeps its default, and a few settings can be overridden on the command
//! line.

use crate::error::Error;
use ron::de::from_str;
use serde::Deserialize;
use slog::debug;
use std::{env, path::PathBuf};

/// The overall options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    /// The directory holding `locales-<lang>.xml`. Defaults to the
    /// executable's directory.
    pub locales_dir: Option<PathBuf>,
    /// The languages to load locale files for.
    pub locales: Vec<String>,
    /// The raw-inline format given to the replaced citations.
    pub raw_format: String,
}

impl Config {
    pub fn new(
        engine: EngineConfig,
        locales_dir: Option<PathBuf>,
        locales: Vec<String>,
        raw_format: String,
    ) -> Config {
        Config {
            engine,
            locales_dir,
            locales,
            raw_format,
        }
    }

    /// Apply the command-line overrides.
    pub fn with_overrides(mut self, engine: Option<&str>, locales_dir: Option<&str>) -> Config {
        if let Some(e) = engine {
            debug!(slog_scope::logger(), "Engine command overridden: {}", e);
            self.engine.command = e.to_string();
        }
        if let Some(l) = locales_dir {
            debug!(slog_scope::logger(), "Locale directory overridden: {}", l);
            self.locales_dir = Some(PathBuf::from(l));
        }
        self
    }

    /// The directory to read locale files from.
    pub fn locales_dir(&self) -> PathBuf {
        match &self.locales_dir {
            Some(d) => d.clone(),
            None => env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new(
            EngineConfig::default(),
            None,
            vec!["en-US".to_string(), "ja-JP".to_string()],
            "markdown".to_string(),
        )
    }
}

/// Citation engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The program hosting the engine.
    pub command: String,
    pub args: Vec<String>,
    /// The default locale handed to the engine.
    pub lang: String,
}

impl EngineConfig {
    pub fn new(command: String, args: Vec<String>, lang: String) -> EngineConfig {
        EngineConfig {
            command,
            args,
            lang,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig::new("citeproc-bridge".to_string(), Vec::new(), "en-US".to_string())
    }
}

/// Deserialize a RON configuration file.
pub fn build_config(input: &str) -> Result<Config, Error> {
    match from_str(input) {
        Ok(c) => {
            debug!(slog_scope::logger(), "Configuration file parsed");
            Ok(c)
        }
        Err(e) => Err(Error::Config(e.to_string())),
    }
}
