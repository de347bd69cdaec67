// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Runtime settings for scoreseq.
//!
//! Settings are read from a YAML or TOML file, picked by extension. Every
//! field has a default so a partial file (or no file) is fine.

pub mod watcher;

pub use watcher::{ScoreEvent, ScoreWatcher};

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::midi::DEFAULT_VELOCITY;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Play a click on every quarter note
    #[serde(default)]
    pub click: bool,
    /// Delay between a quarter-note pulse and its click, in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Quiet period before a changed score is reloaded
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Note-on velocity (0-127)
    #[serde(default = "default_velocity")]
    pub velocity: u8,
    /// `tracing` filter directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_debounce_ms() -> u64 {
    100
}
fn default_velocity() -> u8 {
    DEFAULT_VELOCITY
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            click: false,
            latency_ms: 0,
            debounce_ms: default_debounce_ms(),
            velocity: default_velocity(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings from a `.yaml`, `.yml` or `.toml` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let settings = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
            Some("toml") => Self::from_toml(&contents)?,
            _ => bail!("Unsupported config format: {:?} (expected .yaml, .yml or .toml)", path),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a map
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Parse settings from a TOML string
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse TOML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    fn validate(&self) -> Result<()> {
        if self.velocity > 127 {
            bail!("velocity must be 0-127, got {}", self.velocity);
        }
        Ok(())
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
