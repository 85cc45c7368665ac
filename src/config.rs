//! Configuration loading and persistence.
//!
//! The config file is pretty-printed JSON at `<config dir>/config.json`.
//! A missing or unreadable file falls back to defaults; environment
//! variables override whatever was loaded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::constants::{RECONNECT_INITIAL_BACKOFF, RECONNECT_MAX_BACKOFF};
use crate::terminal::TerminalConfig;

/// Name of the config file inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// Configuration for the termsync CLI.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// WebSocket endpoint of the session server.
    pub server_url: String,
    /// Reconciliation engine tuning.
    pub terminal: TerminalConfig,
    /// Reconnect backoff.
    pub reconnect: ReconnectConfig,
}

/// Backoff between reconnect attempts, doubling from `initial` to `max`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectConfig {
    /// First delay in seconds.
    pub initial_backoff_secs: u64,
    /// Delay cap in seconds.
    pub max_backoff_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: RECONNECT_INITIAL_BACKOFF.as_secs(),
            max_backoff_secs: RECONNECT_MAX_BACKOFF.as_secs(),
        }
    }
}

impl ReconnectConfig {
    /// First delay.
    #[must_use]
    pub fn initial(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs.max(1))
    }

    /// Delay after `delay`, capped.
    #[must_use]
    pub fn next(&self, delay: Duration) -> Duration {
        let cap = Duration::from_secs(self.max_backoff_secs.max(self.initial_backoff_secs).max(1));
        delay.saturating_mul(2).min(cap)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:4000/socket".to_string(),
            terminal: TerminalConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `TERMSYNC_CONFIG_DIR` env var: explicit override
    /// 2. `TERMSYNC_ENV=test`: the repo's `tmp/termsync-test`
    /// 3. Default: platform config dir (Linux: ~/.config/termsync)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = env::var("TERMSYNC_CONFIG_DIR") {
            PathBuf::from(dir)
        } else if crate::env::is_test_mode() {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/termsync-test")
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("termsync")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from the config directory, with environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_dir()?.join(CONFIG_FILE);
        let mut config = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                log::warn!("[Config] {e:#}; using defaults");
                Self::default()
            })
        } else {
            Self::default()
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Read a config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Apply `TERMSYNC_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(server_url) = lookup("TERMSYNC_SERVER_URL") {
            self.server_url = server_url;
        }

        if let Some(scrollback) = lookup("TERMSYNC_SCROLLBACK") {
            match scrollback.parse::<usize>() {
                Ok(lines) => self.terminal.scrollback_lines = lines,
                Err(e) => log::warn!("[Config] ignoring TERMSYNC_SCROLLBACK={scrollback}: {e}"),
            }
        }
    }

    /// Persists the configuration to the config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Write the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
    }
}
