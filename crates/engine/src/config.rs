// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration.
//!
//! Configuration is read from a TOML file (by default
//! `$XDG_CONFIG_HOME/progsync/config.toml`) with three sections:
//! - `[queue]`: where the local store lives, the retry ceiling and retention
//! - `[sync]`: dispatch timeout and drain triggers
//! - `[remote]`: the progress API endpoint and credentials
//!
//! Every field has a default, so an empty or missing file is valid.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineOptions;
use crate::error::{EngineError, EngineResult};
use crate::sweeper::RetentionPolicy;

const APP_DIR_NAME: &str = "progsync";
const CONFIG_FILE_NAME: &str = "config.toml";
const QUEUE_FILE_NAME: &str = "queue.db";

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "PROGSYNC_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Local store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue database path. Defaults to `<state dir>/queue.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Failed attempts before an item is moved to dead letters (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Hours a synced item is kept before the sweep removes it (default: 24).
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    /// Days a dead letter is kept (default: 30).
    #[serde(default = "default_dead_letter_retention_days")]
    pub dead_letter_retention_days: u64,
}

/// Sync coordinator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound on one remote call in milliseconds (default: 10000).
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
    /// Start a drain in the background after each enqueue while online
    /// (default: true).
    #[serde(default = "default_drain_on_enqueue")]
    pub drain_on_enqueue: bool,
    /// Seconds between connectivity probes in `watch` (default: 15).
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

/// Remote progress API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the API (default: `http://localhost:54321`).
    #[serde(default = "default_remote_url")]
    pub url: String,
    /// API key sent as `apikey` and bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Name of an environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// HTTP request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_retries() -> u32 {
    ps_core::DEFAULT_MAX_RETRIES
}

fn default_retention_hours() -> u64 {
    24
}

fn default_dead_letter_retention_days() -> u64 {
    30
}

fn default_dispatch_timeout_ms() -> u64 {
    10_000
}

fn default_drain_on_enqueue() -> bool {
    true
}

fn default_probe_interval_secs() -> u64 {
    15
}

fn default_remote_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            path: None,
            max_retries: default_max_retries(),
            retention_hours: default_retention_hours(),
            dead_letter_retention_days: default_dead_letter_retention_days(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            drain_on_enqueue: default_drain_on_enqueue(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            url: default_remote_url(),
            api_key: None,
            api_key_env: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl QueueConfig {
    /// Returns the configured queue path or the default under the state dir.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => default_state_dir().join(QUEUE_FILE_NAME),
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            synced: hours(self.retention_hours),
            dead_letters: hours(self.dead_letter_retention_days.saturating_mul(24)),
        }
    }
}

fn hours(n: u64) -> chrono::Duration {
    const MAX_HOURS: u64 = (i64::MAX / 3_600_000) as u64;
    chrono::Duration::hours(n.min(MAX_HOURS) as i64)
}

impl SyncConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }
}

impl RemoteConfig {
    /// Resolves the API key from the process environment.
    ///
    /// `PROGSYNC_API_KEY` wins, then the variable named by `api_key_env`,
    /// then the literal `api_key`.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    /// Resolves the API key using `lookup` for environment access.
    pub fn api_key_with<F>(&self, lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |value: Option<String>| value.filter(|v| !v.is_empty());
        non_empty(lookup(API_KEY_ENV))
            .or_else(|| self.api_key_env.as_deref().and_then(|name| non_empty(lookup(name))))
            .or_else(|| non_empty(self.api_key.clone()))
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> EngineResult<Self> {
        toml::from_str(content)
            .map_err(|e| EngineError::Config(format!("failed to parse config: {}", e)))
    }

    /// Loads `path` if given, else the default config file if it exists,
    /// else the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> EngineResult<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Serializes the configuration as TOML.
    pub fn to_toml(&self) -> EngineResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("failed to serialize config: {}", e)))
    }

    /// Engine options derived from `[queue]` and `[sync]`.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions::from(self)
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        EngineOptions {
            max_retries: config.queue.max_retries,
            dispatch_timeout: config.sync.dispatch_timeout(),
            retention: config.queue.retention(),
            drain_on_enqueue: config.sync.drain_on_enqueue,
        }
    }
}

/// Directory for the local queue.
///
/// `$XDG_STATE_HOME/progsync` when the platform has a state dir, else
/// `~/.local/state/progsync`.
pub fn default_state_dir() -> PathBuf {
    let base = dirs::state_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("state")
    });
    base.join(APP_DIR_NAME)
}

/// Default config file location, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
