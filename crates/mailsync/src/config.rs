//! Configuration loading for the sync engine
//!
//! Supports loading settings from (in order of priority):
//! 1. JSON file in the config directory (`~/.config/mailsync/mailsync.json`)
//! 2. Runtime environment variables (fallback)

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::channel::DEFAULT_RECONNECT_DELAY;
use crate::sync::{DEFAULT_DEBOUNCE, DEFAULT_PAGE_CAP};
use crate::workspace::{DEFAULT_PAGE_SIZE, WorkspaceOptions};

/// Settings filename in the mailsync config directory
const CONFIG_FILE: &str = "mailsync.json";

const ENV_API_URL: &str = "MAILSYNC_API_URL";
const ENV_PUSH_URL: &str = "MAILSYNC_PUSH_URL";
const ENV_TOKEN: &str = "MAILSYNC_TOKEN";

/// Endpoints, credentials and tuning knobs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the data API
    pub api_url: String,
    /// Base URL of the push server (`ws://` or `wss://`)
    pub push_url: String,
    /// Bearer token for both APIs
    pub token: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pages the selection restore may load before giving up
    #[serde(default = "default_page_cap")]
    pub page_cap: u32,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_page_cap() -> u32 {
    DEFAULT_PAGE_CAP
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE.as_millis() as u64
}

fn default_reconnect_delay_secs() -> u64 {
    DEFAULT_RECONNECT_DELAY.as_secs()
}

impl SyncConfig {
    /// Load settings using the following priority:
    /// 1. JSON file (~/.config/mailsync/mailsync.json)
    /// 2. Runtime environment variables
    pub fn load() -> Result<Self> {
        if config::config_exists(CONFIG_FILE) {
            return config::load_json(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse mailsync config JSON")
    }

    /// Load settings from environment variables; knobs keep their defaults
    pub fn from_env() -> Result<Self> {
        let api_url =
            std::env::var(ENV_API_URL).with_context(|| format!("{ENV_API_URL} not set"))?;
        let push_url =
            std::env::var(ENV_PUSH_URL).with_context(|| format!("{ENV_PUSH_URL} not set"))?;
        let token = std::env::var(ENV_TOKEN).with_context(|| format!("{ENV_TOKEN} not set"))?;

        Ok(Self {
            api_url,
            push_url,
            token,
            page_size: default_page_size(),
            page_cap: default_page_cap(),
            debounce_ms: default_debounce_ms(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
        })
    }

    /// Get the default config file path (~/.config/mailsync/mailsync.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(CONFIG_FILE)
    }

    /// Check if settings are available (file or env vars)
    pub fn is_available() -> bool {
        if config::config_exists(CONFIG_FILE) {
            return true;
        }
        [ENV_API_URL, ENV_PUSH_URL, ENV_TOKEN]
            .iter()
            .all(|name| std::env::var(name).is_ok())
    }

    pub fn workspace_options(&self) -> WorkspaceOptions {
        WorkspaceOptions {
            page_size: self.page_size,
            page_cap: self.page_cap,
            debounce: Duration::from_millis(self.debounce_ms),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}
