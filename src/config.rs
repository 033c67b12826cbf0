// src/config.rs
//! Runtime configuration for the feed engine.
//!
//! Environment variables win; an optional TOML file fills the rest
//! ($FEED_CONFIG_PATH, then config/feed.toml); hardcoded defaults close the
//! gaps. Nothing here is required; the engine boots with no config at all.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/feed.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Seconds between scheduled bulk refreshes.
    pub refresh_interval_secs: u64,
    /// Upper bound on a single bulk fetch round-trip.
    pub bulk_timeout_secs: u64,
    /// Soft cap on the dedup cache.
    pub dedup_cache_cap: usize,
    /// Base URL of the announcement REST collaborator.
    pub api_base_url: String,
    /// Bind address for the consumer API.
    pub listen_addr: String,
    /// Path of the local key-value state file.
    pub state_path: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            bulk_timeout_secs: 30,
            dedup_cache_cap: crate::ingest::dedup::DEFAULT_CACHE_CAP,
            api_base_url: "http://127.0.0.1:8000/api".to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            state_path: "state/feed_kv.json".to_string(),
        }
    }
}

impl FeedConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing feed config toml")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading feed config at {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Resolve config: file (env path, then default path, then built-in
    /// defaults), with per-field env overrides on top.
    pub fn load() -> Self {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            Self::from_file(&PathBuf::from(p)).unwrap_or_default()
        } else {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                Self::from_file(&default_path).unwrap_or_default()
            } else {
                Self::default()
            }
        };
        cfg.apply_env();
        cfg
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_u64("FEED_REFRESH_INTERVAL_SECS") {
            self.refresh_interval_secs = v;
        }
        if let Some(v) = env_u64("FEED_BULK_TIMEOUT_SECS") {
            self.bulk_timeout_secs = v;
        }
        if let Some(v) = env_u64("FEED_DEDUP_CACHE_CAP") {
            self.dedup_cache_cap = v as usize;
        }
        if let Ok(v) = std::env::var("FEED_API_BASE_URL") {
            if !v.trim().is_empty() {
                self.api_base_url = v;
            }
        }
        if let Ok(v) = std::env::var("FEED_LISTEN_ADDR") {
            if !v.trim().is_empty() {
                self.listen_addr = v;
            }
        }
        if let Ok(v) = std::env::var("FEED_STATE_PATH") {
            if !v.trim().is_empty() {
                self.state_path = v;
            }
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
