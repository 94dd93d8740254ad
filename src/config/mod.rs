//! Engine configuration.
//!
//! Provides the [`SyncSettings`] struct loaded from a TOML file, replacing
//! hardcoded endpoints and intervals with host-tunable values.
//!
//! ## Loading Order
//!
//! 1. `HERBLOCK_CONFIG` environment variable (path to TOML file)
//! 2. `herblock.toml` in the current working directory
//! 3. Built-in defaults (matching `config::defaults`)

pub mod defaults;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Engine settings for one device.
///
/// Every field has a default, so a partial TOML file only overrides what it
/// names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Base URL of the remote ledger API.
    pub api_url: String,
    /// Timeout for a single submission request (seconds).
    pub submit_timeout_secs: u64,
    /// Timeout for the reachability health probe (seconds).
    pub health_timeout_secs: u64,
    /// Reachability polling interval (seconds).
    pub reachability_poll_secs: u64,
    /// Base interval between background sync rounds (seconds).
    pub auto_sync_interval_secs: u64,
    /// Random jitter added to the auto-sync interval (seconds).
    pub auto_sync_jitter_secs: u64,
    /// Maximum age of a cached credential for offline login (days).
    pub credential_ttl_days: i64,
    /// Directory for the local event database.
    pub data_dir: PathBuf,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            submit_timeout_secs: defaults::SUBMIT_TIMEOUT_SECS,
            health_timeout_secs: defaults::HEALTH_TIMEOUT_SECS,
            reachability_poll_secs: defaults::REACHABILITY_POLL_INTERVAL_SECS,
            auto_sync_interval_secs: defaults::AUTO_SYNC_INTERVAL_SECS,
            auto_sync_jitter_secs: defaults::AUTO_SYNC_JITTER_SECS,
            credential_ttl_days: defaults::CREDENTIAL_TTL_DAYS,
            data_dir: PathBuf::from("herblock-data"),
        }
    }
}

impl SyncSettings {
    /// Load settings using the documented search order.
    ///
    /// Falls back to built-in defaults when no file is found or a file fails
    /// to parse; a bad config should degrade the engine, not brick the app.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("HERBLOCK_CONFIG") {
            match Self::from_file(&path) {
                Ok(settings) => {
                    tracing::info!(path = %path, "Settings loaded from HERBLOCK_CONFIG");
                    return settings;
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to load HERBLOCK_CONFIG, trying fallbacks");
                }
            }
        }

        let cwd_config = Path::new("herblock.toml");
        if cwd_config.exists() {
            match Self::from_file(cwd_config) {
                Ok(settings) => {
                    tracing::info!("Settings loaded from ./herblock.toml");
                    return settings;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to parse ./herblock.toml, using defaults");
                }
            }
        }

        tracing::debug!("No settings file found, using built-in defaults");
        Self::default()
    }

    /// Load settings from an explicit TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        let settings: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))?;
        Ok(settings)
    }
}
