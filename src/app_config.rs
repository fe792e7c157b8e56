//! Application configuration from file and environment variables
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Environment variables (prefixed with RECLAIM_)
//! 2. Config file (config.toml)
//! 3. Default values
//!
//! Secrets like the database password belong in environment variables, not in
//! the config file.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Global application configuration
pub static APP_CONFIG: Lazy<RwLock<AppConfig>> = Lazy::new(|| {
    RwLock::new(AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config file, using defaults: {}", e);
        AppConfig::default()
    }))
});

/// Site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Reclaim".to_string(),
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Matching engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Reports older than this (days since approval) are excluded from scans
    pub match_window_days: i64,
    /// Minimum similarity for a pair to be persisted and notified
    pub match_threshold: f64,
    /// Presentation-layer cutoff. Exported for UI consumers; the scan itself
    /// persists everything above match_threshold.
    pub visible_threshold: f64,
    /// Seconds between background scans
    pub scan_period_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            match_window_days: 30,
            match_threshold: 0.3,
            visible_threshold: 0.6,
            scan_period_secs: 3600,
        }
    }
}

/// Notification retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Moderation-origin notifications older than this are pruned
    pub retention_days: i64,
    /// Seconds between pruning runs
    pub prune_period_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            retention_days: 3,
            prune_period_secs: 3600,
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub matching: MatchingConfig,
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Load configuration from config.toml and RECLAIM_* environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load from an explicit file stem (no extension), still honoring env vars.
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("RECLAIM").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

/// Convenience accessor for a snapshot of the current configuration.
pub fn get_config() -> AppConfig {
    APP_CONFIG
        .read()
        .expect("APP_CONFIG lock poisoned")
        .clone()
}
