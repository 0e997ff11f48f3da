//! Editor configuration
//!
//! Supplied by the host application (usually as JSON from the settings
//! endpoint). The core only reads these values.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration for one open document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// User recorded on changes and versions
    pub user: String,
    /// Disables every mutating call and keyboard command
    pub read_only: bool,
    /// Maximum undo depth (0 = unbounded)
    pub undo_limit: usize,
    /// Autosave settings
    pub autosave: AutoSaveConfig,
    /// Collaboration settings
    pub collaboration: CollaborationConfig,
}

/// Autosave settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoSaveConfig {
    pub enabled: bool,
    /// Tick interval in milliseconds
    pub interval: u64,
    /// Attempts per save cycle before giving up
    pub max_retries: u32,
    /// Flat delay between attempts in milliseconds
    pub retry_delay: u64,
    /// Timeout for a single persistence call in milliseconds
    pub request_timeout: u64,
}

/// Collaboration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollaborationConfig {
    /// Timeout for catch-up and snapshot requests in milliseconds
    pub catch_up_timeout: u64,
    /// Out-of-order remote operations held before forcing a catch-up
    pub max_buffered_ops: usize,
    /// Sequenced operations retained by the reference sequencer
    pub history_limit: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            user: "anonymous".to_string(),
            read_only: false,
            undo_limit: 500,
            autosave: AutoSaveConfig::default(),
            collaboration: CollaborationConfig::default(),
        }
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 30_000,
            max_retries: 3,
            retry_delay: 2_000,
            request_timeout: 10_000,
        }
    }
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            catch_up_timeout: 5_000,
            max_buffered_ops: 256,
            history_limit: 1_000,
        }
    }
}

impl EditorConfig {
    /// Parse configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Configuration for a given user with everything else defaulted
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }
}

impl AutoSaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

impl CollaborationConfig {
    pub fn catch_up_timeout(&self) -> Duration {
        Duration::from_millis(self.catch_up_timeout)
    }
}
