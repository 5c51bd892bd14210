//! Configuration module for StatusTrail.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::probe::ProbeSettings;

/// Run configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding the probe definitions (default: "config")
    pub config_dir: PathBuf,
    /// Path of the persisted snapshot (default: "status.json")
    pub state_path: PathBuf,
    /// Directory receiving the published status files (default: "public")
    pub public_dir: PathBuf,
    /// Public status page URL, passed along with alerts
    pub status_page: String,
    /// Per-attempt probe timeout (default: 5s)
    pub probe_timeout: Duration,
    /// Delay before a failed probe is retried (default: 10s)
    pub retry_delay: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            state_path: PathBuf::from("status.json"),
            public_dir: PathBuf::from("public"),
            status_page: String::new(),
            probe_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(10),
        }
    }
}

impl RunConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `STATUSTRAIL_CONFIG_DIR`: probe definition directory (default: "config")
    /// - `STATUSTRAIL_STATE_PATH`: snapshot file (default: "status.json")
    /// - `STATUSTRAIL_PUBLIC_DIR`: published files directory (default: "public")
    /// - `STATUSTRAIL_STATUS_PAGE`: status page URL (default: empty)
    /// - `STATUSTRAIL_PROBE_TIMEOUT_SECS`: probe timeout (default: 5)
    /// - `STATUSTRAIL_RETRY_DELAY_SECS`: retry delay (default: 10)
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(dir) = lookup("STATUSTRAIL_CONFIG_DIR") {
            cfg.config_dir = PathBuf::from(dir);
        }

        if let Some(path) = lookup("STATUSTRAIL_STATE_PATH") {
            cfg.state_path = PathBuf::from(path);
        }

        if let Some(dir) = lookup("STATUSTRAIL_PUBLIC_DIR") {
            cfg.public_dir = PathBuf::from(dir);
        }

        if let Some(page) = lookup("STATUSTRAIL_STATUS_PAGE") {
            cfg.status_page = page;
        }

        if let Some(secs) = lookup("STATUSTRAIL_PROBE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                cfg.probe_timeout = Duration::from_secs(secs);
            }
        }

        if let Some(secs) = lookup("STATUSTRAIL_RETRY_DELAY_SECS") {
            if let Ok(secs) = secs.parse() {
                cfg.retry_delay = Duration::from_secs(secs);
            }
        }

        cfg
    }

    /// Settings handed to every probe built from the definitions.
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            timeout: self.probe_timeout,
            retry_delay: self.retry_delay,
        }
    }
}
