//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Starting auto-block threshold; the persisted value wins once set
    pub auto_block_threshold: u32,
    /// Seconds the grace window stays open after a user reload
    pub grace_window_secs: i64,
    /// Master toggle for tracking protection
    pub tracking_protection: bool,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join("sentinel.db"),
            auto_block_threshold: sentinel_engine::DEFAULT_THRESHOLD,
            grace_window_secs: 10,
            tracking_protection: true,
        }
    }

    pub fn data_dir() -> PathBuf {
        data_local_dir()
            .map(|d| d.join("Sentinel"))
            .unwrap_or_else(|| PathBuf::from(".sentinel"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

fn data_local_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_DATA_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".local/share"))
            })
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}
