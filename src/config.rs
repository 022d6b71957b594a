// Media Download Core - Resumable media downloads for mobile
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Download configuration
//!
//! Attempt budget, progress throttle and HTTP client settings. Hosts either
//! build a [`DownloadConfig`] in code or load it from a JSON file.

use crate::error::{DownloadError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Total attempts allowed per download (two retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Minimum interval between progress reports
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 500;

/// Download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Maximum attempts, including the first one
    pub max_attempts: u32,

    /// Minimum milliseconds between progress reports
    pub progress_interval_ms: u64,

    /// TCP connect timeout
    pub connect_timeout_secs: u64,

    /// Timeout between body reads
    pub read_timeout_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Directory downloaded files are written to
    pub download_directory: PathBuf,

    /// Extension appended to destination files
    pub file_extension: String,

    /// Treat a stream that ends short of the known total as a failed attempt
    pub verify_length: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            connect_timeout_secs: 30,
            read_timeout_secs: 300,
            user_agent: format!("media-download-core/{}", env!("CARGO_PKG_VERSION")),
            download_directory: PathBuf::from("./downloads"),
            file_extension: "mp4".to_string(),
            verify_length: true,
        }
    }
}

impl DownloadConfig {
    /// Load configuration from a JSON file
    ///
    /// Missing fields fall back to their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// Reject settings the attempt controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DownloadError::InvalidConfiguration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.progress_interval_ms == 0 {
            return Err(DownloadError::InvalidConfiguration(
                "progress_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.file_extension.trim().is_empty() {
            return Err(DownloadError::InvalidConfiguration(
                "file_extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
