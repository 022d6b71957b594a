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


//! Download record model
//!
//! One [`DownloadRecord`] per (content id, quality) pair is the persisted
//! unit of truth for a download. It is created by the probe step once the
//! total length is known and updated by every attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of a download: the same content in two qualities is two downloads
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DownloadKey {
    pub content_id: String,
    pub quality: String,
}

impl DownloadKey {
    pub fn new(content_id: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            content_id: content_id.into(),
            quality: quality.into(),
        }
    }
}

impl fmt::Display for DownloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.content_id, self.quality)
    }
}

/// Persisted progress of one download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub content_id: String,
    pub quality: String,

    // Descriptive metadata, set once at creation
    pub title: String,
    pub cover_url: String,
    pub source_url: String,

    /// Resolved local path, a function of (title, quality)
    pub destination_path: PathBuf,

    /// Byte length of the full resource (0 until known)
    pub total_length: u64,

    /// Bytes durably written so far
    pub downloaded_length: u64,

    /// True only while an attempt is streaming
    pub is_downloading: bool,

    pub add_date: DateTime<Utc>,
}

impl DownloadRecord {
    /// Create a fresh record with nothing downloaded yet
    pub fn new(
        key: &DownloadKey,
        title: impl Into<String>,
        cover_url: impl Into<String>,
        source_url: impl Into<String>,
        destination_path: PathBuf,
        total_length: u64,
    ) -> Self {
        Self {
            content_id: key.content_id.clone(),
            quality: key.quality.clone(),
            title: title.into(),
            cover_url: cover_url.into(),
            source_url: source_url.into(),
            destination_path,
            total_length,
            downloaded_length: 0,
            is_downloading: false,
            add_date: Utc::now(),
        }
    }

    pub fn key(&self) -> DownloadKey {
        DownloadKey::new(self.content_id.clone(), self.quality.clone())
    }

    /// Whether the next attempt continues from a byte offset
    pub fn is_resumable(&self) -> bool {
        self.downloaded_length > 0
    }

    pub fn is_complete(&self) -> bool {
        self.total_length > 0 && self.downloaded_length >= self.total_length
    }

    /// Whole-number percentage, floored and capped at 100
    pub fn progress_percent(&self) -> u8 {
        percent_of(self.downloaded_length, self.total_length)
    }
}

/// `floor(downloaded * 100 / total)`, 0 when the total is unknown
pub fn percent_of(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (downloaded as u128 * 100 / total as u128).min(100);
    percent as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_floors() {
        assert_eq!(percent_of(0, 1000), 0);
        assert_eq!(percent_of(499, 1000), 49);
        assert_eq!(percent_of(500, 1000), 50);
        assert_eq!(percent_of(999, 1000), 99);
        assert_eq!(percent_of(1000, 1000), 100);
    }

    #[test]
    fn test_percent_unknown_total_and_overflow() {
        assert_eq!(percent_of(123, 0), 0);
        assert_eq!(percent_of(2000, 1000), 100);
        assert_eq!(percent_of(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn test_new_record() {
        let key = DownloadKey::new("abc-123", "1080p");
        let record = DownloadRecord::new(
            &key,
            "Title",
            "https://example.com/cover.jpg",
            "https://example.com/video.mp4",
            PathBuf::from("/tmp/Title-1080p.mp4"),
            1000,
        );

        assert_eq!(record.key(), key);
        assert_eq!(record.downloaded_length, 0);
        assert!(!record.is_downloading);
        assert!(!record.is_resumable());
        assert!(!record.is_complete());
        assert_eq!(key.to_string(), "abc-123@1080p");
    }
}
