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


//! Destination path resolution
//!
//! The destination of a download is a pure function of its title and
//! quality, so a restarted attempt always lands on the same partial file.
//! No collision avoidance is done here: the same (title, quality) pair must
//! map to the same file every time.

use std::path::{Path, PathBuf};

// Most filesystems cap a single component at 255 bytes
const MAX_COMPONENT_LENGTH: usize = 255;

/// Resolves destination paths under a base directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationResolver {
    base_dir: PathBuf,
    extension: String,
}

impl DestinationResolver {
    pub fn new(base_dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        let extension: String = extension.into();
        Self {
            base_dir: base_dir.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// `<base_dir>/<title>-<quality>.<ext>` with both parts sanitized
    pub fn resolve(&self, title: &str, quality: &str) -> PathBuf {
        let suffix = format!("-{}.{}", sanitize_filename(quality), self.extension);
        let budget = MAX_COMPONENT_LENGTH.saturating_sub(suffix.len());
        let stem = truncate_component(&sanitize_filename(title), budget);

        self.base_dir.join(format!("{}{}", stem, suffix))
    }
}

/// Sanitize filename (replaces characters invalid in filenames with `_`)
pub fn sanitize_filename(name: &str) -> String {
    let mut result: String = name.chars().map(replace_char).collect();

    // Trim leading/trailing whitespace and dots
    result = result.trim().trim_end_matches('.').trim().to_string();

    if cfg!(target_os = "windows") {
        result = handle_windows_reserved_names(&result);
    }

    if result.is_empty() {
        result = "download".to_string();
    }

    result
}

fn replace_char(c: char) -> char {
    match c {
        '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
        c if c.is_control() => '_',
        c => c,
    }
}

/// Handle Windows reserved filenames
fn handle_windows_reserved_names(name: &str) -> String {
    let upper = name.to_uppercase();
    let reserved = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    for reserved_name in &reserved {
        if upper == *reserved_name || upper.starts_with(&format!("{}.", reserved_name)) {
            return format!("_{}", name);
        }
    }

    name.to_string()
}

/// Truncate path component to fit within byte limit, on a char boundary
pub fn truncate_component(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut index = max_bytes;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }

    text[..index].to_string()
}
