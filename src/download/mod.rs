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


//! Download attempts and streaming
//!
//! # Components
//! - [`attempt`] - Attempt controller, one call per scheduled attempt
//! - [`fetcher`] - HTTP GET with optional `Range: bytes=<offset>-`
//! - [`probe`] - First request that learns the length and creates the record
//! - [`stream`] - Sequential writer from the response body into the file
//! - [`progress`] - Throttled progress persistence and events
//! - [`host`] - Traits for the job host and the notification layer

pub mod attempt;
pub mod fetcher;
pub mod host;
pub mod probe;
pub mod progress;
pub mod stream;

// Re-export commonly used types
pub use attempt::{AttemptOutcome, DownloadRequest, DownloadWorker};
pub use fetcher::{FetchResponse, RangeFetcher};
pub use host::{ChannelHost, DownloadEvent, ForegroundInfo, JobHost, Notifier};
pub use progress::{ProgressReporter, ProgressThrottle};
