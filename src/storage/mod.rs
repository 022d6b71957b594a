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


//! Download record storage
//!
//! One record per (content id, quality) tracks how far a download got.
//! The attempt controller talks to storage only through [`RecordStore`].
//!
//! # Usage Example
//! ```no_run
//! use media_download_core::storage::{Database, DownloadKey, RecordStore, SqliteRecordStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./downloads.db").await?;
//! let store = SqliteRecordStore::new(db);
//!
//! let key = DownloadKey::new("abc-123", "1080p");
//! if let Some(record) = store.find_by_key(&key).await? {
//!     println!("{}% downloaded", record.progress_percent());
//! }
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod store;

pub use database::Database;
pub use memory::MemoryRecordStore;
pub use models::{percent_of, DownloadKey, DownloadRecord};
pub use store::{RecordStore, SqliteRecordStore};
