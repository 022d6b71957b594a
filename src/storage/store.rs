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


//! Record store abstraction
//!
//! The attempt controller only ever needs four operations on download
//! records. Hosts plug in whatever durable storage they already have; the
//! SQLite implementation here is the default.

use crate::error::Result;
use crate::storage::database::Database;
use crate::storage::models::{DownloadKey, DownloadRecord};
use crate::storage::queries;
use async_trait::async_trait;

/// Durable storage of one record per (content id, quality)
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn exists_by_key(&self, key: &DownloadKey) -> Result<bool>;

    async fn find_by_key(&self, key: &DownloadKey) -> Result<Option<DownloadRecord>>;

    /// Fails with `DuplicateRecord` if the key is taken
    async fn insert(&self, record: &DownloadRecord) -> Result<()>;

    /// Fails with `RecordNotFound` if the key is unknown
    async fn update(&self, record: &DownloadRecord) -> Result<()>;
}

/// SQLite-backed record store
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    db: Database,
}

impl SqliteRecordStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn exists_by_key(&self, key: &DownloadKey) -> Result<bool> {
        queries::exists_by_key(self.db.pool(), key).await
    }

    async fn find_by_key(&self, key: &DownloadKey) -> Result<Option<DownloadRecord>> {
        queries::find_by_key(self.db.pool(), key).await
    }

    async fn insert(&self, record: &DownloadRecord) -> Result<()> {
        queries::insert_record(self.db.pool(), record).await?;
        Ok(())
    }

    async fn update(&self, record: &DownloadRecord) -> Result<()> {
        queries::update_record(self.db.pool(), record).await
    }
}
