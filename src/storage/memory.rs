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


//! In-process record store
//!
//! Keeps records in a map behind a tokio `RwLock`. Useful for hosts that
//! persist records elsewhere and for tests.

use crate::error::{DownloadError, Result};
use crate::storage::models::{DownloadKey, DownloadRecord};
use crate::storage::store::RecordStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<DownloadKey, DownloadRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored record
    pub async fn records(&self) -> Vec<DownloadRecord> {
        self.records.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn exists_by_key(&self, key: &DownloadKey) -> Result<bool> {
        Ok(self.records.read().await.contains_key(key))
    }

    async fn find_by_key(&self, key: &DownloadKey) -> Result<Option<DownloadRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn insert(&self, record: &DownloadRecord) -> Result<()> {
        let mut records = self.records.write().await;
        let key = record.key();
        if records.contains_key(&key) {
            return Err(DownloadError::DuplicateRecord(key.to_string()));
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn update(&self, record: &DownloadRecord) -> Result<()> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.key()) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(DownloadError::not_found(record.key().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryRecordStore::new();
        let key = DownloadKey::new("c1", "480p");
        let mut record = DownloadRecord::new(
            &key,
            "Clip",
            "",
            "https://example.com/c1",
            PathBuf::from("Clip-480p.mp4"),
            10,
        );

        assert!(!store.exists_by_key(&key).await.unwrap());
        assert!(matches!(
            store.update(&record).await,
            Err(DownloadError::RecordNotFound(_))
        ));

        store.insert(&record).await.unwrap();
        assert!(matches!(
            store.insert(&record).await,
            Err(DownloadError::DuplicateRecord(_))
        ));

        record.downloaded_length = 5;
        store.update(&record).await.unwrap();
        let found = store.find_by_key(&key).await.unwrap().unwrap();
        assert_eq!(found.downloaded_length, 5);
        assert_eq!(store.records().await.len(), 1);
    }
}
