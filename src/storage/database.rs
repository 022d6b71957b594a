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


//! SQLite pool for the record store
//!
//! File databases run in WAL mode with a busy timeout so a UI process can
//! read progress while a worker writes it. The schema is brought up to date
//! every time a database is opened.

use crate::error::{DownloadError, Result};
use crate::storage::migrations::run_migrations;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DATA_DIR_NAME: &str = "MediaDownload";
const DATABASE_FILE_NAME: &str = "downloads.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection pool plus the file it points at
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database file and migrate it
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();
        ensure_parent_dir(path).await?;

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(BUSY_TIMEOUT)
            .connect_with(options)
            .await?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.migrate().await?;

        tracing::debug!(path = %path.display(), "opened download database");
        Ok(db)
    }

    /// Private in-memory database, mostly for tests
    ///
    /// Every connection to `:memory:` is a separate database, so the pool
    /// keeps exactly one connection alive for its whole life.
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool, path: None };
        db.migrate().await?;
        Ok(db)
    }

    pub async fn migrate(&self) -> Result<()> {
        run_migrations(&self.pool)
            .await
            .map_err(|e| DownloadError::MigrationFailed(e.to_string()))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// Per-user data location on desktop platforms
    ///
    /// Mobile hosts pass a path inside their own sandbox instead.
    pub fn get_default_path() -> PathBuf {
        platform_data_dir()
            .join(DATA_DIR_NAME)
            .join(DATABASE_FILE_NAME)
    }
}

async fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::InvalidPath(format!("{}: {}", parent.display(), e))),
        _ => Ok(()),
    }
}

fn env_dir(var: &str) -> PathBuf {
    std::env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(target_os = "macos")]
fn platform_data_dir() -> PathBuf {
    env_dir("HOME").join("Library").join("Application Support")
}

#[cfg(target_os = "windows")]
fn platform_data_dir() -> PathBuf {
    env_dir("APPDATA")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_data_dir() -> PathBuf {
    match std::env::var_os("XDG_DATA_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => env_dir("HOME").join(".local").join("share"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new_in_memory().await.unwrap();

        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(db.pool())
            .await
            .unwrap();

        assert_eq!(one, 1);
        assert!(db.path().is_none());
    }

    #[tokio::test]
    async fn test_file_database_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("downloads.db");

        let db = Database::new(&path).await.unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        assert!(path.exists());
        db.close().await.unwrap();

        // Reopening runs the migrations again without error
        let db = Database::new(&path).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_parent_that_is_a_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let err = Database::new(blocker.join("downloads.db")).await.unwrap_err();
        assert!(matches!(err, DownloadError::InvalidPath(_)));
    }

    #[test]
    fn test_default_path_layout() {
        let path = Database::get_default_path();
        assert_eq!(path.file_name().unwrap(), DATABASE_FILE_NAME);
        assert_eq!(
            path.parent().unwrap().file_name().unwrap(),
            DATA_DIR_NAME
        );
    }
}
