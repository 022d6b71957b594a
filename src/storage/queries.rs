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


//! Database query functions
//!
//! Repository functions for the `Downloads` table. Lengths are stored as
//! SQLite integers (i64) and converted at this boundary.

use crate::error::{DownloadError, Result};
use crate::storage::models::{DownloadKey, DownloadRecord};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::PathBuf;

/// Check whether a record exists for the key
pub async fn exists_by_key(pool: &SqlitePool, key: &DownloadKey) -> Result<bool> {
    let exists: i64 = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM Downloads WHERE content_id = ? AND quality = ?)",
    )
    .bind(&key.content_id)
    .bind(&key.quality)
    .fetch_one(pool)
    .await?;

    Ok(exists != 0)
}

/// Find a record by (content_id, quality)
pub async fn find_by_key(pool: &SqlitePool, key: &DownloadKey) -> Result<Option<DownloadRecord>> {
    let row = sqlx::query("SELECT * FROM Downloads WHERE content_id = ? AND quality = ?")
        .bind(&key.content_id)
        .bind(&key.quality)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_record).transpose()
}

/// Insert a new record
///
/// Returns the row id of the inserted record.
pub async fn insert_record(pool: &SqlitePool, record: &DownloadRecord) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO Downloads (
            content_id, quality, title, cover_url, source_url, destination_path,
            total_length, downloaded_length, is_downloading, add_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.content_id)
    .bind(&record.quality)
    .bind(&record.title)
    .bind(&record.cover_url)
    .bind(&record.source_url)
    .bind(path_to_string(&record.destination_path)?)
    .bind(to_i64(record.total_length)?)
    .bind(to_i64(record.downloaded_length)?)
    .bind(record.is_downloading)
    .bind(record.add_date)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DownloadError::DuplicateRecord(record.key().to_string())
        }
        other => other.into(),
    })?;

    Ok(result.last_insert_rowid())
}

/// Update the mutable fields of an existing record
pub async fn update_record(pool: &SqlitePool, record: &DownloadRecord) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE Downloads SET
            title = ?, cover_url = ?, source_url = ?, destination_path = ?,
            total_length = ?, downloaded_length = ?, is_downloading = ?
        WHERE content_id = ? AND quality = ?
        "#,
    )
    .bind(&record.title)
    .bind(&record.cover_url)
    .bind(&record.source_url)
    .bind(path_to_string(&record.destination_path)?)
    .bind(to_i64(record.total_length)?)
    .bind(to_i64(record.downloaded_length)?)
    .bind(record.is_downloading)
    .bind(&record.content_id)
    .bind(&record.quality)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DownloadError::not_found(record.key().to_string()));
    }

    Ok(())
}

/// Convert database row to DownloadRecord
fn row_to_record(row: SqliteRow) -> Result<DownloadRecord> {
    let destination: String = row.try_get("destination_path")?;
    let add_date: DateTime<Utc> = row.try_get("add_date")?;

    Ok(DownloadRecord {
        content_id: row.try_get("content_id")?,
        quality: row.try_get("quality")?,
        title: row.try_get("title")?,
        cover_url: row.try_get("cover_url")?,
        source_url: row.try_get("source_url")?,
        destination_path: PathBuf::from(destination),
        total_length: row.try_get::<i64, _>("total_length")?.max(0) as u64,
        downloaded_length: row.try_get::<i64, _>("downloaded_length")?.max(0) as u64,
        is_downloading: row.try_get("is_downloading")?,
        add_date,
    })
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| DownloadError::internal(format!("Length out of range: {}", value)))
}

fn path_to_string(path: &std::path::Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| DownloadError::InvalidPath(format!("Non UTF-8 path: {}", path.display())))
}
