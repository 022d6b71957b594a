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


//! Schema migrations
//!
//! Migrations are plain SQL applied at runtime and tracked in `_migrations`,
//! so hosts without a build-time database still get an up to date schema.
//! Each one runs in its own transaction together with its tracking row.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};

struct Migration {
    id: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    id: 1,
    name: "create_downloads",
    sql: CREATE_DOWNLOADS,
}];

/// One row per (content_id, quality)
const CREATE_DOWNLOADS: &str = r#"
CREATE TABLE IF NOT EXISTS Downloads (
    download_id INTEGER PRIMARY KEY AUTOINCREMENT,

    content_id TEXT NOT NULL,
    quality TEXT NOT NULL,

    title TEXT NOT NULL,
    cover_url TEXT NOT NULL DEFAULT '',
    source_url TEXT NOT NULL,
    destination_path TEXT NOT NULL,

    total_length INTEGER NOT NULL DEFAULT 0 CHECK (total_length >= 0),
    downloaded_length INTEGER NOT NULL DEFAULT 0 CHECK (downloaded_length >= 0),
    is_downloading INTEGER NOT NULL DEFAULT 0,

    add_date TEXT NOT NULL,

    UNIQUE (content_id, quality)
);

CREATE INDEX IF NOT EXISTS idx_downloads_is_downloading ON Downloads(is_downloading);
"#;

/// Bring the schema up to date
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    for migration in MIGRATIONS {
        apply(pool, migration).await?;
    }

    Ok(())
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let applied: Option<i64> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(migration.id)
        .fetch_optional(pool)
        .await?;
    if applied.is_some() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    (&mut *tx).execute(migration.sql).await?;
    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(migration.id)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(id = migration.id, name = migration.name, "applied migration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    #[tokio::test]
    async fn test_downloads_table_created() {
        let db = Database::new_in_memory().await.unwrap();

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_migrations' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        assert_eq!(tables, vec!["Downloads"]);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let db = Database::new_in_memory().await.unwrap();

        run_migrations(db.pool()).await.unwrap();

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM _migrations ORDER BY id")
            .fetch_all(db.pool())
            .await
            .unwrap();

        assert_eq!(names, vec!["create_downloads"]);
    }
}
