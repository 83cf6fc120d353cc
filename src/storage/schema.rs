use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::types::{is_lock_message, DatabaseError};

// ============================================================================
// Database
// ============================================================================

/// Process-wide handle on the embedded store.
///
/// Cloning is cheap (the pool is reference counted). Each repository owns a
/// clone and exclusively owns its table.
#[derive(Clone)]
pub struct Database {
    pub(crate) pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file and run migrations.
    ///
    /// Pass `":memory:"` for a throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InstanceLocked` if another process holds the
    /// file (SQLITE_BUSY, SQLITE_LOCKED, SQLITE_CANTOPEN) and
    /// `DatabaseError::Migration` if the schema could not be created.
    pub async fn open(path: &str) -> Result<Self, DatabaseError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // The database holds browsing history; keep it private to the user
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() && db_path.parent().is_some_and(|p| p.exists()) {
                // If creation fails, SQLite reports the error at connect_with
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok();
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(DatabaseError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        // One connection: SQLite serializes individual statements and the
        // core never issues parallel work.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let db = Self { pool };
        db.migrate().await.map_err(|e| {
            if is_lock_message(&e.to_string()) {
                DatabaseError::InstanceLocked
            } else {
                DatabaseError::Migration(e.to_string())
            }
        })?;
        tracing::debug!(path = %path, "Database opened");
        Ok(db)
    }

    /// Create all tables inside one transaction.
    ///
    /// Every statement uses `IF NOT EXISTS`, so re-running on an existing
    /// database is a no-op.
    async fn migrate(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorites (
                id INTEGER PRIMARY KEY NOT NULL,
                pageid INTEGER,
                title TEXT NOT NULL,
                image TEXT,
                url TEXT,
                UNIQUE(pageid, title)
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY NOT NULL,
                pageid INTEGER,
                title TEXT NOT NULL,
                image TEXT,
                url TEXT,
                extract TEXT,
                saved_at TEXT DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY NOT NULL,
                pageid INTEGER,
                title TEXT NOT NULL,
                visited_at TEXT DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        // NULLs are distinct under a plain UNIQUE, so title-only places would
        // never conflict. Keying on COALESCE makes the conflict policy apply
        // to them as well.
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_favorites_key ON favorites(COALESCE(pageid, -1), title)",
        )
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_downloads_key ON downloads(COALESCE(pageid, -1), title)",
        )
        .execute(&mut *tx)
        .await?;

        // Lookups by either half of the key (exists/remove)
        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_favorites_title ON favorites(title)",
            "CREATE INDEX IF NOT EXISTS idx_downloads_pageid ON downloads(pageid)",
            "CREATE INDEX IF NOT EXISTS idx_downloads_title ON downloads(title)",
            "CREATE INDEX IF NOT EXISTS idx_history_visited ON history(visited_at DESC)",
        ] {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        // Key-value store for the settings blob
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
