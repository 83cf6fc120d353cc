use super::schema::Database;
use super::types::{DatabaseError, HistoryEntry};

/// Append-only log of visited places.
///
/// Unlike favorites and downloads this is not a set: every visit is a new
/// row, and rows only go away through [`clear`](History::clear).
#[derive(Clone)]
pub struct History {
    db: Database,
}

impl History {
    /// Record a visit stamped with the store's current time.
    ///
    /// A blank title is not recorded. Returns whether a row was written.
    pub async fn append(&self, page_id: Option<i64>, title: &str) -> Result<bool, DatabaseError> {
        if title.trim().is_empty() {
            tracing::debug!(page_id = ?page_id, "Skipping history entry without title");
            return Ok(false);
        }

        sqlx::query("INSERT INTO history (pageid, title) VALUES (?, ?)")
            .bind(page_id)
            .bind(title)
            .execute(&self.db.pool)
            .await?;

        Ok(true)
    }

    /// All visits, most recent first.
    pub async fn list(&self) -> Result<Vec<HistoryEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT id, pageid, title, visited_at
            FROM history
            ORDER BY visited_at DESC, id DESC
        "#,
        )
        .fetch_all(&self.db.pool)
        .await?;

        Ok(entries)
    }

    /// [`list`](Self::list) that logs a storage failure and yields nothing.
    pub async fn list_or_empty(&self) -> Vec<HistoryEntry> {
        self.list().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to list history, showing none");
            Vec::new()
        })
    }

    /// Delete every visit. Returns the number of rows removed.
    pub async fn clear(&self) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM history")
            .execute(&self.db.pool)
            .await?;

        tracing::info!(removed = result.rows_affected(), "History cleared");
        Ok(result.rows_affected())
    }
}

impl Database {
    pub fn history(&self) -> History {
        History { db: self.clone() }
    }
}
