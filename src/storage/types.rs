use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Storage errors surfaced by the repositories and the settings store
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process holds the database lock
    #[error("Another instance of geotalk appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// A place was written without a title
    #[error("A place needs a non-empty title")]
    EmptyTitle,

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map a sqlx error, promoting SQLite lock failures to `InstanceLocked`
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all mean the
/// file is held elsewhere.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database table is locked")
        || message.contains("sqlite_busy")
        || message.contains("sqlite_locked")
        || message.contains("unable to open database file")
}

// ============================================================================
// Data Structures
// ============================================================================

/// A point of interest as stored by the favorites and downloads tables.
///
/// `page_id` is the remote page identifier and may be absent for places only
/// known by title; `(page_id, title)` is the natural key. `extract` is only
/// persisted by downloads and `saved_at` only exists on the downloads table,
/// both are `None` when read back from favorites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Place {
    pub page_id: Option<i64>,
    pub title: String,
    pub image: Option<String>,
    pub url: Option<String>,
    pub extract: Option<String>,
    pub saved_at: Option<String>,
}

impl Place {
    pub fn new(page_id: Option<i64>, title: impl Into<String>) -> Self {
        Self {
            page_id,
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_extract(mut self, extract: impl Into<String>) -> Self {
        self.extract = Some(extract.into());
        self
    }
}

/// Internal row type for place queries (used by sqlx FromRow)
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PlaceRow {
    pub pageid: Option<i64>,
    pub title: String,
    pub image: Option<String>,
    pub url: Option<String>,
    pub extract: Option<String>,
    pub saved_at: Option<String>,
}

impl PlaceRow {
    pub(crate) fn into_place(self) -> Place {
        Place {
            page_id: self.pageid,
            title: self.title,
            image: self.image,
            url: self.url,
            extract: self.extract,
            saved_at: self.saved_at,
        }
    }
}

/// One visit recorded in the history log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub id: i64,
    #[sqlx(rename = "pageid")]
    pub page_id: Option<i64>,
    pub title: String,
    pub visited_at: String,
}
