use std::marker::PhantomData;

use super::schema::Database;
use super::types::{DatabaseError, Place, PlaceRow};

// ============================================================================
// Collections
// ============================================================================

/// What an insert does when the `(page_id, title)` key is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the stored row, the write is a no-op
    Ignore,
    /// Overwrite the stored row with the new fields
    Replace,
}

impl ConflictPolicy {
    fn insert_verb(self) -> &'static str {
        match self {
            ConflictPolicy::Ignore => "INSERT OR IGNORE",
            ConflictPolicy::Replace => "INSERT OR REPLACE",
        }
    }
}

/// A table of places with set semantics.
///
/// Implemented by the uninhabited markers [`Favorites`] and [`Downloads`];
/// the SQL for every repository operation is derived from these constants.
pub trait PlaceCollection: Send + Sync + 'static {
    /// Table name
    const TABLE: &'static str;
    const POLICY: ConflictPolicy;
    /// Whether the `extract` column exists and is written
    const STORES_EXTRACT: bool;
    /// Projection matching [`PlaceRow`]
    const COLUMNS: &'static str;
    /// Newest first
    const ORDER_BY: &'static str;
}

/// Places the user marked as favorite
pub enum Favorites {}

impl PlaceCollection for Favorites {
    const TABLE: &'static str = "favorites";
    const POLICY: ConflictPolicy = ConflictPolicy::Ignore;
    const STORES_EXTRACT: bool = false;
    const COLUMNS: &'static str = "pageid, title, image, url, NULL AS extract, NULL AS saved_at";
    const ORDER_BY: &'static str = "id DESC";
}

/// Places saved with their extract for offline reading
pub enum Downloads {}

impl PlaceCollection for Downloads {
    const TABLE: &'static str = "downloads";
    const POLICY: ConflictPolicy = ConflictPolicy::Replace;
    const STORES_EXTRACT: bool = true;
    const COLUMNS: &'static str = "pageid, title, image, url, extract, saved_at";
    // saved_at has one-second resolution, id breaks ties
    const ORDER_BY: &'static str = "saved_at DESC, id DESC";
}

// ============================================================================
// Repository
// ============================================================================

/// Add/remove/exists/list over one [`PlaceCollection`].
///
/// Lookups use a dual key: a row matches when its `pageid` equals the given
/// page id (only if one is given) or when its title matches.
pub struct PlaceRepository<C> {
    db: Database,
    _collection: PhantomData<fn() -> C>,
}

impl<C> Clone for PlaceRepository<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _collection: PhantomData,
        }
    }
}

impl<C: PlaceCollection> PlaceRepository<C> {
    pub(crate) fn new(db: Database) -> Self {
        Self {
            db,
            _collection: PhantomData,
        }
    }

    /// Store a place, applying the collection's [`ConflictPolicy`] when the
    /// `(page_id, title)` key already exists.
    ///
    /// # Errors
    ///
    /// `DatabaseError::EmptyTitle` for a blank title, otherwise the
    /// underlying storage error.
    pub async fn add(&self, place: &Place) -> Result<(), DatabaseError> {
        if place.title.trim().is_empty() {
            return Err(DatabaseError::EmptyTitle);
        }

        let sql = if C::STORES_EXTRACT {
            format!(
                "{} INTO {} (pageid, title, image, url, extract) VALUES (?, ?, ?, ?, ?)",
                C::POLICY.insert_verb(),
                C::TABLE
            )
        } else {
            format!(
                "{} INTO {} (pageid, title, image, url) VALUES (?, ?, ?, ?)",
                C::POLICY.insert_verb(),
                C::TABLE
            )
        };

        let mut query = sqlx::query(&sql)
            .bind(place.page_id)
            .bind(&place.title)
            .bind(&place.image)
            .bind(&place.url);
        if C::STORES_EXTRACT {
            query = query.bind(&place.extract);
        }
        let result = query.execute(&self.db.pool).await?;

        tracing::debug!(
            table = C::TABLE,
            page_id = ?place.page_id,
            title = %place.title,
            written = result.rows_affected() > 0,
            "Stored place"
        );
        Ok(())
    }

    /// Delete by page id when one is given, otherwise by title.
    ///
    /// Removing a place that is not stored is a no-op.
    pub async fn remove(&self, page_id: Option<i64>, title: &str) -> Result<(), DatabaseError> {
        let result = match page_id {
            Some(id) => {
                sqlx::query(&format!("DELETE FROM {} WHERE pageid = ?", C::TABLE))
                    .bind(id)
                    .execute(&self.db.pool)
                    .await?
            }
            None => {
                sqlx::query(&format!("DELETE FROM {} WHERE title = ?", C::TABLE))
                    .bind(title)
                    .execute(&self.db.pool)
                    .await?
            }
        };

        tracing::debug!(
            table = C::TABLE,
            page_id = ?page_id,
            title = %title,
            removed = result.rows_affected(),
            "Removed place"
        );
        Ok(())
    }

    /// True if a row matches the page id (when given) or the title.
    pub async fn exists(&self, page_id: Option<i64>, title: &str) -> Result<bool, DatabaseError> {
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT 1 FROM {} WHERE (pageid = ? AND pageid IS NOT NULL) OR title = ? LIMIT 1",
            C::TABLE
        ))
        .bind(page_id)
        .bind(title)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Fetch the stored place matching the dual key, preferring an exact
    /// page id match over a title match.
    pub async fn find(
        &self,
        page_id: Option<i64>,
        title: &str,
    ) -> Result<Option<Place>, DatabaseError> {
        let row: Option<PlaceRow> = sqlx::query_as(&format!(
            r#"
            SELECT {columns} FROM {table}
            WHERE (pageid = ?1 AND pageid IS NOT NULL) OR title = ?2
            ORDER BY CASE WHEN pageid = ?1 THEN 0 ELSE 1 END, {order}
            LIMIT 1
        "#,
            columns = C::COLUMNS,
            table = C::TABLE,
            order = C::ORDER_BY
        ))
        .bind(page_id)
        .bind(title)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(row.map(PlaceRow::into_place))
    }

    /// All stored places, newest first.
    pub async fn list(&self) -> Result<Vec<Place>, DatabaseError> {
        let rows: Vec<PlaceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM {} ORDER BY {}",
            C::COLUMNS,
            C::TABLE,
            C::ORDER_BY
        ))
        .fetch_all(&self.db.pool)
        .await?;

        Ok(rows.into_iter().map(PlaceRow::into_place).collect())
    }

    /// [`list`](Self::list) for rendering: a storage failure is logged and
    /// yields an empty list.
    pub async fn list_or_empty(&self) -> Vec<Place> {
        match self.list().await {
            Ok(places) => places,
            Err(e) => {
                tracing::warn!(table = C::TABLE, error = %e, "Failed to list places, showing none");
                Vec::new()
            }
        }
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", C::TABLE))
            .fetch_one(&self.db.pool)
            .await?;
        Ok(row.0)
    }
}

impl PlaceRepository<Favorites> {
    /// Remove the place if it is a favorite, add it otherwise.
    ///
    /// Returns whether the place is a favorite afterwards.
    pub async fn toggle(&self, place: &Place) -> Result<bool, DatabaseError> {
        if self.exists(place.page_id, &place.title).await? {
            // Delete everything `exists` matched, not just the page id
            let result = sqlx::query(
                "DELETE FROM favorites WHERE (pageid = ? AND pageid IS NOT NULL) OR title = ?",
            )
            .bind(place.page_id)
            .bind(&place.title)
            .execute(&self.db.pool)
            .await?;

            tracing::debug!(
                page_id = ?place.page_id,
                title = %place.title,
                removed = result.rows_affected(),
                "Unfavorited place"
            );
            Ok(false)
        } else {
            self.add(place).await?;
            Ok(true)
        }
    }
}

impl Database {
    pub fn favorites(&self) -> PlaceRepository<Favorites> {
        PlaceRepository::new(self.clone())
    }

    pub fn downloads(&self) -> PlaceRepository<Downloads> {
        PlaceRepository::new(self.clone())
    }
}
