use super::schema::Database;
use super::types::DatabaseError;

impl Database {
    // ========================================================================
    // Key-Value Operations
    // ========================================================================

    /// Read the raw value stored under `key`, or `None` if it was never set.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Forget `key`. Returns whether a value was stored.
    pub async fn delete_preference(&self, key: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM user_preferences WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
