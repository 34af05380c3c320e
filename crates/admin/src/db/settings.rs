//! Settings rows.
//!
//! Every write fires the `settings:<key>` notification through the table
//! trigger, so storefront caches refresh without polling.

use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, instrument};

use bloomtable_core::SettingKey;

use super::RepositoryError;
use crate::models::Setting;

pub struct SettingsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SettingsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Setting>, RepositoryError> {
        Ok(sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(self.pool)
        .await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, key: &SettingKey) -> Result<Option<Setting>, RepositoryError> {
        Ok(sqlx::query_as::<_, Setting>(
            "SELECT key, value, updated_at FROM settings WHERE key = $1",
        )
        .bind(key.as_str())
        .fetch_optional(self.pool)
        .await?)
    }

    /// Insert or replace a setting.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    #[instrument(skip(self, value), fields(key = %key))]
    pub async fn put(&self, key: &SettingKey, value: &Value) -> Result<Setting, RepositoryError> {
        let setting = sqlx::query_as::<_, Setting>(
            r"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            RETURNING key, value, updated_at
            ",
        )
        .bind(key.as_str())
        .bind(value)
        .fetch_one(self.pool)
        .await?;

        info!("Setting saved");
        Ok(setting)
    }

    /// Remove a setting. Readers fall back to the built-in default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn delete(&self, key: &SettingKey) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM settings WHERE key = $1")
            .bind(key.as_str())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
