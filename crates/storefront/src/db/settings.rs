//! `PostgreSQL`-backed [`SettingsSource`].

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{debug, instrument};

use bloomtable_core::SettingKey;

use crate::settings::{SettingsError, SettingsSource};

/// Reads settings rows, inserting the built-in default on first read of a
/// well-known key.
#[derive(Debug, Clone)]
pub struct PgSettingsSource {
    pool: PgPool,
}

impl PgSettingsSource {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsSource for PgSettingsSource {
    #[instrument(skip(self), fields(key = %key))]
    async fn fetch(&self, key: &SettingKey) -> Result<Option<Value>, SettingsError> {
        let stored: Option<Value> = sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if stored.is_some() {
            return Ok(stored);
        }

        let Some(default) = key.default_value() else {
            return Ok(None);
        };

        debug!("Creating setting from built-in default");
        // A concurrent writer may have won; return whatever is stored now
        let value: Value = sqlx::query_scalar(
            r"
            WITH inserted AS (
                INSERT INTO settings (key, value)
                VALUES ($1, $2)
                ON CONFLICT (key) DO NOTHING
                RETURNING value
            )
            SELECT value FROM inserted
            UNION ALL
            SELECT value FROM settings WHERE key = $1
            LIMIT 1
            ",
        )
        .bind(key.as_str())
        .bind(&default)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(value))
    }
}
