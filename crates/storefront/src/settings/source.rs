//! Where setting values come from.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use bloomtable_core::SettingKey;

/// Errors that can occur while reading a setting from its source.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The source could not be reached for another reason.
    #[error("settings source unavailable: {0}")]
    Unavailable(String),
}

/// A readable store of settings.
///
/// `Ok(None)` means the key does not exist and has no built-in default.
#[async_trait]
pub trait SettingsSource: Send + Sync + 'static {
    /// Fetch the current value for `key`, bypassing any cache.
    async fn fetch(&self, key: &SettingKey) -> Result<Option<Value>, SettingsError>;
}
