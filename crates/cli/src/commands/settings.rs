//! Read and write settings directly.
//!
//! Writes fire the same change notification as the admin API, so running
//! storefronts pick them up.

use serde_json::Value;

use bloomtable_admin::db::SettingsRepository;
use bloomtable_core::SettingKey;

use super::{CliError, connect};

fn parse_key(key: &str) -> Result<SettingKey, CliError> {
    SettingKey::parse(key).map_err(|e| CliError::InvalidInput(format!("{key}: {e}")))
}

pub async fn get(key: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let pool = connect().await?;

    let value = match SettingsRepository::new(&pool).get(&key).await? {
        Some(setting) => setting.value,
        None => {
            tracing::warn!(%key, "Setting not stored, showing built-in default");
            key.default_value()
                .ok_or_else(|| CliError::Failed(format!("no setting named {key}")))?
        }
    };

    let pretty = serde_json::to_string_pretty(&value)
        .map_err(|e| CliError::Failed(format!("failed to format value: {e}")))?;
    #[allow(clippy::print_stdout)]
    {
        println!("{pretty}");
    }
    Ok(())
}

pub async fn set(key: &str, raw: &str) -> Result<(), CliError> {
    let key = parse_key(key)?;
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CliError::InvalidInput(format!("value is not valid JSON: {e}")))?;

    let pool = connect().await?;
    let setting = SettingsRepository::new(&pool).put(&key, &value).await?;
    tracing::info!(key = %setting.key, updated_at = %setting.updated_at, "Setting saved");
    Ok(())
}
