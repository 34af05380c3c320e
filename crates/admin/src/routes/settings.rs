//! Settings, debounced drafts and typed business hours.
//!
//! Writes go straight to the settings table; its trigger announces each
//! change so storefront caches pick it up. A draft is the same write held
//! back until the key has been quiet for the autosave delay, so an editor
//! saving on every keystroke produces one write per pause.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use bloomtable_core::{BusinessHours, SettingKey, setting_keys};

use crate::db::SettingsRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Setting;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(list))
        .route("/settings/{key}", get(show).put(save).delete(remove))
        .route("/settings/{key}/draft", put(save_draft))
        .route("/hours", get(show_hours).put(save_hours))
}

fn parse_key(raw: &str) -> Result<SettingKey> {
    SettingKey::parse(raw).map_err(|e| AppError::BadRequest(format!("invalid setting key: {e}")))
}

async fn list(_admin: RequireAdmin, State(state): State<AppState>) -> Result<Json<Vec<Setting>>> {
    Ok(Json(SettingsRepository::new(state.pool()).list().await?))
}

async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Setting>> {
    let key = parse_key(&key)?;
    SettingsRepository::new(state.pool())
        .get(&key)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("setting {key}")))
}

/// Save immediately. A pending draft for the key is dropped.
#[instrument(skip(state, value))]
async fn save(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Setting>> {
    let key = parse_key(&key)?;
    state.autosave().cancel(&key);
    Ok(Json(
        SettingsRepository::new(state.pool()).put(&key, &value).await?,
    ))
}

#[instrument(skip(state))]
async fn remove(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode> {
    let key = parse_key(&key)?;
    state.autosave().cancel(&key);
    if SettingsRepository::new(state.pool()).delete(&key).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("setting {key}")))
    }
}

#[derive(Debug, Serialize)]
struct DraftAccepted {
    key: SettingKey,
    delay_ms: u64,
}

/// Queue a write that only happens once edits to this key pause.
#[instrument(skip(state, value))]
async fn save_draft(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> Result<(StatusCode, Json<DraftAccepted>)> {
    let key = parse_key(&key)?;
    let pool = state.pool().clone();
    let task_key = key.clone();

    state.autosave().schedule(key.clone(), move || async move {
        match SettingsRepository::new(&pool).put(&task_key, &value).await {
            Ok(_) => info!(key = %task_key, "Draft saved"),
            Err(e) => error!(key = %task_key, error = %e, "Draft save failed"),
        }
    });

    let delay_ms = u64::try_from(state.autosave().delay().as_millis()).unwrap_or(u64::MAX);
    Ok((StatusCode::ACCEPTED, Json(DraftAccepted { key, delay_ms })))
}

/// Stored hours, or the built-in schedule when none are saved.
async fn show_hours(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<BusinessHours>> {
    let key = SettingKey::from_static(setting_keys::BUSINESS_HOURS);
    let Some(setting) = SettingsRepository::new(state.pool()).get(&key).await? else {
        return Ok(Json(BusinessHours::default()));
    };
    serde_json::from_value(setting.value)
        .map(Json)
        .map_err(|e| AppError::Internal(format!("stored business hours are malformed: {e}")))
}

#[instrument(skip(state, hours))]
async fn save_hours(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Json(hours): Json<BusinessHours>,
) -> Result<Json<BusinessHours>> {
    hours
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let key = SettingKey::from_static(setting_keys::BUSINESS_HOURS);
    let value = serde_json::to_value(&hours)
        .map_err(|e| AppError::Internal(format!("failed to encode business hours: {e}")))?;

    state.autosave().cancel(&key);
    SettingsRepository::new(state.pool()).put(&key, &value).await?;
    Ok(Json(hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_rejects_bad_characters() {
        assert!(parse_key("heroContent").is_ok());
        assert!(matches!(parse_key("hero content"), Err(AppError::BadRequest(_))));
    }
}
