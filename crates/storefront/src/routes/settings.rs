//! Public settings reads and live updates.
//!
//! Reads go through the [`SettingsHub`](crate::settings::SettingsHub) cache
//! and never fail on a store outage; the built-in default is served instead.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, instrument};

use bloomtable_core::SettingKey;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// SSE event name for setting values.
const SETTING_EVENT: &str = "setting";

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
}

fn parse_key(raw: &str) -> Result<SettingKey> {
    SettingKey::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Current value of a setting.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SettingResponse>> {
    let key = parse_key(&key)?;
    let value = state.settings().get_or_builtin(&key).await;
    Ok(Json(SettingResponse {
        key: key.to_string(),
        value,
    }))
}

fn setting_event(value: &Value) -> Event {
    Event::default()
        .event(SETTING_EVENT)
        .data(value.to_string())
}

/// Stream a setting: the current value first, then every change.
///
/// The subscription lives as long as the stream, so a client disconnect
/// releases it.
#[instrument(skip(state))]
pub async fn stream(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let key = parse_key(&key)?;
    let hub = state.settings();

    let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
    let subscription = hub.subscribe(&key, move |value| {
        // Receiver gone means the stream is being torn down
        let _ = tx.send(value.clone());
    });
    let current = hub.get_or_builtin(&key).await;
    debug!(key = %key, "Settings stream opened");

    let events = async_stream::stream! {
        let _subscription = subscription;
        yield Ok(setting_event(&current));
        while let Some(value) = rx.recv().await {
            yield Ok(setting_event(&value));
        }
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_rejects_bad_keys() {
        assert!(parse_key("heroContent").is_ok());
        assert!(matches!(parse_key("no spaces"), Err(AppError::BadRequest(_))));
        assert!(matches!(parse_key(""), Err(AppError::BadRequest(_))));
    }
}
