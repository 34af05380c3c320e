//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use bloomtable_core::SettingKey;

use crate::config::AdminConfig;
use crate::middleware::AdminToken;
use crate::services::Debouncer;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    admin_token: AdminToken,
    autosave: Debouncer<SettingKey>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let admin_token = AdminToken::new(&config.api_token);
        let autosave = Debouncer::new(config.autosave_debounce);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                admin_token,
                autosave,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn admin_token(&self) -> &AdminToken {
        &self.inner.admin_token
    }

    /// Debouncer for setting drafts.
    #[must_use]
    pub fn autosave(&self) -> &Debouncer<SettingKey> {
        &self.inner.autosave
    }
}
