//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::payments::{PaymentClient, PaymentError};
use crate::settings::SettingsHub;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    settings: Arc<SettingsHub>,
    payments: PaymentClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The settings hub is passed in so callers choose its source and feed.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        pool: PgPool,
        settings: Arc<SettingsHub>,
    ) -> Result<Self, PaymentError> {
        let payments = PaymentClient::new(&config.payment)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                settings,
                payments,
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the live settings hub.
    #[must_use]
    pub fn settings(&self) -> &Arc<SettingsHub> {
        &self.inner.settings
    }

    /// Get a reference to the payment provider client.
    #[must_use]
    pub fn payments(&self) -> &PaymentClient {
        &self.inner.payments
    }
}
