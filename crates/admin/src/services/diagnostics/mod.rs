//! Self-test runner.
//!
//! Checks run one after another and each produces a [`DiagnosticResult`].
//! When a required check fails the remaining checks are skipped.

mod checks;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};

pub use checks::{
    CatalogRoundTrip, Connectivity, NotificationChannel, OrderCascadeDelete, SettingsRoundTrip,
};

/// Outcome of one check.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticResult {
    pub name: String,
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A single self-test.
#[async_trait::async_trait]
pub trait DiagnosticCheck: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether a failure aborts the rest of the run.
    fn required(&self) -> bool {
        false
    }

    /// `Ok` carries a success message, `Err` a failure message.
    async fn run(&self) -> Result<String, String>;
}

/// Results of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub results: Vec<DiagnosticResult>,
    /// A required check failed and later checks were skipped.
    pub stopped_early: bool,
}

impl DiagnosticReport {
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.stopped_early && self.results.iter().all(|r| r.success)
    }
}

#[derive(Default)]
pub struct DiagnosticRunner {
    checks: Vec<Box<dyn DiagnosticCheck>>,
}

impl DiagnosticRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_check(mut self, check: impl DiagnosticCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// The standard self-test against a live database.
    #[must_use]
    pub fn builtin(pool: &PgPool) -> Self {
        Self::new()
            .with_check(Connectivity::new(pool.clone()))
            .with_check(SettingsRoundTrip::new(pool.clone()))
            .with_check(CatalogRoundTrip::new(pool.clone()))
            .with_check(OrderCascadeDelete::new(pool.clone()))
            .with_check(NotificationChannel::new(pool.clone()))
    }

    #[instrument(skip(self), fields(checks = self.checks.len()))]
    pub async fn run(&self) -> DiagnosticReport {
        let mut results = Vec::with_capacity(self.checks.len());
        let mut stopped_early = false;

        for check in &self.checks {
            let outcome = check.run().await;
            let success = outcome.is_ok();
            let message = outcome.unwrap_or_else(|e| e);

            if success {
                info!(check = check.name(), %message, "Diagnostic passed");
            } else {
                warn!(check = check.name(), %message, "Diagnostic failed");
            }

            results.push(DiagnosticResult {
                name: check.name().to_string(),
                success,
                message,
                timestamp: Utc::now(),
            });

            if !success && check.required() {
                stopped_early = true;
                break;
            }
        }

        DiagnosticReport {
            results,
            stopped_early,
        }
    }
}
