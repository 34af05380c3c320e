//! Database operations for the admin console.
//!
//! The admin owns every write to the catalog, site content, settings and
//! order lifecycle. The storefront only inserts orders and comments.
//!
//! # Migrations
//!
//! Migrations live in `migrations/` at the workspace root and run via:
//! ```bash
//! cargo run -p bloomtable-cli -- migrate
//! ```

pub mod catalog;
pub mod content;
pub mod notifications;
pub mod orders;
pub mod settings;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::{CategoryRepository, ProductRepository};
pub use content::{CommentRepository, GalleryRepository, SectionRepository};
pub use notifications::NotificationRepository;
pub use orders::{CascadeReport, OrderRepository};
pub use settings::SettingsRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate slug).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The request references something that does not exist.
    #[error("invalid reference: {0}")]
    InvalidReference(String),
}

impl RepositoryError {
    /// Translate unique and foreign key violations into client errors.
    pub(crate) fn from_write(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return Self::Conflict(format!("{what} already exists"));
            }
            if db.is_foreign_key_violation() {
                return Self::InvalidReference(format!("{what} refers to a missing record"));
            }
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `Ok(())` if a write touched a row, `NotFound` otherwise.
pub(crate) const fn expect_rows(affected: u64) -> Result<(), RepositoryError> {
    if affected == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}
