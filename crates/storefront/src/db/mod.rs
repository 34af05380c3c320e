//! Database operations for the storefront.
//!
//! The storefront reads the catalog and site content, writes orders and
//! comments, and lazily creates default settings rows.
//!
//! ## Tables used
//!
//! - `settings` - JSON blobs by key (read, insert-on-miss)
//! - `categories`, `products` - catalog (read-only)
//! - `orders`, `order_items`, `order_notifications` - checkout writes
//! - `gallery_images`, `content_sections` - site content (read-only)
//! - `comments` - guest comments (insert, approved read)
//! - `tower_sessions.session` - cart sessions
//!
//! # Migrations
//!
//! Migrations live in `migrations/` at the workspace root and run via:
//! ```bash
//! cargo run -p bloomtable-cli -- migrate
//! ```

pub mod catalog;
pub mod content;
pub mod orders;
pub mod settings;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use catalog::CatalogRepository;
pub use content::ContentRepository;
pub use orders::OrderRepository;
pub use settings::PgSettingsSource;

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

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
