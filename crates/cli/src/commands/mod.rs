//! Subcommand implementations.

pub mod diagnose;
pub mod migrate;
pub mod seed;
pub mod settings;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use bloomtable_admin::db::{self, RepositoryError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),
}

/// Connect using `ADMIN_DATABASE_URL`, or `DATABASE_URL` when unset.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("ADMIN_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("ADMIN_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&url).await?)
}
