//! Bloomtable CLI - database and operations tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply migrations
//! bt-cli migrate
//!
//! # Insert default settings and starter categories (existing rows are kept)
//! bt-cli seed
//!
//! # Run the database self-test
//! bt-cli diagnose
//!
//! # Read and write settings
//! bt-cli settings get heroContent
//! bt-cli settings set orderingEnabled 'false'
//! ```
//!
//! Connects with `ADMIN_DATABASE_URL`, falling back to `DATABASE_URL`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bt-cli")]
#[command(author, version, about = "Bloomtable CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert default settings and starter categories
    Seed,
    /// Run the database self-test; exits non-zero on failure
    Diagnose,
    /// Read or write settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print a setting as JSON
    Get {
        /// Setting key, e.g. `heroContent`
        key: String,
    },
    /// Store a JSON value under a key
    Set {
        /// Setting key, e.g. `heroContent`
        key: String,
        /// JSON value, e.g. '{"title": "Spring menu"}'
        value: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await,
        Commands::Seed => commands::seed::run().await,
        Commands::Diagnose => commands::diagnose::run().await,
        Commands::Settings { action } => match action {
            SettingsAction::Get { key } => commands::settings::get(&key).await,
            SettingsAction::Set { key, value } => commands::settings::set(&key, &value).await,
        },
    }
}
