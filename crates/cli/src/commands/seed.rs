//! Seed a fresh database.
//!
//! Inserts the built-in default for every well-known setting and a handful of
//! starter categories. Rows that already exist are left untouched, so running
//! the seed twice is harmless.

use bloomtable_core::{Slug, default_setting, setting_keys};

use super::{CliError, connect};

/// `(name, description)` for the starter categories.
const STARTER_CATEGORIES: [(&str, &str); 4] = [
    ("Bouquets", "Hand-tied seasonal bouquets"),
    ("Arrangements", "Vase and box arrangements"),
    ("Plates", "Seasonal plates from the kitchen"),
    ("Gifts", "Cards, candles and add-ons"),
];

pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    let mut settings_inserted = 0u64;
    for key in setting_keys::ALL {
        let Some(value) = default_setting(key) else {
            continue;
        };
        let result = sqlx::query(
            "INSERT INTO settings (key, value) VALUES ($1, $2) ON CONFLICT (key) DO NOTHING",
        )
        .bind(key)
        .bind(&value)
        .execute(&pool)
        .await?;
        settings_inserted += result.rows_affected();
    }
    tracing::info!(inserted = settings_inserted, "Default settings seeded");

    let mut categories_inserted = 0u64;
    for (sort_order, (name, description)) in (0i32..).zip(STARTER_CATEGORIES) {
        let slug = Slug::from_title(name).map_err(|e| CliError::InvalidInput(e.to_string()))?;
        let result = sqlx::query(
            r"
            INSERT INTO categories (name, slug, description, sort_order)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (slug) DO NOTHING
            ",
        )
        .bind(name)
        .bind(slug.as_str())
        .bind(description)
        .bind(sort_order)
        .execute(&pool)
        .await?;
        categories_inserted += result.rows_affected();
    }
    tracing::info!(inserted = categories_inserted, "Starter categories seeded");

    Ok(())
}
