//! Built-in checks against the live database.
//!
//! Every check that writes uses throwaway rows keyed by a fresh UUID and
//! removes them again, also when the check itself fails.

use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use uuid::Uuid;

use bloomtable_core::{NotificationKind, OrderId, SettingKey, Slug};

use super::DiagnosticCheck;
use crate::db::{CategoryRepository, OrderRepository, ProductRepository, SettingsRepository};
use crate::models::{ValidCategory, ValidProduct};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_CHANNEL: &str = "bt_diagnostics";

fn probe_suffix() -> String {
    Uuid::new_v4().simple().to_string()
}

/// `SELECT 1` against the pool.
pub struct Connectivity {
    pool: PgPool,
}

impl Connectivity {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DiagnosticCheck for Connectivity {
    fn name(&self) -> &'static str {
        "database_connectivity"
    }

    fn required(&self) -> bool {
        true
    }

    async fn run(&self) -> Result<String, String> {
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| format!("database unreachable: {e}"))?;
        if one != 1 {
            return Err(format!("unexpected probe result {one}"));
        }
        Ok(format!("connected ({} pooled connections)", self.pool.size()))
    }
}

/// Write a setting, read it back, delete it.
pub struct SettingsRoundTrip {
    pool: PgPool,
}

impl SettingsRoundTrip {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DiagnosticCheck for SettingsRoundTrip {
    fn name(&self) -> &'static str {
        "settings_round_trip"
    }

    async fn run(&self) -> Result<String, String> {
        let suffix = probe_suffix();
        let key = SettingKey::parse(&format!("diagnostics.{suffix}")).map_err(|e| e.to_string())?;
        let value = json!({ "probe": suffix, "nested": { "list": [1, 2, 3] } });
        let repo = SettingsRepository::new(&self.pool);

        let outcome: Result<(), String> = async {
            repo.put(&key, &value).await.map_err(|e| format!("write failed: {e}"))?;
            let read = repo
                .get(&key)
                .await
                .map_err(|e| format!("read failed: {e}"))?
                .ok_or("setting missing after write")?;
            if read.value != value {
                return Err(format!("read back {} instead of {value}", read.value));
            }
            Ok(())
        }
        .await;

        let removed = repo.delete(&key).await;
        outcome?;
        match removed {
            Ok(true) => Ok("write, read and delete succeeded".into()),
            Ok(false) => Err("setting vanished before delete".into()),
            Err(e) => Err(format!("delete failed: {e}")),
        }
    }
}

/// Create a category and a product in it, read the product back, delete both.
pub struct CatalogRoundTrip {
    pool: PgPool,
}

impl CatalogRoundTrip {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DiagnosticCheck for CatalogRoundTrip {
    fn name(&self) -> &'static str {
        "catalog_round_trip"
    }

    async fn run(&self) -> Result<String, String> {
        let suffix = probe_suffix();
        let slug = |prefix: &str| {
            Slug::parse(&format!("{prefix}-{suffix}")).map_err(|e| e.to_string())
        };
        let categories = CategoryRepository::new(&self.pool);
        let products = ProductRepository::new(&self.pool);

        let category = categories
            .create(&ValidCategory {
                name: "Diagnostics".into(),
                slug: slug("diagnostics")?,
                description: None,
                sort_order: i32::MAX,
                is_active: false,
            })
            .await
            .map_err(|e| format!("category insert failed: {e}"))?;

        let price = Decimal::new(1234, 2);
        let outcome: Result<(), String> = async {
            let product = products
                .create(&ValidProduct {
                    category_id: Some(category.id),
                    name: "Diagnostics probe".into(),
                    slug: slug("diagnostics-probe")?,
                    description: None,
                    price,
                    image_url: None,
                    is_active: false,
                    is_featured: false,
                    sort_order: i32::MAX,
                })
                .await
                .map_err(|e| format!("product insert failed: {e}"))?;

            let read = products.get(product.id).await;
            let deleted = products.delete(product.id).await;
            let read = read.map_err(|e| format!("product read failed: {e}"))?;
            deleted.map_err(|e| format!("product delete failed: {e}"))?;

            if read.category_id != Some(category.id) || read.price != price {
                return Err("product read back with different fields".into());
            }
            Ok(())
        }
        .await;

        let deleted = categories.delete(category.id).await;
        outcome?;
        deleted.map_err(|e| format!("category delete failed: {e}"))?;
        Ok("category and product created, read and deleted".into())
    }
}

/// Create an order with dependents and verify the cascade leaves nothing
/// behind.
pub struct OrderCascadeDelete {
    pool: PgPool,
}

impl OrderCascadeDelete {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_probe_order(&self) -> Result<OrderId, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let id: OrderId = sqlx::query_scalar(
            r"
            INSERT INTO orders (tracking_token, customer_name, customer_email, subtotal)
            VALUES ($1, 'Diagnostics', 'diagnostics@localhost', 0)
            RETURNING id
            ",
        )
        .bind(Uuid::new_v4())
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO order_items (order_id, product_name, unit_price, quantity, line_total)
            VALUES ($1, 'Diagnostics probe', 0, 1, 0)
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO order_notifications (order_id, kind, message) VALUES ($1, $2, $3)",
        )
        .bind(id)
        .bind(NotificationKind::NewOrder)
        .bind("Diagnostics probe order")
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }
}

#[async_trait::async_trait]
impl DiagnosticCheck for OrderCascadeDelete {
    fn name(&self) -> &'static str {
        "order_cascade_delete"
    }

    async fn run(&self) -> Result<String, String> {
        let id = self
            .insert_probe_order()
            .await
            .map_err(|e| format!("probe order insert failed: {e}"))?;

        let orders = OrderRepository::new(&self.pool);
        let report = orders
            .delete_cascade(id)
            .await
            .map_err(|e| format!("cascade delete failed: {e}"))?;

        let remaining = orders
            .count_references(id)
            .await
            .map_err(|e| format!("reference count failed: {e}"))?;
        if remaining != 0 {
            return Err(format!("{remaining} rows still reference order {id}"));
        }
        if report.items_deleted != 1 || report.notifications_deleted != 1 {
            return Err(format!(
                "expected 1 item and 1 notification, deleted {} and {}",
                report.items_deleted, report.notifications_deleted
            ));
        }
        Ok("order and dependents deleted, no references left".into())
    }
}

/// `LISTEN` on a probe channel, `pg_notify` it, wait for delivery.
pub struct NotificationChannel {
    pool: PgPool,
}

impl NotificationChannel {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DiagnosticCheck for NotificationChannel {
    fn name(&self) -> &'static str {
        "notification_channel"
    }

    async fn run(&self) -> Result<String, String> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| format!("listener connect failed: {e}"))?;
        listener
            .listen(PROBE_CHANNEL)
            .await
            .map_err(|e| format!("LISTEN failed: {e}"))?;

        let payload = probe_suffix();
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(PROBE_CHANNEL)
            .bind(&payload)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("pg_notify failed: {e}"))?;

        let notification = tokio::time::timeout(NOTIFY_TIMEOUT, listener.recv())
            .await
            .map_err(|_| format!("no notification within {}s", NOTIFY_TIMEOUT.as_secs()))?
            .map_err(|e| format!("listener failed: {e}"))?;

        if notification.payload() != payload {
            return Err(format!("unexpected payload {:?}", notification.payload()));
        }
        Ok(format!("notification delivered on {PROBE_CHANNEL}"))
    }
}
