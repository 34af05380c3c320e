//! Order lifecycle management.
//!
//! Dependent rows (`order_items`, `order_notifications`) reference orders
//! without `ON DELETE CASCADE`. [`OrderRepository::delete_cascade`] removes
//! them explicitly, children first, in one transaction.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};

use bloomtable_core::{NotificationKind, OrderId, OrderStatus};

use super::RepositoryError;
use crate::models::{Order, OrderDetail, OrderItem, OrderNotification};

const ORDER_COLUMNS: &str = "id, tracking_token, customer_name, customer_email, customer_phone, \
     fulfillment, delivery_address, notes, status, payment_status, subtotal, currency, \
     payment_session_id, created_at, updated_at";

/// Rows removed by a cascade delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub items_deleted: u64,
    pub notifications_deleted: u64,
}

pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest orders first, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE $1::text IS NULL OR status = $1
            ORDER BY created_at DESC
            LIMIT $2
            "
        );
        Ok(sqlx::query_as::<_, Order>(&sql)
            .bind(status)
            .bind(limit)
            .fetch_all(self.pool)
            .await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    pub async fn get(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// An order with its items and notification trail.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn get_detail(&self, id: OrderId) -> Result<OrderDetail, RepositoryError> {
        let order = self.get(id).await?;

        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, product_id, product_name, unit_price, quantity, line_total
            FROM order_items WHERE order_id = $1 ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        let notifications = sqlx::query_as::<_, OrderNotification>(
            r"
            SELECT id, order_id, kind, message, is_read, created_at
            FROM order_notifications WHERE order_id = $1 ORDER BY created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;

        Ok(OrderDetail {
            order,
            items,
            notifications,
        })
    }

    /// Move an order to `next`, recording a notification.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id and `Conflict` when the lifecycle
    /// does not allow the move.
    #[instrument(skip(self), fields(next = %next))]
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let current = current.ok_or(RepositoryError::NotFound)?;

        if !current.can_transition_to(next) {
            warn!(from = %current, "Rejected order status transition");
            return Err(RepositoryError::Conflict(format!(
                "order cannot move from {current} to {next}"
            )));
        }

        let sql = format!(
            r"
            UPDATE orders SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .bind(next)
            .fetch_one(&mut *tx)
            .await?;

        let kind = if next == OrderStatus::Cancelled {
            NotificationKind::OrderCancelled
        } else {
            NotificationKind::StatusChanged
        };
        let message = format!("Order {id} moved from {current} to {next}");
        insert_notification(&mut tx, id, kind, &message).await?;

        tx.commit().await?;
        info!(order_id = %id, from = %current, "Order status changed");
        Ok(updated)
    }

    /// Delete an order and every row that references it.
    ///
    /// Notifications go first, then items, then the order. A failure at any
    /// step rolls the whole delete back.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist; nothing is deleted.
    #[instrument(skip(self))]
    pub async fn delete_cascade(&self, id: OrderId) -> Result<CascadeReport, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<OrderId> =
            sqlx::query_scalar("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let notifications = sqlx::query("DELETE FROM order_notifications WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let items = sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let report = CascadeReport {
            items_deleted: items,
            notifications_deleted: notifications,
        };
        info!(
            order_id = %id,
            items = report.items_deleted,
            notifications = report.notifications_deleted,
            "Order deleted"
        );
        Ok(report)
    }

    /// Rows in dependent tables that still point at `id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_references(&self, id: OrderId) -> Result<i64, RepositoryError> {
        let count: Option<i64> = sqlx::query_scalar(
            r"
            SELECT (SELECT COUNT(*) FROM order_items WHERE order_id = $1)
                 + (SELECT COUNT(*) FROM order_notifications WHERE order_id = $1)
            ",
        )
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(count.unwrap_or(0))
    }
}

async fn insert_notification(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    kind: NotificationKind,
    message: &str,
) -> Result<(), RepositoryError> {
    sqlx::query("INSERT INTO order_notifications (order_id, kind, message) VALUES ($1, $2, $3)")
        .bind(order_id)
        .bind(kind)
        .bind(message)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
