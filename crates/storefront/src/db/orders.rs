//! Order writes made by checkout and reads made by order tracking.
//!
//! Every multi-row write runs in one transaction so an order never exists
//! without its items and its notification trail.

use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use bloomtable_core::{NotificationKind, OrderId, OrderStatus, PaymentStatus};

use super::RepositoryError;
use crate::models::{NewOrder, Order, OrderItem};

const ORDER_COLUMNS: &str = "id, tracking_token, customer_name, customer_email, customer_phone, \
     fulfillment, delivery_address, notes, status, payment_status, subtotal, currency, \
     payment_session_id, created_at, updated_at";

/// Repository for storefront order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order, its items and a `new_order` notification atomically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any insert fails; nothing is
    /// written in that case.
    #[instrument(skip(self, order), fields(tracking_token = %order.tracking_token, items = order.items.len()))]
    pub async fn create_pending(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r"
            INSERT INTO orders (
                tracking_token, customer_name, customer_email, customer_phone,
                fulfillment, delivery_address, notes, status, payment_status,
                subtotal, currency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {ORDER_COLUMNS}
            "
        );
        let created = sqlx::query_as::<_, Order>(&sql)
            .bind(order.tracking_token)
            .bind(&order.customer_name)
            .bind(&order.customer_email)
            .bind(order.customer_phone.as_deref())
            .bind(order.fulfillment)
            .bind(order.delivery_address.as_deref())
            .bind(order.notes.as_deref())
            .bind(OrderStatus::Pending)
            .bind(PaymentStatus::Unpaid)
            .bind(order.subtotal())
            .bind(&order.currency)
            .fetch_one(&mut *tx)
            .await?;

        for item in &order.items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!("quantity {} out of range", item.quantity))
            })?;
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, product_name, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(created.id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.unit_price)
            .bind(quantity)
            .bind(item.line_total())
            .execute(&mut *tx)
            .await?;
        }

        let message = format!(
            "New {} order from {} ({} {})",
            order.fulfillment, order.customer_name, created.subtotal, created.currency
        );
        insert_notification(&mut tx, created.id, NotificationKind::NewOrder, &message).await?;

        tx.commit().await?;
        info!(order_id = %created.id, "Order created");
        Ok(created)
    }

    /// Remember the payment provider session for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    pub async fn attach_payment_session(
        &self,
        id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders SET payment_session_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(session_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Cancel an order that never reached payment, recording why.
    ///
    /// Orders that already moved past `pending` are left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn cancel_unpaid(&self, id: OrderId, reason: &str) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            ",
        )
        .bind(id)
        .bind(OrderStatus::Cancelled)
        .bind(OrderStatus::Pending)
        .execute(&mut *tx)
        .await?;

        let cancelled = result.rows_affected() > 0;
        if cancelled {
            let message = format!("Order cancelled: {reason}");
            insert_notification(&mut tx, id, NotificationKind::OrderCancelled, &message).await?;
        }

        tx.commit().await?;
        Ok(cancelled)
    }

    /// Record a confirmed payment for the order tied to `session_id`.
    ///
    /// Repeated calls are harmless: an order that is already paid is
    /// returned as-is without another notification.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn mark_paid_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE payment_session_id = $1 FOR UPDATE");
        let Some(order) = sqlx::query_as::<_, Order>(&sql)
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if order.payment_status == PaymentStatus::Paid {
            tx.commit().await?;
            return Ok(Some(order));
        }

        // A cancelled order that gets paid late still records the payment
        let next_status = if order.status == OrderStatus::Pending {
            OrderStatus::Paid
        } else {
            order.status
        };

        let sql = format!(
            r"
            UPDATE orders
            SET status = $2, payment_status = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        let updated = sqlx::query_as::<_, Order>(&sql)
            .bind(order.id)
            .bind(next_status)
            .bind(PaymentStatus::Paid)
            .fetch_one(&mut *tx)
            .await?;

        let message = format!(
            "Payment received for order {} ({} {})",
            updated.id, updated.subtotal, updated.currency
        );
        insert_notification(&mut tx, updated.id, NotificationKind::PaymentReceived, &message)
            .await?;

        tx.commit().await?;
        info!(order_id = %updated.id, "Order paid");
        Ok(Some(updated))
    }

    /// An order and its items by public tracking token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn find_by_tracking_token(
        &self,
        token: Uuid,
    ) -> Result<Option<(Order, Vec<OrderItem>)>, RepositoryError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE tracking_token = $1");
        let Some(order) = sqlx::query_as::<_, Order>(&sql)
            .bind(token)
            .fetch_optional(self.pool)
            .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, product_id, product_name, unit_price, quantity, line_total
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order.id)
        .fetch_all(self.pool)
        .await?;

        Ok(Some((order, items)))
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
