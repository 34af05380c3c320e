//! Order notification inbox.

use sqlx::PgPool;
use tracing::instrument;

use bloomtable_core::OrderNotificationId;

use super::{RepositoryError, expect_rows};
use crate::models::OrderNotification;

pub struct NotificationRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NotificationRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<OrderNotification>, RepositoryError> {
        Ok(sqlx::query_as::<_, OrderNotification>(
            r"
            SELECT id, order_id, kind, message, is_read, created_at
            FROM order_notifications
            WHERE NOT $1 OR NOT is_read
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            ",
        )
        .bind(unread_only)
        .bind(limit)
        .fetch_all(self.pool)
        .await?)
    }

    /// # Errors
    ///
    /// Returns `NotFound` for an unknown id.
    #[instrument(skip(self))]
    pub async fn mark_read(&self, id: OrderNotificationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE order_notifications SET is_read = TRUE WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        expect_rows(result.rows_affected())
    }

    /// Returns how many notifications changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_all_read(&self) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("UPDATE order_notifications SET is_read = TRUE WHERE NOT is_read")
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unread_count(&self) -> Result<i64, RepositoryError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM order_notifications WHERE NOT is_read")
                .fetch_one(self.pool)
                .await?,
        )
    }
}
