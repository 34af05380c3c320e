//! Order management and the notification inbox.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bloomtable_core::{OrderId, OrderNotificationId, OrderStatus};

use crate::db::{CascadeReport, NotificationRepository, OrderRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderDetail, OrderNotification};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list))
        .route("/orders/{id}", get(show).delete(remove))
        .route("/orders/{id}/status", post(update_status))
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/{id}/read", post(mark_read))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

#[derive(Debug, Deserialize)]
struct OrderListQuery {
    status: Option<OrderStatus>,
    limit: Option<i64>,
}

async fn list(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .list(query.status, clamp_limit(query.limit))
            .await?,
    ))
}

async fn show(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(OrderRepository::new(state.pool()).get_detail(id).await?))
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: OrderStatus,
}

/// Invalid transitions are 409s.
#[instrument(skip(state))]
async fn update_status(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    Ok(Json(
        OrderRepository::new(state.pool())
            .update_status(id, update.status)
            .await?,
    ))
}

/// Removes the order with its items and notifications.
#[instrument(skip(state))]
async fn remove(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<CascadeReport>> {
    Ok(Json(
        OrderRepository::new(state.pool()).delete_cascade(id).await?,
    ))
}

#[derive(Debug, Deserialize)]
struct NotificationQuery {
    #[serde(default)]
    unread: bool,
    limit: Option<i64>,
}

#[derive(Debug, Serialize)]
struct NotificationList {
    notifications: Vec<OrderNotification>,
    unread_count: i64,
}

async fn list_notifications(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<NotificationList>> {
    let repo = NotificationRepository::new(state.pool());
    let notifications = repo.list(query.unread, clamp_limit(query.limit)).await?;
    let unread_count = repo.unread_count().await?;
    Ok(Json(NotificationList {
        notifications,
        unread_count,
    }))
}

async fn mark_read(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderNotificationId>,
) -> Result<StatusCode> {
    NotificationRepository::new(state.pool()).mark_read(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct MarkedRead {
    updated: u64,
}

async fn mark_all_read(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<MarkedRead>> {
    let updated = NotificationRepository::new(state.pool())
        .mark_all_read()
        .await?;
    Ok(Json(MarkedRead { updated }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
        assert_eq!(clamp_limit(Some(25)), 25);
    }
}
